use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::checker::service::ServiceSettings;
use crate::checker::tokenizer::WordSplitterOptions;
use crate::classifier::markup::MarkupSettings;
use crate::classifier::registry::{
    ClassifierDefinition, ClassifierLayer, ClassifierRegistry, RegistrySettings,
};
use crate::error::ConfigError;

pub const LOCAL_CONFIG_FILE: &str = ".spellscan.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub languages: Vec<String>,
    pub dictionary_folders: Vec<PathBuf>,
    pub personal_dictionary: Option<PathBuf>,
    pub ignored_words_file: Option<PathBuf>,
    pub ignored_words: Vec<String>,
    pub exclusion_expressions: Vec<String>,
    pub max_suggestions: usize,
    pub case_sensitive: bool,
    pub detect_doubled_words: bool,
    pub regex_timeout_ms: u64,
    pub words: WordSplitterOptions,
    pub markup: MarkupSettings,

    /// One layer per configuration file that defined classifiers or
    /// extension mappings, in load order.
    #[serde(skip)]
    pub classifier_layers: Vec<ClassifierLayer>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: vec!["en_US".to_string()],
            dictionary_folders: Vec::new(),
            personal_dictionary: None,
            ignored_words_file: None,
            ignored_words: Vec::new(),
            exclusion_expressions: vec![
                r"^https?://\S+$".to_string(),           // URLs
                r"^[a-fA-F0-9]{32,}$".to_string(),       // Hashes
                r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$".to_string(), // Emails
            ],
            max_suggestions: 5,
            case_sensitive: false,
            detect_doubled_words: true,
            regex_timeout_ms: 1000,
            words: WordSplitterOptions::default(),
            markup: MarkupSettings::default(),
            classifier_layers: Vec::new(),
        }
    }
}

/// What one configuration file may set. Absent keys leave the value from
/// earlier layers alone.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    languages: Option<Vec<String>>,
    dictionary_folders: Option<Vec<PathBuf>>,
    personal_dictionary: Option<PathBuf>,
    ignored_words_file: Option<PathBuf>,
    ignored_words: Option<Vec<String>>,
    exclusion_expressions: Option<Vec<String>>,
    max_suggestions: Option<usize>,
    case_sensitive: Option<bool>,
    detect_doubled_words: Option<bool>,
    regex_timeout_ms: Option<u64>,
    words: Option<WordSplitterOptions>,
    markup: Option<MarkupSettings>,
    classifiers: Vec<ClassifierDefinition>,
    extensions: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line; they win over every file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub languages: Vec<String>,
    pub dictionary_folders: Vec<PathBuf>,
    pub personal_dictionary: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub ignored_words: Vec<String>,
    pub case_sensitive: bool,
    pub no_doubled_words: bool,
}

impl Config {
    /// Load configuration with priority: CLI args > local config > global config > defaults
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config = config.merge(Self::from_file(&global_path)?);
            }
        }

        // An explicit --config replaces the local file.
        let local_path = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
        if local_path.exists() {
            config = config.merge(Self::from_file(&local_path)?);
        } else if overrides.config_file.is_some() {
            anyhow::bail!("Config file not found: {}", local_path.display());
        }

        if !overrides.languages.is_empty() {
            config.languages = overrides.languages.clone();
        }
        config
            .dictionary_folders
            .splice(0..0, overrides.dictionary_folders.iter().cloned());
        if let Some(dict) = &overrides.personal_dictionary {
            config.personal_dictionary = Some(dict.clone());
        }
        config
            .exclusion_expressions
            .extend(overrides.ignore_patterns.iter().cloned());
        config
            .ignored_words
            .extend(overrides.ignored_words.iter().cloned());
        config.case_sensitive |= overrides.case_sensitive;
        if overrides.no_doubled_words {
            config.detect_doubled_words = false;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<ConfigFile> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        debug!(path = %path.display(), "loading configuration");
        ConfigFile::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Defaults overlaid with a single TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::default().merge(ConfigFile::parse(text)?))
    }

    pub fn merge(mut self, other: ConfigFile) -> Self {
        if let Some(languages) = other.languages {
            self.languages = languages;
        }
        if let Some(folders) = other.dictionary_folders {
            self.dictionary_folders = folders;
        }
        if other.personal_dictionary.is_some() {
            self.personal_dictionary = other.personal_dictionary;
        }
        if other.ignored_words_file.is_some() {
            self.ignored_words_file = other.ignored_words_file;
        }
        if let Some(words) = other.ignored_words {
            self.ignored_words = words;
        }
        if let Some(expressions) = other.exclusion_expressions {
            self.exclusion_expressions = expressions;
        }
        if let Some(max) = other.max_suggestions {
            self.max_suggestions = max;
        }
        if let Some(case_sensitive) = other.case_sensitive {
            self.case_sensitive = case_sensitive;
        }
        if let Some(detect) = other.detect_doubled_words {
            self.detect_doubled_words = detect;
        }
        if let Some(timeout) = other.regex_timeout_ms {
            self.regex_timeout_ms = timeout;
        }
        if let Some(words) = other.words {
            self.words = words;
        }
        if let Some(markup) = other.markup {
            self.markup = markup;
        }
        let layer = ClassifierLayer {
            definitions: other.classifiers,
            extensions: other.extensions,
        };
        if !layer.is_empty() {
            self.classifier_layers.push(layer);
        }
        self
    }

    pub fn regex_timeout(&self) -> Duration {
        Duration::from_millis(self.regex_timeout_ms)
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            markup: self.markup.clone(),
            regex_timeout: self.regex_timeout(),
        }
    }

    /// Built-in classifiers folded with every configured layer.
    pub fn build_registry(&self) -> Result<ClassifierRegistry, ConfigError> {
        ClassifierRegistry::with_layers(self.registry_settings(), self.classifier_layers.clone())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            ignored_words: self.ignored_words.clone(),
            ignored_words_file: self.ignored_words_file.clone(),
            exclusion_expressions: self.exclusion_expressions.clone(),
            max_suggestions: self.max_suggestions,
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "spellscan")
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Holds the global config and the per-language user word lists.
    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }
}
