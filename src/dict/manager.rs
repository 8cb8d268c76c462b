use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::checker::dictionary::Dictionary;
use crate::config::Config;
use crate::error::DictionaryError;

// Pinned so a download is reproducible.
const DICTIONARIES_BASE_URL: &str =
    "https://raw.githubusercontent.com/wooorm/dictionaries/8cfea406b505e4d7df52d5a19bce525df98c54ab/dictionaries";

const SYSTEM_FOLDERS: &[&str] = &[
    "/usr/share/hunspell",
    "/usr/share/myspell",
    "/usr/share/myspell/dicts",
    "/Library/Spelling",
];

const USER_SUFFIX: &str = "_User";

/// A `.aff`/`.dic` pair found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryFiles {
    pub language: String,
    pub aff: PathBuf,
    pub dic: PathBuf,
}

/// `en_us`, `en-US` and `EN_us` all become `en-US`.
pub fn normalize_language(code: &str) -> String {
    let mut parts = code.split(['-', '_']);
    let primary = parts.next().unwrap_or_default().to_ascii_lowercase();
    let rest = parts.map(|part| match part.len() {
        2 | 3 => part.to_ascii_uppercase(),
        4 => {
            let mut chars = part.chars();
            chars
                .next()
                .map(|c| c.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase())
                .unwrap_or_default()
        }
        _ => part.to_string(),
    });
    std::iter::once(primary).chain(rest).collect::<Vec<_>>().join("-")
}

/// The language a dictionary file stem names, if it looks like a language
/// code: a two or three letter primary subtag and an optional region.
pub fn language_from_stem(stem: &str) -> Option<String> {
    let mut parts = stem.split(['-', '_']);
    let primary = parts.next()?;
    let region = parts.next();
    if parts.next().is_some() {
        return None;
    }
    let primary_ok = (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic());
    let region_ok = region.map_or(true, |r| {
        (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
    });
    (primary_ok && region_ok).then(|| normalize_language(stem))
}

/// The managed download folder followed by the usual system locations.
pub fn default_folders() -> Vec<PathBuf> {
    Config::data_dir()
        .map(|dir| dir.join("dictionaries"))
        .into_iter()
        .chain(SYSTEM_FOLDERS.iter().map(PathBuf::from))
        .collect()
}

/// Find dictionary pairs in `folders`, in folder order. A `.dic` without a
/// matching `.aff` is skipped with a warning; when a language appears more
/// than once the first one wins.
pub fn discover(folders: &[PathBuf]) -> Vec<DictionaryFiles> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for folder in folders.iter().filter(|f| f.is_dir()) {
        let mut entries: Vec<PathBuf> = WalkDir::new(folder)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("dic"))
            .collect();
        entries.sort();

        for dic in entries {
            let Some(stem) = dic.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.ends_with(USER_SUFFIX) {
                continue;
            }
            // `<lang>/index.dic` layout of downloaded dictionaries
            let name = if stem == "index" {
                dic.parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .unwrap_or(stem)
            } else {
                stem
            };
            let Some(language) = language_from_stem(name) else {
                debug!(path = %dic.display(), "not a language dictionary");
                continue;
            };
            let aff = dic.with_extension("aff");
            if !aff.is_file() {
                warn!(
                    path = %dic.display(),
                    "{}",
                    DictionaryError::MissingPair { language, missing: "affix" }
                );
                continue;
            }
            if !seen.insert(language.clone()) {
                debug!(%language, path = %dic.display(), "duplicate dictionary ignored");
                continue;
            }
            found.push(DictionaryFiles { language, aff, dic });
        }
    }
    found
}

/// Path of the user word list for `language` inside `folder`.
pub fn user_dictionary_path(folder: &Path, language: &str) -> PathBuf {
    folder.join(format!("{}{USER_SUFFIX}.dic", language.replace('-', "_")))
}

/// Load the requested languages from `folders`. Failures are logged and
/// skipped; only an empty result is an error.
pub fn load_dictionaries(config: &Config) -> Result<Vec<Dictionary>, DictionaryError> {
    let mut folders = config.dictionary_folders.clone();
    folders.extend(default_folders());
    let available = discover(&folders);
    let user_folder = Config::config_dir();

    let mut loaded = Vec::new();
    for (index, requested) in config.languages.iter().enumerate() {
        let language = normalize_language(requested);
        let Some(files) = available.iter().find(|f| f.language == language) else {
            warn!(%language, "no dictionary found");
            continue;
        };
        let dictionary = match Dictionary::load_hunspell(&language, &files.aff, &files.dic) {
            Ok(dictionary) => dictionary,
            Err(e) => {
                warn!(%language, "skipping dictionary: {e}");
                continue;
            }
        };
        let user_file = match (&config.personal_dictionary, &user_folder) {
            (Some(path), _) if index == 0 => Some(path.clone()),
            (_, Some(folder)) => Some(user_dictionary_path(folder, &language)),
            _ => None,
        };
        let dictionary = match user_file {
            Some(path) => match dictionary.with_user_file(path) {
                Ok(dictionary) => dictionary,
                Err(e) => {
                    warn!(%language, "skipping dictionary: {e}");
                    continue;
                }
            },
            None => dictionary,
        };
        debug!(%language, words = dictionary.len(), "loaded dictionary");
        loaded.push(dictionary);
    }

    if loaded.is_empty() {
        return Err(DictionaryError::NoDictionaries(config.languages.clone()));
    }
    Ok(loaded)
}

pub fn list_dictionaries(folders: &[PathBuf]) -> Result<()> {
    let found = discover(folders);

    if found.is_empty() {
        println!("{}", "No dictionaries found.".yellow());
        println!(
            "Run {} to download a dictionary.",
            "spellscan dict download en_US".cyan()
        );
        return Ok(());
    }

    println!("{}", "Available dictionaries:".bold());
    println!();
    for files in &found {
        let size_kb = fs::metadata(&files.dic).map(|m| m.len() / 1024).unwrap_or(0);
        println!(
            "  {} {} {} ({})",
            "✓".green(),
            files.language.cyan().bold(),
            files.dic.display().to_string().dimmed(),
            format!("{}KB", size_kb).dimmed()
        );
    }
    Ok(())
}

pub fn show_info(language: &str, folders: &[PathBuf]) -> Result<()> {
    let language = normalize_language(language);
    let Some(files) = discover(folders).into_iter().find(|f| f.language == language) else {
        println!(
            "{} Dictionary for {} not found.",
            "✗".red().bold(),
            language.yellow()
        );
        println!(
            "Run {} to download it.",
            format!("spellscan dict download {}", language).cyan()
        );
        return Ok(());
    };

    println!("{}", format!("Dictionary: {}", language).bold());
    println!("  Affix file: {}", files.aff.display());
    println!("  Word list:  {}", files.dic.display());
    if let Some(folder) = Config::config_dir() {
        println!("  User words: {}", user_dictionary_path(&folder, &language).display());
    }

    match Dictionary::load_hunspell(&language, &files.aff, &files.dic) {
        Ok(dict) => println!("  Words: {}", dict.len().to_string().yellow()),
        Err(e) => println!("  {}: {}", "Error loading dictionary".red(), e),
    }
    Ok(())
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::blocking::get(url).with_context(|| format!("Failed to download {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to download {url}: HTTP {}", response.status());
    }
    Ok(response.bytes()?.to_vec())
}

/// Download the hunspell pair for `language` into the managed folder.
pub fn download_dictionary(language: &str) -> Result<PathBuf> {
    let language = normalize_language(language);
    let data_dir = Config::data_dir().context("Failed to get data directory")?;
    let target = data_dir.join("dictionaries");
    fs::create_dir_all(&target).context("Failed to create dictionary directory")?;

    println!(
        "{} dictionary for {}...",
        "Downloading".cyan().bold(),
        language.yellow()
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);

    let stem = language.replace('-', "_");
    for (remote, extension) in [("index.aff", "aff"), ("index.dic", "dic")] {
        let url = format!("{DICTIONARIES_BASE_URL}/{language}/{remote}");
        pb.set_message(format!("Fetching {url}"));
        let bytes = fetch(&url)?;
        let path = target.join(format!("{stem}.{extension}"));
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    pb.finish_with_message("Download complete");

    let dic = target.join(format!("{stem}.dic"));
    let dict = Dictionary::load_hunspell(&language, &target.join(format!("{stem}.aff")), &dic)
        .context("Downloaded dictionary could not be read")?;
    println!(
        "{} Dictionary installed: {} ({} words)",
        "✓".green().bold(),
        dic.display().to_string().cyan(),
        dict.len()
    );
    Ok(dic)
}

/// Re-download every dictionary in the managed folder.
pub fn update_dictionaries() -> Result<()> {
    let data_dir = Config::data_dir().context("Failed to get data directory")?;
    let managed = discover(&[data_dir.join("dictionaries")]);

    if managed.is_empty() {
        println!("{}", "No dictionaries to update.".yellow());
        return Ok(());
    }

    for files in managed {
        download_dictionary(&files.language)?;
        println!();
    }
    println!("{} All dictionaries updated!", "✓".green().bold());
    Ok(())
}
