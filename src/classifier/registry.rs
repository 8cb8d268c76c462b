//! Resolving classifier definitions and extension mappings into one
//! immutable registry per session.
//!
//! Configuration arrives as layers (built-in, then each configuration file in
//! precedence order). Layers are folded with last-writer-wins at the
//! granularity of a classifier id and of an extension; nothing is merged
//! field by field.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::code::{CodeClassifier, CommentDelimiters, PrefixPrecedence, StringPrefixes};
use super::doc_comment::DocCommentExtractor;
use super::markup::html::HtmlClassifier;
use super::markup::markdown::MarkdownClassifier;
use super::markup::reporting::ReportingServicesClassifier;
use super::markup::xml::{ResourceFileClassifier, XmlClassifier};
use super::markup::{MarkupFilter, MarkupSettings};
use super::regex_rules::{RegexClassifier, RuleDefinition};
use super::script::ScriptWithMarkupClassifier;
use super::span::ClassifiedSpan;
use super::{builtin, Classifier, ClassifierKind};
use crate::error::ConfigError;

/// Extension target meaning "never classify files with this extension".
pub const EXCLUDED_CLASSIFIER_ID: &str = "None";

/// Default per-rule matching budget.
pub const DEFAULT_REGEX_TIMEOUT: Duration = Duration::from_millis(1000);

/// A classifier as written in configuration (`[[classifiers]]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ClassifierKind,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub doc_comment_delimiter: Option<String>,
    #[serde(default)]
    pub quad_slash_delimiter: Option<String>,
    #[serde(default)]
    pub old_style_doc_comment_delimiter: Option<String>,
    #[serde(default)]
    pub verbatim_prefix: Option<char>,
    #[serde(default)]
    pub interpolation_prefix: Option<char>,
    #[serde(default)]
    pub prefix_precedence: PrefixPrecedence,
    #[serde(default)]
    pub mnemonic: Option<char>,
}

impl ClassifierDefinition {
    pub fn new(id: &str, kind: ClassifierKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            rules: Vec::new(),
            doc_comment_delimiter: None,
            quad_slash_delimiter: None,
            old_style_doc_comment_delimiter: None,
            verbatim_prefix: None,
            interpolation_prefix: None,
            prefix_precedence: PrefixPrecedence::default(),
            mnemonic: None,
        }
    }

    pub fn with_rules(mut self, rules: Vec<RuleDefinition>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_delimiters(mut self, doc: Option<&str>, quad: Option<&str>, old_style: Option<&str>) -> Self {
        self.doc_comment_delimiter = doc.map(str::to_string);
        self.quad_slash_delimiter = quad.map(str::to_string);
        self.old_style_doc_comment_delimiter = old_style.map(str::to_string);
        self
    }

    pub fn with_prefixes(mut self, verbatim: Option<char>, interpolation: Option<char>) -> Self {
        self.verbatim_prefix = verbatim;
        self.interpolation_prefix = interpolation;
        self
    }

    pub fn with_mnemonic(mut self, mnemonic: char) -> Self {
        self.mnemonic = Some(mnemonic);
        self
    }

    fn delimiters(&self) -> CommentDelimiters {
        CommentDelimiters {
            doc_comment: self.doc_comment_delimiter.clone(),
            quad_slash: self.quad_slash_delimiter.clone(),
            old_style_doc_comment: self.old_style_doc_comment_delimiter.clone(),
        }
    }

    fn prefixes(&self) -> StringPrefixes {
        StringPrefixes {
            verbatim: self.verbatim_prefix,
            interpolation: self.interpolation_prefix,
            precedence: self.prefix_precedence,
        }
    }
}

/// One configuration source's contribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierLayer {
    #[serde(default)]
    pub definitions: Vec<ClassifierDefinition>,
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl ClassifierLayer {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.extensions.is_empty()
    }
}

/// Inputs shared by every compiled classifier.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub markup: MarkupSettings,
    pub regex_timeout: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            markup: MarkupSettings::default(),
            regex_timeout: DEFAULT_REGEX_TIMEOUT,
        }
    }
}

/// A compiled classifier plus the metadata the checker needs.
#[derive(Debug, Clone)]
pub struct ClassifierEntry {
    pub id: String,
    pub mnemonic: Option<char>,
    pub classifier: Classifier,
}

impl ClassifierEntry {
    pub fn kind(&self) -> ClassifierKind {
        self.classifier.kind()
    }
}

/// Folds layers in the order they are added.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    settings: RegistrySettings,
    definitions: BTreeMap<String, ClassifierDefinition>,
    extensions: BTreeMap<String, String>,
}

impl RegistryBuilder {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            definitions: BTreeMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Apply a layer over everything added so far.
    pub fn layer(mut self, layer: ClassifierLayer) -> Self {
        for definition in layer.definitions {
            if self.definitions.contains_key(&definition.id) {
                debug!(id = %definition.id, "classifier definition replaced by later layer");
            }
            self.definitions.insert(definition.id.clone(), definition);
        }
        for (extension, id) in layer.extensions {
            self.extensions.insert(normalize_extension(&extension), id);
        }
        self
    }

    pub fn build(self) -> Result<ClassifierRegistry, ConfigError> {
        let filter = MarkupFilter::new(&self.settings.markup);
        let timeout = self.settings.regex_timeout;

        let mut entries = HashMap::with_capacity(self.definitions.len());
        for definition in self.definitions.values() {
            let classifier = compile(definition, &filter, timeout)?;
            entries.insert(
                definition.id.clone(),
                Arc::new(ClassifierEntry {
                    id: definition.id.clone(),
                    mnemonic: definition.mnemonic,
                    classifier,
                }),
            );
        }

        for (extension, id) in &self.extensions {
            if id != EXCLUDED_CLASSIFIER_ID && !entries.contains_key(id) {
                return Err(ConfigError::UnknownClassifierId {
                    extension: extension.clone(),
                    id: id.clone(),
                });
            }
        }

        Ok(ClassifierRegistry {
            entries,
            extensions: self.extensions.into_iter().collect(),
            xml_fallback: Arc::new(ClassifierEntry {
                id: "Xml".to_string(),
                mnemonic: None,
                classifier: Classifier::Xml(XmlClassifier::new(filter)),
            }),
            plain_text: Arc::new(ClassifierEntry {
                id: "PlainText".to_string(),
                mnemonic: None,
                classifier: Classifier::PlainText,
            }),
        })
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Compile the code variant of a definition.
pub(crate) fn code_classifier(
    definition: &ClassifierDefinition,
    filter: &MarkupFilter,
    timeout: Duration,
) -> Result<CodeClassifier, ConfigError> {
    Ok(CodeClassifier::new(
        RegexClassifier::compile(&definition.id, &definition.rules, timeout)?,
        definition.prefixes(),
        definition.delimiters(),
        DocCommentExtractor::new(filter.clone()),
    ))
}

fn compile(
    definition: &ClassifierDefinition,
    filter: &MarkupFilter,
    timeout: Duration,
) -> Result<Classifier, ConfigError> {
    let classifier = match definition.kind {
        ClassifierKind::PlainText => Classifier::PlainText,
        ClassifierKind::Regex => Classifier::Regex(RegexClassifier::compile(
            &definition.id,
            &definition.rules,
            timeout,
        )?),
        ClassifierKind::Code => Classifier::Code(code_classifier(definition, filter, timeout)?),
        ClassifierKind::Xml => Classifier::Xml(XmlClassifier::new(filter.clone())),
        ClassifierKind::Html => Classifier::Html(HtmlClassifier::new(filter.clone())),
        ClassifierKind::Markdown => Classifier::Markdown(MarkdownClassifier::new(filter.clone())),
        ClassifierKind::ResourceFile => {
            Classifier::ResourceFile(ResourceFileClassifier::new(filter.clone()))
        }
        ClassifierKind::ReportingServices => {
            Classifier::ReportingServices(ReportingServicesClassifier::new(
                filter.clone(),
                builtin::visual_basic_classifier(filter.clone(), timeout)?,
            ))
        }
        ClassifierKind::ScriptWithHtml => Classifier::ScriptWithHtml(ScriptWithMarkupClassifier::new(
            code_classifier(definition, filter, timeout)?,
            HtmlClassifier::new(filter.clone()),
        )),
    };
    Ok(classifier)
}

/// How an extension resolves.
#[derive(Debug, Clone)]
pub enum Resolution {
    Excluded,
    Mapped(Arc<ClassifierEntry>),
    Unmapped,
}

/// The spans of one file and the classifier that produced them.
#[derive(Debug, Clone)]
pub struct ClassifiedFile<'a> {
    pub classifier_id: String,
    pub kind: ClassifierKind,
    pub mnemonic: Option<char>,
    pub spans: Vec<ClassifiedSpan<'a>>,
}

#[derive(Debug, Clone)]
pub enum FileClassification<'a> {
    Excluded,
    Classified(ClassifiedFile<'a>),
}

impl<'a> FileClassification<'a> {
    pub fn spans(&self) -> &[ClassifiedSpan<'a>] {
        match self {
            FileClassification::Excluded => &[],
            FileClassification::Classified(file) => &file.spans,
        }
    }

    pub fn classifier_id(&self) -> Option<&str> {
        match self {
            FileClassification::Excluded => None,
            FileClassification::Classified(file) => Some(&file.classifier_id),
        }
    }
}

/// The effective, immutable classifier configuration for a session.
#[derive(Debug, Clone)]
pub struct ClassifierRegistry {
    entries: HashMap<String, Arc<ClassifierEntry>>,
    extensions: HashMap<String, String>,
    xml_fallback: Arc<ClassifierEntry>,
    plain_text: Arc<ClassifierEntry>,
}

impl ClassifierRegistry {
    /// Built-in definitions only.
    pub fn builtin(settings: RegistrySettings) -> Result<Self, ConfigError> {
        RegistryBuilder::new(settings)
            .layer(builtin::builtin_layer())
            .build()
    }

    /// Built-in definitions overlaid with `layers` in order.
    pub fn with_layers(
        settings: RegistrySettings,
        layers: impl IntoIterator<Item = ClassifierLayer>,
    ) -> Result<Self, ConfigError> {
        layers
            .into_iter()
            .fold(
                RegistryBuilder::new(settings).layer(builtin::builtin_layer()),
                RegistryBuilder::layer,
            )
            .build()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ClassifierEntry>> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn resolve(&self, extension: &str) -> Resolution {
        match self.extensions.get(&normalize_extension(extension)) {
            Some(id) if id == EXCLUDED_CLASSIFIER_ID => Resolution::Excluded,
            Some(id) => match self.entries.get(id) {
                Some(entry) => Resolution::Mapped(Arc::clone(entry)),
                None => Resolution::Unmapped,
            },
            None => Resolution::Unmapped,
        }
    }

    pub fn classify_path<'a>(&self, path: &Path, content: &'a str) -> FileClassification<'a> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.classify_extension(extension, content)
    }

    /// Classify `content` as a file with `extension`. A strict classifier
    /// that rejects the content, and an unmapped extension whose content is
    /// not well-formed XML, both end up as plain text.
    pub fn classify_extension<'a>(&self, extension: &str, content: &'a str) -> FileClassification<'a> {
        match self.resolve(extension) {
            Resolution::Excluded => FileClassification::Excluded,
            Resolution::Mapped(entry) => match entry.classifier.classify(content) {
                Ok(spans) => classified(&entry, spans),
                Err(e) => {
                    warn!(classifier = %entry.id, "falling back to plain text: {e}");
                    self.plain_text(content)
                }
            },
            Resolution::Unmapped => match self.xml_fallback.classifier.classify(content) {
                Ok(spans) => classified(&self.xml_fallback, spans),
                Err(e) => {
                    debug!(extension, "unmapped extension is not XML ({e}), using plain text");
                    self.plain_text(content)
                }
            },
        }
    }

    fn plain_text<'a>(&self, content: &'a str) -> FileClassification<'a> {
        let spans = self
            .plain_text
            .classifier
            .classify(content)
            .unwrap_or_default();
        classified(&self.plain_text, spans)
    }
}

fn classified<'a>(entry: &ClassifierEntry, spans: Vec<ClassifiedSpan<'a>>) -> FileClassification<'a> {
    FileClassification::Classified(ClassifiedFile {
        classifier_id: entry.id.clone(),
        kind: entry.kind(),
        mnemonic: entry.mnemonic,
        spans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::span::Classification;

    fn registry() -> ClassifierRegistry {
        ClassifierRegistry::builtin(RegistrySettings::default()).unwrap()
    }

    #[test]
    fn test_unmapped_extension_falls_back_to_xml_then_plain_text() {
        let registry = registry();

        let xml = registry.classify_extension("unknownext", "<a>1</a>");
        assert_eq!(xml.classifier_id(), Some("Xml"));
        assert_eq!(xml.spans()[0].classification, Classification::InnerText);

        let plain = registry.classify_extension("unknownext", "plain words");
        assert_eq!(plain.classifier_id(), Some("PlainText"));
        assert_eq!(plain.spans()[0].text, "plain words");
    }

    #[test]
    fn test_excluded_extension() {
        let registry = registry();
        assert!(matches!(
            registry.classify_extension("png", "\u{89}PNG"),
            FileClassification::Excluded
        ));
    }

    #[test]
    fn test_mapped_strict_xml_falls_back_to_plain_text() {
        let registry = registry();
        let result = registry.classify_extension("xml", "<a><b></a>");
        assert_eq!(result.classifier_id(), Some("PlainText"));
    }

    #[test]
    fn test_extension_lookup_ignores_case_and_dot() {
        let registry = registry();
        assert!(matches!(registry.resolve(".CS"), Resolution::Mapped(_)));
        let by_path = registry.classify_path(Path::new("src/Program.cs"), "// hello");
        assert_eq!(by_path.classifier_id(), Some("CSharp"));
    }

    #[test]
    fn test_later_layer_replaces_definition_wholesale() {
        let custom = ClassifierDefinition::new("CSharp", ClassifierKind::Regex).with_rules(vec![
            RuleDefinition::new(r"#[^\n]*", Classification::SingleLineComment),
        ]);
        let layer = ClassifierLayer {
            definitions: vec![custom],
            extensions: BTreeMap::from([("txt".to_string(), EXCLUDED_CLASSIFIER_ID.to_string())]),
        };
        let registry = ClassifierRegistry::with_layers(RegistrySettings::default(), [layer]).unwrap();

        let entry = registry.get("CSharp").unwrap();
        assert_eq!(entry.kind(), ClassifierKind::Regex);
        let spans = registry.classify_extension("cs", "// not a comment now\n# but this is");
        assert_eq!(spans.spans().len(), 1);
        assert_eq!(spans.spans()[0].text, "# but this is");

        assert!(matches!(registry.resolve("txt"), Resolution::Excluded));
    }

    #[test]
    fn test_unknown_target_id_is_an_error() {
        let layer = ClassifierLayer {
            definitions: Vec::new(),
            extensions: BTreeMap::from([("foo".to_string(), "Missing".to_string())]),
        };
        let err = ClassifierRegistry::with_layers(RegistrySettings::default(), [layer]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClassifierId { .. }));
    }

    #[test]
    fn test_bad_regex_option_is_an_error() {
        let custom = ClassifierDefinition::new("Custom", ClassifierKind::Regex).with_rules(vec![
            RuleDefinition::new("x", Classification::PlainText).with_options("Sideways"),
        ]);
        let layer = ClassifierLayer {
            definitions: vec![custom],
            extensions: BTreeMap::new(),
        };
        assert!(matches!(
            ClassifierRegistry::with_layers(RegistrySettings::default(), [layer]),
            Err(ConfigError::UnknownRegexOption(_))
        ));
    }

    #[test]
    fn test_definition_parses_from_toml() {
        let layer: ClassifierLayer = toml::from_str(
            r#"
[[definitions]]
id = "Ini"
type = "regex"
rules = [{ pattern = ";[^\\n]*", classification = "SingleLineComment", options = "Multiline" }]

[extensions]
ini = "Ini"
"#,
        )
        .unwrap();
        let registry = ClassifierRegistry::with_layers(RegistrySettings::default(), [layer]).unwrap();
        let result = registry.classify_extension("ini", "; comment\nkey=value");
        assert_eq!(result.spans()[0].text, "; comment");
    }
}
