//! Turning file content into classified spans.
//!
//! Every file is handled by one [`Classifier`] variant picked through the
//! [`registry::ClassifierRegistry`]. `classify_raw` returns what the variant
//! found, `Undefined` spans included; `classify` applies the undefined-span
//! filter and is what callers normally want.

pub mod builtin;
pub mod code;
pub mod doc_comment;
pub mod markup;
pub mod regex_rules;
pub mod registry;
pub mod script;
pub mod span;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ClassificationError;
use code::CodeClassifier;
use markup::html::HtmlClassifier;
use markup::markdown::MarkdownClassifier;
use markup::reporting::ReportingServicesClassifier;
use markup::xml::{ResourceFileClassifier, XmlClassifier};
use regex_rules::RegexClassifier;
use script::ScriptWithMarkupClassifier;
use span::subtract_undefined;

pub use span::{ClassifiedSpan, Classification};

/// The closed set of classifier behaviours a definition can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    PlainText,
    Regex,
    Code,
    Xml,
    Html,
    Markdown,
    ResourceFile,
    ReportingServices,
    ScriptWithHtml,
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassifierKind::PlainText => "plain-text",
            ClassifierKind::Regex => "regex",
            ClassifierKind::Code => "code",
            ClassifierKind::Xml => "xml",
            ClassifierKind::Html => "html",
            ClassifierKind::Markdown => "markdown",
            ClassifierKind::ResourceFile => "resource-file",
            ClassifierKind::ReportingServices => "reporting-services",
            ClassifierKind::ScriptWithHtml => "script-with-html",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum Classifier {
    /// The whole buffer is one `PlainText` span.
    PlainText,
    Regex(RegexClassifier),
    Code(CodeClassifier),
    Xml(XmlClassifier),
    Html(HtmlClassifier),
    Markdown(MarkdownClassifier),
    ResourceFile(ResourceFileClassifier),
    ReportingServices(ReportingServicesClassifier),
    ScriptWithHtml(ScriptWithMarkupClassifier),
}

impl Classifier {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::PlainText => ClassifierKind::PlainText,
            Classifier::Regex(_) => ClassifierKind::Regex,
            Classifier::Code(_) => ClassifierKind::Code,
            Classifier::Xml(_) => ClassifierKind::Xml,
            Classifier::Html(_) => ClassifierKind::Html,
            Classifier::Markdown(_) => ClassifierKind::Markdown,
            Classifier::ResourceFile(_) => ClassifierKind::ResourceFile,
            Classifier::ReportingServices(_) => ClassifierKind::ReportingServices,
            Classifier::ScriptWithHtml(_) => ClassifierKind::ScriptWithHtml,
        }
    }

    /// Spans as found, sorted by start offset. `Undefined` spans may overlap
    /// the others.
    pub fn classify_raw<'a>(
        &self,
        content: &'a str,
    ) -> Result<Vec<ClassifiedSpan<'a>>, ClassificationError> {
        let mut spans = match self {
            Classifier::PlainText => {
                if content.is_empty() {
                    Vec::new()
                } else {
                    vec![ClassifiedSpan::new(
                        content,
                        0..content.len(),
                        Classification::PlainText,
                    )]
                }
            }
            Classifier::Regex(c) => c.classify_raw(content),
            Classifier::Code(c) => c.classify_raw(content),
            Classifier::Xml(c) => c.classify_raw(content)?,
            Classifier::Html(c) => c.classify_raw(content),
            Classifier::Markdown(c) => c.classify_raw(content),
            Classifier::ResourceFile(c) => c.classify_raw(content)?,
            Classifier::ReportingServices(c) => c.classify_raw(content)?,
            Classifier::ScriptWithHtml(c) => c.classify_raw(content),
        };
        spans.sort_by_key(|s| (s.start, s.end()));
        Ok(spans)
    }

    /// Ordered, non-overlapping spans with every `Undefined` range removed.
    pub fn classify<'a>(
        &self,
        content: &'a str,
    ) -> Result<Vec<ClassifiedSpan<'a>>, ClassificationError> {
        Ok(subtract_undefined(self.classify_raw(content)?))
    }
}
