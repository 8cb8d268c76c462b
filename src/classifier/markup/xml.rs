//! Strict XML classifiers: plain XML files and resource (`.resx`) files.

use super::{standard_spans, validate_xml, walk, Item, MarkupFilter, MarkupMode, StartTag};
use crate::classifier::span::ClassifiedSpan;
use crate::error::ClassificationError;

/// Element bodies and listed attribute values of a well-formed XML document.
#[derive(Debug, Clone)]
pub struct XmlClassifier {
    filter: MarkupFilter,
}

impl XmlClassifier {
    pub fn new(filter: MarkupFilter) -> Self {
        Self { filter }
    }

    pub fn classify_raw<'a>(
        &self,
        content: &'a str,
    ) -> Result<Vec<ClassifiedSpan<'a>>, ClassificationError> {
        validate_xml(content, true)?;

        let mut spans = Vec::new();
        walk(content, MarkupMode::Xml, &self.filter, &|_| false, |item| {
            standard_spans(content, content, 0, item, &mut spans)
        });
        Ok(spans)
    }
}

/// Marker text of the schema comment every resource file starts with.
const RESX_BOILERPLATE: &str = "Microsoft ResX Schema";

/// A resource file: XML where only user-visible string values and comments
/// are checked.
#[derive(Debug, Clone)]
pub struct ResourceFileClassifier {
    filter: MarkupFilter,
}

impl ResourceFileClassifier {
    pub fn new(filter: MarkupFilter) -> Self {
        Self {
            filter: filter.with_ignored_elements(["resheader", "schema", "assembly"]),
        }
    }

    /// Data entries carrying a `type`, or a base64 `mimetype`, hold
    /// serialized objects rather than text.
    fn is_binary_entry(tag: &StartTag<'_>) -> bool {
        if !matches!(tag.name, "data" | "metadata") {
            return false;
        }
        tag.attribute("type").is_some()
            || tag
                .attribute("mimetype")
                .is_some_and(|mime| mime.contains("base64"))
    }

    pub fn classify_raw<'a>(
        &self,
        content: &'a str,
    ) -> Result<Vec<ClassifiedSpan<'a>>, ClassificationError> {
        validate_xml(content, true)?;

        let mut spans = Vec::new();
        walk(
            content,
            MarkupMode::Xml,
            &self.filter,
            &Self::is_binary_entry,
            |item| {
                if let Item::Comment(range) = &item {
                    if content[range.clone()].contains(RESX_BOILERPLATE) {
                        return;
                    }
                }
                standard_spans(content, content, 0, item, &mut spans)
            },
        );
        Ok(spans)
    }
}
