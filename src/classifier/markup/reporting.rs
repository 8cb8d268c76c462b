//! Report definition files (`.rdl`, `.rdlc`).
//!
//! These are strict XML with two carve-outs: the body of a `Code` element is
//! Visual Basic, of which only comments and strings are kept, and any value
//! written as an `=expression` keeps only its string literals.

use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

use super::{push_text_span, trim_range, validate_xml, walk, Item, MarkupFilter, MarkupMode};
use crate::classifier::code::CodeClassifier;
use crate::classifier::span::{ClassifiedSpan, Classification};
use crate::error::ClassificationError;

lazy_static! {
    static ref EXPRESSION_STRING: Regex = Regex::new(r#""(?:[^"]|"")*""#).unwrap();
}

#[derive(Debug, Clone)]
pub struct ReportingServicesClassifier {
    filter: MarkupFilter,
    code: CodeClassifier,
}

impl ReportingServicesClassifier {
    /// `code` classifies the embedded Visual Basic in `Code` elements.
    pub fn new(filter: MarkupFilter, code: CodeClassifier) -> Self {
        Self { filter, code }
    }

    pub fn classify_raw<'a>(
        &self,
        content: &'a str,
    ) -> Result<Vec<ClassifiedSpan<'a>>, ClassificationError> {
        validate_xml(content, true)?;

        let mut spans = Vec::new();
        walk(content, MarkupMode::Xml, &self.filter, &|_| false, |item| match item {
            Item::Text { range, element } if element.is_some_and(|e| super::local_name(e) == "Code") => {
                self.code_spans(content, range, &mut spans)
            }
            Item::Text { range, .. } => {
                self.value_spans(content, range, Classification::InnerText, &mut spans)
            }
            Item::Attribute { value } => {
                self.value_spans(content, value, Classification::AttributeValue, &mut spans)
            }
            Item::Comment(range) => push_text_span(
                content,
                content,
                0,
                range,
                Classification::XmlFileComment,
                &mut spans,
            ),
            Item::CData(range) => push_text_span(
                content,
                content,
                0,
                range,
                Classification::XmlFileCData,
                &mut spans,
            ),
        });
        Ok(spans)
    }

    fn code_spans<'a>(
        &self,
        content: &'a str,
        range: Range<usize>,
        out: &mut Vec<ClassifiedSpan<'a>>,
    ) {
        let body: &'a str = &content[range.clone()];
        out.extend(
            self.code
                .classify_raw(body)
                .into_iter()
                .filter(|s| s.classification.is_comment() || s.classification.is_string_literal())
                .map(|s| s.offset_by(range.start)),
        );
    }

    fn value_spans<'a>(
        &self,
        content: &'a str,
        range: Range<usize>,
        classification: Classification,
        out: &mut Vec<ClassifiedSpan<'a>>,
    ) {
        let trimmed = trim_range(content, range.clone());
        if !content[trimmed.clone()].starts_with('=') {
            push_text_span(content, content, 0, range, classification, out);
            return;
        }
        for literal in EXPRESSION_STRING.find_iter(&content[trimmed.clone()]) {
            let start = trimmed.start + literal.start();
            out.push(ClassifiedSpan::new(
                content,
                start..start + literal.len(),
                Classification::NormalStringLiteral,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::builtin;
    use crate::classifier::markup::MarkupSettings;
    use std::time::Duration;

    fn classifier() -> ReportingServicesClassifier {
        let filter = MarkupFilter::new(&MarkupSettings::default());
        let vb = builtin::visual_basic_classifier(filter.clone(), Duration::from_secs(1)).unwrap();
        ReportingServicesClassifier::new(filter, vb)
    }

    #[test]
    fn test_expressions_keep_only_strings() {
        let content = r#"<Report><Textbox><Value>=Fields!Name.Value &amp; " total amout"</Value></Textbox><Label>Sales summary</Label></Report>"#;
        let spans = classifier().classify_raw(content).unwrap();
        let found: Vec<_> = spans.iter().map(|s| (s.classification, s.text)).collect();
        assert_eq!(
            found,
            vec![
                (Classification::NormalStringLiteral, "\" total amout\""),
                (Classification::InnerText, "Sales summary"),
            ]
        );
    }

    #[test]
    fn test_code_element_keeps_comments_and_strings() {
        let content = "<Report><Code>' Formats the valeu\nPublic Function F(x) As String\n  Return \"Totl: \" &amp; x\nEnd Function</Code></Report>";
        let spans = classifier().classify_raw(content).unwrap();
        let found: Vec<_> = spans.iter().map(|s| (s.classification, s.text)).collect();
        assert_eq!(
            found,
            vec![
                (Classification::SingleLineComment, "' Formats the valeu"),
                (Classification::NormalStringLiteral, "\"Totl: \""),
            ]
        );
    }

    #[test]
    fn test_malformed_report_is_an_error() {
        assert!(classifier().classify_raw("<Report><Code>").is_err());
    }
}
