//! Structured extraction of XML documentation comments.
//!
//! Adjacent doc comment lines form one block. The comment delimiters are
//! masked out, the block is parsed as an XML fragment, and only element text
//! and listed attribute values survive. A block that does not parse is kept
//! whole as comment text.

use std::ops::Range;
use tracing::debug;

use super::code::CommentDelimiters;
use super::markup::{
    mask_ranges, push_text_span, validate_xml, walk, Item, MarkupFilter, MarkupMode,
};
use super::span::{subtract_ranges, ClassifiedSpan, Classification};

#[derive(Debug, Clone)]
pub struct DocCommentExtractor {
    filter: MarkupFilter,
}

impl DocCommentExtractor {
    pub fn new(filter: MarkupFilter) -> Self {
        Self { filter }
    }

    /// Replace every `XmlDocComment` span with its extracted parts. Other
    /// spans pass through untouched.
    pub fn extract<'a>(
        &self,
        content: &'a str,
        spans: Vec<ClassifiedSpan<'a>>,
        delimiters: &CommentDelimiters,
    ) -> Vec<ClassifiedSpan<'a>> {
        let mut result = Vec::with_capacity(spans.len());
        let mut block: Vec<ClassifiedSpan<'a>> = Vec::new();

        for span in spans {
            if span.classification != Classification::XmlDocComment {
                result.push(span);
                continue;
            }
            let joins = block
                .last()
                .is_some_and(|prev| content[prev.end()..span.start].trim().is_empty());
            if !joins && !block.is_empty() {
                result.extend(self.extract_block(content, &block, delimiters));
                block.clear();
            }
            block.push(span);
        }
        if !block.is_empty() {
            result.extend(self.extract_block(content, &block, delimiters));
        }

        result.sort_by_key(|s| (s.start, s.end()));
        result
    }

    fn extract_block<'a>(
        &self,
        content: &'a str,
        block: &[ClassifiedSpan<'a>],
        delimiters: &CommentDelimiters,
    ) -> Vec<ClassifiedSpan<'a>> {
        let (Some(first), Some(last)) = (block.first(), block.last()) else {
            return Vec::new();
        };
        let region = first.start..last.end();
        let markers: Vec<Range<usize>> = block
            .iter()
            .flat_map(|span| delimiter_ranges(span, delimiters))
            .collect();

        let relative: Vec<Range<usize>> = markers
            .iter()
            .map(|r| r.start - region.start..r.end - region.start)
            .collect();
        let masked = mask_ranges(&content[region.clone()], &relative);

        if let Err(e) = validate_xml(&masked, false) {
            debug!(offset = region.start, "doc comment is not well-formed, keeping it as text: {e}");
            let whole = block
                .iter()
                .map(|s| s.reclassify(Classification::XmlCommentsInnerText))
                .collect();
            return subtract_ranges(whole, &markers);
        }

        let mut extracted = Vec::new();
        walk(&masked, MarkupMode::Xml, &self.filter, &|_| false, |item| match item {
            Item::Text { range, .. } => push_text_span(
                content,
                &masked,
                region.start,
                range,
                Classification::XmlCommentsInnerText,
                &mut extracted,
            ),
            Item::Attribute { value } => push_text_span(
                content,
                &masked,
                region.start,
                value,
                Classification::AttributeValue,
                &mut extracted,
            ),
            Item::Comment(_) | Item::CData(_) => {}
        });

        let (undefined, kept): (Vec<_>, Vec<_>) = extracted
            .into_iter()
            .partition(|s| s.classification == Classification::Undefined);
        let mut spans = subtract_ranges(kept, &markers);
        spans.extend(undefined);
        spans
    }
}

/// Byte ranges of comment punctuation inside one doc comment span: the
/// opening delimiter, a closing `*/`, and the leading `*` of continuation
/// lines in a delimited comment.
fn delimiter_ranges(span: &ClassifiedSpan<'_>, delimiters: &CommentDelimiters) -> Vec<Range<usize>> {
    let text = span.text;
    let mut ranges = Vec::new();

    let opener = [&delimiters.doc_comment, &delimiters.old_style_doc_comment]
        .into_iter()
        .flatten()
        .filter(|d| text.starts_with(d.as_str()))
        .map(|d| d.len())
        .max()
        .unwrap_or(0);
    if opener > 0 {
        ranges.push(span.start..span.start + opener);
    }

    let delimited = text.starts_with("/*");
    if delimited && text.len() >= opener + 2 && text.ends_with("*/") {
        ranges.push(span.end() - 2..span.end());
    }

    if delimited {
        let mut line_start = 0;
        for line in text.split_inclusive('\n') {
            if line_start > 0 {
                let indent = line.len() - line.trim_start().len();
                let rest = &line[indent..];
                if rest.starts_with('*') && !rest.starts_with("*/") {
                    let at = span.start + line_start + indent;
                    ranges.push(at..at + 1);
                }
            }
            line_start += line.len();
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::markup::MarkupSettings;

    fn extractor() -> DocCommentExtractor {
        DocCommentExtractor::new(MarkupFilter::new(&MarkupSettings::default()))
    }

    fn delimiters() -> CommentDelimiters {
        CommentDelimiters {
            doc_comment: Some("///".into()),
            quad_slash: Some("////".into()),
            old_style_doc_comment: Some("/**".into()),
        }
    }

    fn doc_spans(content: &str) -> Vec<ClassifiedSpan<'_>> {
        let mut spans = Vec::new();
        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            if let Some(at) = line.find("///") {
                let start = offset + at;
                let end = offset + line.trim_end().len();
                spans.push(ClassifiedSpan::new(content, start..end, Classification::XmlDocComment));
            }
            offset += line.len();
        }
        spans
    }

    #[test]
    fn test_extracts_text_across_lines() {
        let content = "    /// <summary>\n    /// Adds two numbres.\n    /// </summary>\n    /// <param name=\"a\">First <c>lhs</c> value</param>\n    int Add(int a);";
        let spans = extractor().extract(content, doc_spans(content), &delimiters());
        let texts: Vec<_> = spans.iter().map(|s| (s.classification, s.text)).collect();
        assert_eq!(
            texts,
            vec![
                (Classification::XmlCommentsInnerText, "Adds two numbres."),
                (Classification::XmlCommentsInnerText, "First"),
                (Classification::XmlCommentsInnerText, "value"),
            ]
        );
    }

    #[test]
    fn test_malformed_block_degrades_to_text() {
        let content = "/// <summary>Broken <b>markup\n/// continues</summary>\n";
        let spans = extractor().extract(content, doc_spans(content), &delimiters());
        assert!(spans
            .iter()
            .all(|s| s.classification == Classification::XmlCommentsInnerText));
        assert!(spans.iter().any(|s| s.text.contains("Broken")));
        assert!(spans.iter().all(|s| !s.text.starts_with("///")));
    }

    #[test]
    fn test_delimited_doc_comment() {
        let content = "/**\n * <summary>Retruns the value.</summary>\n */";
        let spans = vec![ClassifiedSpan::new(
            content,
            0..content.len(),
            Classification::XmlDocComment,
        )];
        let spans = extractor().extract(content, spans, &delimiters());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Retruns the value.");
    }

    #[test]
    fn test_other_spans_pass_through() {
        let content = "// plain\n/// <summary>Doc</summary>";
        let spans = vec![
            ClassifiedSpan::new(content, 0..8, Classification::SingleLineComment),
            ClassifiedSpan::new(content, 9..content.len(), Classification::XmlDocComment),
        ];
        let spans = extractor().extract(content, spans, &delimiters());
        assert_eq!(spans[0].classification, Classification::SingleLineComment);
        assert_eq!(spans[1].text, "Doc");
    }

    #[test]
    fn test_non_ascii_doc_comment() {
        let content = "/// <summary>Überprüft den Wert.</summary>\n/// <param name=\"x\">Größe</param>\nvoid Prüfe(int x);";
        let spans = extractor().extract(content, doc_spans(content), &delimiters());
        let texts: Vec<_> = spans.iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["Überprüft den Wert.", "Größe"]);
    }
}
