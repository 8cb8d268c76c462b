//! The span model shared by every classifier.
//!
//! A [`ClassifiedSpan`] borrows its text from the buffer it was produced from,
//! so it is cheap to narrow, split and reclassify. Reclassification keeps the
//! extent; splitting only ever produces sub-ranges of the original span.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Classification {
    PlainText,
    SingleLineComment,
    DelimitedComment,
    QuadSlashComment,
    RegionDirective,
    NormalStringLiteral,
    VerbatimStringLiteral,
    InterpolatedStringLiteral,
    XmlDocComment,
    XmlCommentsInnerText,
    AttributeValue,
    InnerText,
    XmlFileComment,
    XmlFileCData,
    Undefined,
    Identifier,
}

impl Classification {
    pub const ALL: [Classification; 16] = [
        Classification::PlainText,
        Classification::SingleLineComment,
        Classification::DelimitedComment,
        Classification::QuadSlashComment,
        Classification::RegionDirective,
        Classification::NormalStringLiteral,
        Classification::VerbatimStringLiteral,
        Classification::InterpolatedStringLiteral,
        Classification::XmlDocComment,
        Classification::XmlCommentsInnerText,
        Classification::AttributeValue,
        Classification::InnerText,
        Classification::XmlFileComment,
        Classification::XmlFileCData,
        Classification::Undefined,
        Classification::Identifier,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Classification::PlainText => "PlainText",
            Classification::SingleLineComment => "SingleLineComment",
            Classification::DelimitedComment => "DelimitedComment",
            Classification::QuadSlashComment => "QuadSlashComment",
            Classification::RegionDirective => "RegionDirective",
            Classification::NormalStringLiteral => "NormalStringLiteral",
            Classification::VerbatimStringLiteral => "VerbatimStringLiteral",
            Classification::InterpolatedStringLiteral => "InterpolatedStringLiteral",
            Classification::XmlDocComment => "XmlDocComment",
            Classification::XmlCommentsInnerText => "XmlCommentsInnerText",
            Classification::AttributeValue => "AttributeValue",
            Classification::InnerText => "InnerText",
            Classification::XmlFileComment => "XmlFileComment",
            Classification::XmlFileCData => "XmlFileCData",
            Classification::Undefined => "Undefined",
            Classification::Identifier => "Identifier",
        }
    }

    /// Whether words inside a span of this class are handed to the word splitter.
    ///
    /// Quad-slash comments mark disabled code and unparsed doc comments are
    /// replaced by their extracted parts, so neither is checked directly.
    pub fn is_spell_checkable(self) -> bool {
        !matches!(
            self,
            Classification::QuadSlashComment
                | Classification::XmlDocComment
                | Classification::Undefined
        )
    }

    pub fn is_comment(self) -> bool {
        matches!(
            self,
            Classification::SingleLineComment
                | Classification::DelimitedComment
                | Classification::QuadSlashComment
                | Classification::XmlDocComment
                | Classification::XmlCommentsInnerText
        )
    }

    pub fn is_string_literal(self) -> bool {
        matches!(
            self,
            Classification::NormalStringLiteral
                | Classification::VerbatimStringLiteral
                | Classification::InterpolatedStringLiteral
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Classification {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownClassification(s.to_string()))
    }
}

/// A classified range of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedSpan<'a> {
    pub start: usize,
    pub classification: Classification,
    pub text: &'a str,
}

impl<'a> ClassifiedSpan<'a> {
    /// Slice `range` out of `content`. The range must lie on char boundaries.
    pub fn new(content: &'a str, range: Range<usize>, classification: Classification) -> Self {
        Self {
            start: range.start,
            classification,
            text: &content[range],
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Same extent, new classification.
    pub fn reclassify(self, classification: Classification) -> Self {
        Self {
            classification,
            ..self
        }
    }

    /// Narrow the span to an absolute sub-range of itself.
    pub fn narrow(&self, range: Range<usize>) -> Self {
        debug_assert!(range.start >= self.start && range.end <= self.end());
        Self {
            start: range.start,
            classification: self.classification,
            text: &self.text[range.start - self.start..range.end - self.start],
        }
    }

    /// Shift the span by `offset`, used when a classifier ran over a slice.
    pub fn offset_by(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            ..self
        }
    }

    pub fn contains_range(&self, range: &Range<usize>) -> bool {
        self.start <= range.start && range.end <= self.end()
    }

    pub fn overlaps(&self, range: &Range<usize>) -> bool {
        self.start < range.end && range.start < self.end()
    }
}

/// Sort by start offset and drop empty spans.
pub fn normalize(mut spans: Vec<ClassifiedSpan<'_>>) -> Vec<ClassifiedSpan<'_>> {
    spans.retain(|s| !s.is_empty());
    spans.sort_by_key(|s| (s.start, s.end()));
    spans
}

/// True when spans are ordered and `start[i] + len[i] <= start[i + 1]`.
pub fn is_ordered(spans: &[ClassifiedSpan<'_>]) -> bool {
    spans.windows(2).all(|w| w[0].end() <= w[1].start)
}

/// Sort and coalesce overlapping or touching ranges.
pub fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.retain(|r| r.start < r.end);
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Remove every hole from every span. A span fully covered disappears, a span
/// with a hole in the middle is split, and each surviving piece keeps the
/// original classification.
pub fn subtract_ranges<'a>(
    spans: Vec<ClassifiedSpan<'a>>,
    holes: &[Range<usize>],
) -> Vec<ClassifiedSpan<'a>> {
    let holes = merge_ranges(holes.to_vec());
    if holes.is_empty() {
        return normalize(spans);
    }

    let mut result = Vec::with_capacity(spans.len());
    for span in spans {
        let mut cursor = span.start;
        let end = span.end();

        for hole in holes.iter().filter(|h| span.overlaps(h)) {
            if hole.start > cursor {
                result.push(span.narrow(cursor..hole.start));
            }
            cursor = cursor.max(hole.end);
        }
        if cursor < end {
            result.push(span.narrow(cursor..end));
        }
    }
    normalize(result)
}

/// The undefined-span filter: pull out every `Undefined` span and subtract it
/// from everything else.
pub fn subtract_undefined(spans: Vec<ClassifiedSpan<'_>>) -> Vec<ClassifiedSpan<'_>> {
    let (undefined, rest): (Vec<_>, Vec<_>) = spans
        .into_iter()
        .partition(|s| s.classification == Classification::Undefined);
    let holes: Vec<Range<usize>> = undefined.iter().map(|s| s.range()).collect();
    subtract_ranges(rest, &holes)
}

/// Tile the whole buffer: classified spans plus unclassified gaps (`None`).
/// Concatenating the pieces reproduces `content` byte for byte.
pub fn segments<'a>(
    content: &'a str,
    spans: &[ClassifiedSpan<'a>],
) -> Vec<(Option<Classification>, &'a str)> {
    let mut pieces = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;

    for span in spans {
        if span.start > cursor {
            pieces.push((None, &content[cursor..span.start]));
        }
        pieces.push((Some(span.classification), span.text));
        cursor = span.end();
    }
    if cursor < content.len() {
        pieces.push((None, &content[cursor..]));
    }
    pieces
}
