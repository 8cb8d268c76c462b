//! Tolerant HTML classification. Never fails: unclosed tags, stray end tags
//! and unknown entities are recovered locally.

use std::ops::Range;

use super::{standard_spans, walk, MarkupFilter, MarkupMode};
use crate::classifier::span::ClassifiedSpan;

#[derive(Debug, Clone)]
pub struct HtmlClassifier {
    filter: MarkupFilter,
}

impl HtmlClassifier {
    pub fn new(filter: MarkupFilter) -> Self {
        Self { filter }
    }

    pub fn classify_raw<'a>(&self, content: &'a str) -> Vec<ClassifiedSpan<'a>> {
        self.classify_region(content, content, 0)
    }

    /// Classify `source`, a region of `content` starting at `base`. The
    /// region may be a masked copy, spans are always sliced from `content`.
    pub(crate) fn classify_region<'a>(
        &self,
        content: &'a str,
        source: &str,
        base: usize,
    ) -> Vec<ClassifiedSpan<'a>> {
        let mut spans = Vec::new();
        walk(source, MarkupMode::Html, &self.filter, &|_| false, |item| {
            standard_spans(content, source, base, item, &mut spans)
        });
        spans
    }

    pub(crate) fn classify_range<'a>(
        &self,
        content: &'a str,
        range: Range<usize>,
    ) -> Vec<ClassifiedSpan<'a>> {
        self.classify_region(content, &content[range.clone()], range.start)
    }
}
