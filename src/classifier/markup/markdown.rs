//! Markdown: prose plus embedded HTML. Code, front matter and link targets
//! are reported as `Undefined` so the undefined-span filter removes them.

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};
use std::ops::Range;

use super::html::HtmlClassifier;
use super::{mask_ranges, MarkupFilter};
use crate::classifier::span::{ClassifiedSpan, Classification};

#[derive(Debug, Clone)]
pub struct MarkdownClassifier {
    html: HtmlClassifier,
}

impl MarkdownClassifier {
    pub fn new(filter: MarkupFilter) -> Self {
        Self {
            html: HtmlClassifier::new(filter),
        }
    }

    pub fn classify_raw<'a>(&self, content: &'a str) -> Vec<ClassifiedSpan<'a>> {
        let excluded = excluded_ranges(content);
        let masked = mask_ranges(content, &excluded);

        let mut spans = self.html.classify_region(content, &masked, 0);
        spans.extend(
            excluded
                .into_iter()
                .filter(|r| !r.is_empty())
                .map(|r| ClassifiedSpan::new(content, r, Classification::Undefined)),
        );
        spans
    }
}

/// Code blocks, inline code, metadata blocks, link destinations and autolinks.
fn excluded_ranges(content: &str) -> Vec<Range<usize>> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let mut excluded = Vec::new();

    for (event, range) in Parser::new_ext(content, options).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Start(Tag::MetadataBlock(_)) => {
                excluded.push(range)
            }
            Event::Code(_) => excluded.push(range),
            Event::Start(Tag::Link { link_type, .. }) | Event::Start(Tag::Image { link_type, .. }) => {
                match link_type {
                    LinkType::Autolink | LinkType::Email => excluded.push(range),
                    _ => {
                        if let Some(destination) = link_destination(content, &range) {
                            excluded.push(destination);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    excluded
}

/// The `(...)` part of an inline link, including the parentheses.
fn link_destination(content: &str, range: &Range<usize>) -> Option<Range<usize>> {
    let text = &content[range.clone()];
    if !text.ends_with(')') {
        return None;
    }
    let open = text.rfind("](")?;
    Some(range.start + open + 1..range.end)
}
