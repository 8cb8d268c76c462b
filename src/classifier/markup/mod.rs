//! Markup scanning shared by the XML, HTML, Markdown, resource file and
//! report definition classifiers, and by the doc comment extraction pass.
//!
//! [`Tokenizer`] is tolerant: it never fails, it only degrades. Strictness for
//! the XML variants comes from [`validate_xml`] running first.

pub mod html;
pub mod markdown;
pub mod reporting;
pub mod xml;

use lazy_static::lazy_static;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::ops::Range;

use super::span::{ClassifiedSpan, Classification};
use crate::error::ClassificationError;

lazy_static! {
    static ref ENTITY: Regex =
        Regex::new(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap();
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Element and attribute lists that steer every markup classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupSettings {
    /// Elements whose content (and attributes) are never spell checked.
    pub ignored_elements: Vec<String>,
    /// The only attributes whose values are spell checked.
    pub spell_checked_attributes: Vec<String>,
}

impl Default for MarkupSettings {
    fn default() -> Self {
        Self {
            ignored_elements: [
                "c",
                "code",
                "codeEntityReference",
                "codeInline",
                "codeReference",
                "command",
                "environmentVariable",
                "fictitiousUri",
                "foreignControl",
                "hardware",
                "kbd",
                "language",
                "legacySyntax",
                "literal",
                "localUri",
                "math",
                "pre",
                "samp",
                "script",
                "style",
                "unmanagedCodeEntityReference",
                "userInput",
                "var",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            spell_checked_attributes: [
                "alt",
                "altText",
                "caption",
                "content",
                "declare",
                "header",
                "label",
                "lead",
                "message",
                "placeholder",
                "summary",
                "text",
                "title",
                "toolTip",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Case-folded lookup sets built from [`MarkupSettings`].
#[derive(Debug, Clone, Default)]
pub struct MarkupFilter {
    ignored_elements: HashSet<String>,
    spell_checked_attributes: HashSet<String>,
}

impl MarkupFilter {
    pub fn new(settings: &MarkupSettings) -> Self {
        Self {
            ignored_elements: settings
                .ignored_elements
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            spell_checked_attributes: settings
                .spell_checked_attributes
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    pub fn with_ignored_elements<'n>(mut self, names: impl IntoIterator<Item = &'n str>) -> Self {
        self.ignored_elements
            .extend(names.into_iter().map(|s| s.to_lowercase()));
        self
    }

    /// Matches on the qualified name or on the local name after a prefix.
    pub fn is_ignored_element(&self, name: &str) -> bool {
        name_in(&self.ignored_elements, name)
    }

    pub fn is_spell_checked_attribute(&self, name: &str) -> bool {
        name_in(&self.spell_checked_attributes, name)
    }
}

fn name_in(set: &HashSet<String>, name: &str) -> bool {
    let lower = name.to_lowercase();
    set.contains(&lower) || set.contains(local_name(&lower))
}

pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkupMode {
    /// Names are compared exactly; no void or raw-text elements.
    Xml,
    /// Void elements, raw-text `script`/`style`, unquoted attributes,
    /// case-insensitive end tags.
    Html,
}

#[derive(Debug, Clone)]
pub(crate) struct Attribute {
    pub name: Range<usize>,
    pub value: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub(crate) struct StartTag<'s> {
    pub name: &'s str,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
    source: &'s str,
}

impl<'s> StartTag<'s> {
    pub fn attribute(&self, name: &str) -> Option<&'s str> {
        self.attributes.iter().find_map(|attr| {
            let attr_name = &self.source[attr.name.clone()];
            if attr_name.eq_ignore_ascii_case(name) || local_name(attr_name).eq_ignore_ascii_case(name)
            {
                Some(attr.value.clone().map_or("", |v| &self.source[v]))
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Token<'s> {
    Start(StartTag<'s>),
    End(&'s str),
    Text(Range<usize>),
    Comment(Range<usize>),
    CData(Range<usize>),
    /// Declarations, processing instructions and server blocks.
    Other,
}

/// Splits markup into tokens with byte ranges into the source.
pub(crate) struct Tokenizer<'s> {
    source: &'s str,
    pos: usize,
    mode: MarkupMode,
    pending: VecDeque<Token<'s>>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str, mode: MarkupMode) -> Self {
        Self {
            source,
            pos: 0,
            mode,
            pending: VecDeque::new(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    /// Whether the `<` at `at` opens a markup construct.
    fn opens_markup(&self, at: usize) -> bool {
        let mut chars = self.source[at + 1..].chars();
        match chars.next() {
            Some('!') | Some('?') | Some('%') => true,
            Some('/') => chars.next().is_some_and(is_name_start),
            Some(c) => is_name_start(c),
            None => false,
        }
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.source[from..].find(needle).map(|i| from + i)
    }

    /// Skip past `terminator` starting at `from`, or to the end of the input.
    fn skip_to(&mut self, from: usize, terminator: &str) -> Range<usize> {
        match self.find_from(from, terminator) {
            Some(end) => {
                self.pos = end + terminator.len();
                from..end
            }
            None => {
                self.pos = self.source.len();
                from..self.source.len()
            }
        }
    }

    fn text(&mut self) -> Token<'s> {
        let start = self.pos;
        let mut search = start + self.rest().chars().next().map_or(1, char::len_utf8);

        loop {
            match self.find_from(search, "<") {
                Some(lt) if self.opens_markup(lt) => {
                    self.pos = lt;
                    break;
                }
                Some(lt) => search = lt + 1,
                None => {
                    self.pos = self.source.len();
                    break;
                }
            }
        }
        Token::Text(start..self.pos)
    }

    fn markup(&mut self) -> Option<Token<'s>> {
        let rest = self.rest();
        let start = self.pos;

        if rest.starts_with("<!--") {
            return Some(Token::Comment(self.skip_to(start + 4, "-->")));
        }
        if rest.starts_with("<![CDATA[") {
            return Some(Token::CData(self.skip_to(start + 9, "]]>")));
        }
        if rest.starts_with("<?") {
            self.skip_to(start + 2, "?>");
            return Some(Token::Other);
        }
        if rest.starts_with("<%") {
            self.skip_to(start + 2, "%>");
            return Some(Token::Other);
        }
        if rest.starts_with("<!") {
            self.skip_to(start + 2, ">");
            return Some(Token::Other);
        }
        if rest.starts_with("</") {
            let name_end = self.scan_name(start + 2);
            if name_end == start + 2 {
                return None;
            }
            let name = &self.source[start + 2..name_end];
            self.skip_to(name_end, ">");
            return Some(Token::End(name));
        }
        self.start_tag(start)
    }

    fn scan_name(&self, from: usize) -> usize {
        let mut end = from;
        for (i, c) in self.source[from..].char_indices() {
            let ok = if i == 0 { is_name_start(c) } else { is_name_char(c) };
            if !ok {
                break;
            }
            end = from + i + c.len_utf8();
        }
        end
    }

    fn skip_whitespace(&self, mut at: usize) -> usize {
        let bytes = self.source.as_bytes();
        while at < bytes.len() && bytes[at].is_ascii_whitespace() {
            at += 1;
        }
        at
    }

    fn start_tag(&mut self, start: usize) -> Option<Token<'s>> {
        let bytes = self.source.as_bytes();
        let name_end = self.scan_name(start + 1);
        if name_end == start + 1 {
            return None;
        }
        let name = &self.source[start + 1..name_end];
        let mut attributes = Vec::new();
        let mut self_closing = false;
        let mut at = name_end;

        loop {
            at = self.skip_whitespace(at);
            if at >= bytes.len() {
                // An unterminated tag is only text
                return None;
            }
            match bytes[at] {
                b'>' => {
                    at += 1;
                    break;
                }
                b'/' if bytes.get(at + 1) == Some(&b'>') => {
                    at += 2;
                    self_closing = true;
                    break;
                }
                b'/' => {
                    at += 1;
                    continue;
                }
                // A new tag begins before this one closed
                b'<' => break,
                _ => {}
            }

            let attr_start = at;
            while at < bytes.len()
                && !bytes[at].is_ascii_whitespace()
                && !matches!(bytes[at], b'=' | b'>' | b'/' | b'<' | b'"' | b'\'')
            {
                at += 1;
            }
            if at == attr_start {
                // Stray quote
                at += 1;
                continue;
            }
            let attr_name = attr_start..at;

            at = self.skip_whitespace(at);
            if bytes.get(at) != Some(&b'=') {
                attributes.push(Attribute {
                    name: attr_name,
                    value: None,
                });
                continue;
            }
            at = self.skip_whitespace(at + 1);

            let value = match bytes.get(at) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = at + 1;
                    match self.source[value_start..].find(quote as char) {
                        Some(i) => {
                            at = value_start + i + 1;
                            value_start..value_start + i
                        }
                        None => {
                            let end = self
                                .find_from(value_start, ">")
                                .unwrap_or(self.source.len());
                            at = end;
                            value_start..end
                        }
                    }
                }
                Some(_) => {
                    let value_start = at;
                    while at < bytes.len() && !bytes[at].is_ascii_whitespace() && bytes[at] != b'>'
                    {
                        at += 1;
                    }
                    value_start..at
                }
                None => at..at,
            };
            attributes.push(Attribute {
                name: attr_name,
                value: Some(value),
            });
        }

        self.pos = at;

        if self.mode == MarkupMode::Html
            && !self_closing
            && RAW_TEXT_ELEMENTS.iter().any(|r| r.eq_ignore_ascii_case(name))
        {
            let closing = format!("</{}", name.to_ascii_lowercase());
            let raw_end = self.source[at..]
                .to_ascii_lowercase()
                .find(&closing)
                .map_or(self.source.len(), |i| at + i);
            if raw_end > at {
                self.pending.push_back(Token::Text(at..raw_end));
            }
            self.pos = raw_end;
        }

        Some(Token::Start(StartTag {
            name,
            attributes,
            self_closing,
            source: self.source,
        }))
    }
}

impl<'s> Iterator for Tokenizer<'s> {
    type Item = Token<'s>;

    fn next(&mut self) -> Option<Token<'s>> {
        if let Some(token) = self.pending.pop_front() {
            return Some(token);
        }
        if self.pos >= self.source.len() {
            return None;
        }
        if self.rest().starts_with('<') && self.opens_markup(self.pos) {
            if let Some(token) = self.markup() {
                return Some(token);
            }
        }
        Some(self.text())
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

/// What the walker reports, already filtered by the ignored element stack.
#[derive(Debug, Clone)]
pub(crate) enum Item<'s> {
    Text {
        range: Range<usize>,
        element: Option<&'s str>,
    },
    Attribute {
        value: Range<usize>,
    },
    Comment(Range<usize>),
    CData(Range<usize>),
}

struct OpenElement<'s> {
    name: &'s str,
    ignored: bool,
}

/// Walk the element structure, suppressing everything inside ignored elements
/// and reporting only spell checked attributes. `also_ignore` lets a variant
/// add file-specific carve-outs.
pub(crate) fn walk<'s>(
    source: &'s str,
    mode: MarkupMode,
    filter: &MarkupFilter,
    also_ignore: &dyn Fn(&StartTag<'s>) -> bool,
    mut visit: impl FnMut(Item<'s>),
) {
    let mut stack: Vec<OpenElement<'s>> = Vec::new();
    let mut ignored_depth = 0usize;

    for token in Tokenizer::new(source, mode) {
        match token {
            Token::Start(tag) => {
                let ignored = filter.is_ignored_element(tag.name) || also_ignore(&tag);
                if ignored_depth == 0 && !ignored {
                    for attr in &tag.attributes {
                        let Some(value) = attr.value.clone() else { continue };
                        if filter.is_spell_checked_attribute(&source[attr.name.clone()]) {
                            visit(Item::Attribute { value });
                        }
                    }
                }

                let void = mode == MarkupMode::Html
                    && VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag.name));
                if !tag.self_closing && !void {
                    if ignored {
                        ignored_depth += 1;
                    }
                    stack.push(OpenElement {
                        name: tag.name,
                        ignored,
                    });
                }
            }
            Token::End(name) => {
                let matches = |open: &OpenElement<'_>| match mode {
                    MarkupMode::Xml => open.name == name,
                    MarkupMode::Html => open.name.eq_ignore_ascii_case(name),
                };
                // Stray end tags are dropped; a match closes everything above it
                if let Some(index) = stack.iter().rposition(matches) {
                    for open in stack.drain(index..) {
                        if open.ignored {
                            ignored_depth -= 1;
                        }
                    }
                }
            }
            Token::Text(range) if ignored_depth == 0 => visit(Item::Text {
                range,
                element: stack.last().map(|open| open.name),
            }),
            Token::Comment(range) if ignored_depth == 0 => visit(Item::Comment(range)),
            Token::CData(range) if ignored_depth == 0 => visit(Item::CData(range)),
            _ => {}
        }
    }
}

/// Shrink a range of `source` to exclude surrounding whitespace.
pub(crate) fn trim_range(source: &str, range: Range<usize>) -> Range<usize> {
    let text = &source[range.clone()];
    let lead = text.len() - text.trim_start().len();
    let trail = text.len() - text.trim_end().len();
    if lead == text.len() {
        return range.start..range.start;
    }
    range.start + lead..range.end - trail
}

/// Emit a span for `range` of `source` (offset by `base` into `content`),
/// plus `Undefined` spans for each entity reference inside it.
pub(crate) fn push_text_span<'a>(
    content: &'a str,
    source: &str,
    base: usize,
    range: Range<usize>,
    classification: Classification,
    out: &mut Vec<ClassifiedSpan<'a>>,
) {
    let range = trim_range(source, range);
    if range.is_empty() {
        return;
    }
    for entity in ENTITY.find_iter(&source[range.clone()]) {
        let start = base + range.start + entity.start();
        out.push(ClassifiedSpan::new(
            content,
            start..start + entity.len(),
            Classification::Undefined,
        ));
    }
    out.push(ClassifiedSpan::new(
        content,
        base + range.start..base + range.end,
        classification,
    ));
}

/// Map walker items to spans using the standard classifications.
pub(crate) fn standard_spans<'a>(
    content: &'a str,
    source: &str,
    base: usize,
    item: Item<'_>,
    out: &mut Vec<ClassifiedSpan<'a>>,
) {
    match item {
        Item::Text { range, .. } => {
            push_text_span(content, source, base, range, Classification::InnerText, out)
        }
        Item::Attribute { value } => push_text_span(
            content,
            source,
            base,
            value,
            Classification::AttributeValue,
            out,
        ),
        Item::Comment(range) => push_text_span(
            content,
            source,
            base,
            range,
            Classification::XmlFileComment,
            out,
        ),
        Item::CData(range) => push_text_span(
            content,
            source,
            base,
            range,
            Classification::XmlFileCData,
            out,
        ),
    }
}

/// Copy `content` with every byte of `ranges` turned into a space. Line
/// breaks survive so offsets and line structure line up with the original.
pub(crate) fn mask_ranges(content: &str, ranges: &[Range<usize>]) -> String {
    let ranges = super::span::merge_ranges(ranges.to_vec());
    let mut masked = String::with_capacity(content.len());
    let mut next = ranges.iter().peekable();

    for (i, c) in content.char_indices() {
        while next.peek().is_some_and(|r| r.end <= i) {
            next.next();
        }
        let hidden = next.peek().is_some_and(|r| r.start <= i);
        if hidden && c != '\n' && c != '\r' {
            masked.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            masked.push(c);
        }
    }
    masked
}

/// Check that `source` is well-formed XML.
///
/// With `require_root` the buffer must hold exactly one root element and no
/// text outside it; without it the buffer is checked as an element fragment.
pub(crate) fn validate_xml(source: &str, require_root: bool) -> Result<(), ClassificationError> {
    let mut reader = Reader::from_str(source);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Empty(_)) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            Ok(Event::Text(text)) => {
                if require_root && depth == 0 && !text.iter().all(|b| b.is_ascii_whitespace()) {
                    return Err(ClassificationError::malformed(
                        position,
                        "text outside the root element",
                    ));
                }
            }
            Ok(Event::CData(_)) if require_root && depth == 0 => {
                return Err(ClassificationError::malformed(
                    position,
                    "CDATA outside the root element",
                ));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ClassificationError::malformed(
                    reader.error_position() as usize,
                    e.to_string(),
                ))
            }
        }
        if require_root && roots > 1 {
            return Err(ClassificationError::malformed(
                position,
                "more than one root element",
            ));
        }
    }

    if depth > 0 {
        return Err(ClassificationError::malformed(
            source.len(),
            "unclosed element at end of input",
        ));
    }
    if require_root && roots == 0 {
        return Err(ClassificationError::malformed(0, "no root element"));
    }
    Ok(())
}
