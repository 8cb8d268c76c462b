//! Splitting classified text into candidate words.
//!
//! [`WordSplitter`] handles natural-language spans: it skips escape
//! sequences, format specifiers, interpolation holes, inline tags, and
//! path/e-mail/URL tokens before cutting the rest into words.
//! [`split_identifier`] is the plain case-transition splitter for identifiers.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

use crate::classifier::script::BRACED_EXPRESSION;
use crate::classifier::span::merge_ranges;

lazy_static! {
    static ref ESCAPE: Regex = Regex::new(
        r"\\(?:x[0-9a-fA-F]{1,4}|u[0-9a-fA-F]{4}|U[0-9a-fA-F]{8}|[0-7]{1,3}|[^'])"
    )
    .unwrap();
    static ref NET_FORMAT: Regex =
        Regex::new(r"\{\d+(?:\s*,\s*[-+]?\d+)?(?::[^{}]*)?\}").unwrap();
    static ref C_FORMAT: Regex = Regex::new(
        r"%[-+#0]*(?:\d+|\*)?(?:\.(?:\d+|\*))?(?:hh|h|ll|l|L|z|j|t)?[diouxXeEfFgGaAcspn%]"
    )
    .unwrap();
    static ref XML_ELEMENT: Regex =
        Regex::new(r"</?[A-Za-z][\w:.-]*(?:\s[^<>]*)?/?>").unwrap();
    static ref TOKEN: Regex = Regex::new(r"\S+").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[\w.+-]+@[\w-]+(?:\.[\w-]+)+$").unwrap();
    static ref URL: Regex = Regex::new(r"^(?:[A-Za-z][\w+.-]*://|www\.)\S+$").unwrap();
    static ref PATH: Regex =
        Regex::new(r"^(?:[A-Za-z]:[\\/][\w.\\/~-]*|[\w.~-]*/[\w.\\/~-]+)$").unwrap();
    static ref BACKSLASH_PATH: Regex = Regex::new(r"^[\w.~-]*\\[\w.\\~-]+$").unwrap();
    static ref FILENAME: Regex = Regex::new(r"^[\w-]+(?:\.[\w-]+)*\.[a-z0-9]{1,5}$").unwrap();
}

/// Characters trimmed from a token before matching it as a path or address.
const TOKEN_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '"', '\'', '<', '>', '`',
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordSplitterOptions {
    pub ignore_words_with_digits: bool,
    pub ignore_all_uppercase: bool,
    /// When false, mixed-case words are checked part by part instead.
    pub ignore_mixed_case: bool,
    pub treat_underscore_as_separator: bool,
    pub ignore_mnemonics: bool,
    pub mnemonic_character: char,
    pub ignore_format_specifiers: bool,
    pub ignore_filenames_and_email_addresses: bool,
    pub ignore_xml_elements_in_text: bool,
    pub ignore_single_letters: bool,
}

impl Default for WordSplitterOptions {
    fn default() -> Self {
        Self {
            ignore_words_with_digits: true,
            ignore_all_uppercase: true,
            ignore_mixed_case: false,
            treat_underscore_as_separator: false,
            ignore_mnemonics: true,
            mnemonic_character: '&',
            ignore_format_specifiers: true,
            ignore_filenames_and_email_addresses: true,
            ignore_xml_elements_in_text: true,
            ignore_single_letters: true,
        }
    }
}

/// Per-span facts the splitter cannot infer from the text alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitContext {
    /// Backslash escapes are live (false inside verbatim strings).
    pub escapes: bool,
    /// `{...}` holes are code.
    pub interpolated: bool,
    /// Mnemonic character of the file's classifier, if it overrides the option.
    pub mnemonic: Option<char>,
}

impl Default for SplitContext {
    fn default() -> Self {
        Self {
            escapes: true,
            interpolated: false,
            mnemonic: None,
        }
    }
}

/// A candidate word. `start` and `length` locate it in the text it was split
/// from; `text` is the literal word with any mnemonic character removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub start: usize,
    pub length: usize,
    pub text: String,
}

impl Word {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.length
    }

    pub fn offset_by(mut self, offset: usize) -> Self {
        self.start += offset;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct WordSplitter {
    options: WordSplitterOptions,
}

impl WordSplitter {
    pub fn new(options: WordSplitterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WordSplitterOptions {
        &self.options
    }

    pub fn split(&self, text: &str, context: SplitContext) -> Vec<Word> {
        let mnemonic = if self.options.ignore_mnemonics {
            Some(context.mnemonic.unwrap_or(self.options.mnemonic_character))
        } else {
            None
        };

        let mut escape_ends = Vec::new();
        let excluded = self.excluded_ranges(text, context, &mut escape_ends);

        let mut words = Vec::new();
        for run in self.runs(text, &excluded, mnemonic, context.escapes) {
            if escape_ends.contains(&run.start) {
                continue;
            }
            self.accept(text, run, mnemonic, &mut words);
        }
        words
    }

    fn excluded_ranges(
        &self,
        text: &str,
        context: SplitContext,
        escape_ends: &mut Vec<usize>,
    ) -> Vec<Range<usize>> {
        let mut excluded = Vec::new();

        if context.escapes {
            for m in ESCAPE.find_iter(text) {
                escape_ends.push(m.end());
                excluded.push(m.range());
            }
        }
        if context.interpolated {
            excluded.extend(BRACED_EXPRESSION.find_iter(text).map(|m| m.range()));
        }
        if self.options.ignore_format_specifiers {
            excluded.extend(NET_FORMAT.find_iter(text).map(|m| m.range()));
            excluded.extend(C_FORMAT.find_iter(text).map(|m| m.range()));
        }
        if self.options.ignore_xml_elements_in_text {
            excluded.extend(XML_ELEMENT.find_iter(text).map(|m| m.range()));
        }
        if self.options.ignore_filenames_and_email_addresses {
            for token in TOKEN.find_iter(text) {
                let trimmed = token.as_str().trim_matches(TOKEN_PUNCTUATION);
                if trimmed.is_empty() {
                    continue;
                }
                // With live escapes a lone backslash starts an escape, not a path
                if EMAIL.is_match(trimmed)
                    || URL.is_match(trimmed)
                    || PATH.is_match(trimmed)
                    || (!context.escapes && BACKSLASH_PATH.is_match(trimmed))
                    || FILENAME.is_match(trimmed)
                {
                    excluded.push(token.range());
                }
            }
        }
        merge_ranges(excluded)
    }

    /// Maximal runs of word graphemes outside `excluded`. Apostrophes and
    /// the mnemonic join a run; they are trimmed or stripped later.
    fn runs(
        &self,
        text: &str,
        excluded: &[Range<usize>],
        mnemonic: Option<char>,
        escapes: bool,
    ) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut current: Option<usize> = None;
        let mut holes = excluded.iter().peekable();
        let mut skip_to = 0;

        for (i, grapheme) in text.grapheme_indices(true) {
            if i < skip_to {
                continue;
            }
            while holes.peek().is_some_and(|h| h.end <= i) {
                holes.next();
            }
            let hidden = holes.peek().is_some_and(|h| h.start <= i);
            let ch = grapheme.chars().next().unwrap_or(' ');

            // An escaped apostrophe stays inside the word
            let escaped_apostrophe = escapes && ch == '\\' && text[i + 1..].starts_with('\'');
            let joins = !hidden
                && (ch.is_alphanumeric()
                    || is_apostrophe(ch)
                    || escaped_apostrophe
                    || Some(ch) == mnemonic
                    || (ch == '_' && !self.options.treat_underscore_as_separator));

            match (joins, current) {
                (true, None) => current = Some(i),
                (false, Some(start)) => {
                    runs.push(start..i);
                    current = None;
                }
                _ => {}
            }
            if escaped_apostrophe {
                skip_to = i + 2;
            }
        }
        if let Some(start) = current {
            runs.push(start..text.len());
        }
        runs
    }

    fn accept(&self, text: &str, run: Range<usize>, mnemonic: Option<char>, words: &mut Vec<Word>) {
        let edge = |c: char| is_apostrophe(c) || c == '_' || c == '\\' || Some(c) == mnemonic;
        let slice = &text[run.clone()];
        let lead = slice.len() - slice.trim_start_matches(edge).len();
        let trimmed = slice.trim_matches(edge);
        if trimmed.is_empty() {
            return;
        }
        let start = run.start + lead;

        let literal: String = trimmed
            .chars()
            .filter(|c| Some(*c) != mnemonic && *c != '\\')
            .collect();

        if literal.contains('_') {
            return;
        }
        if literal.chars().all(|c| c.is_numeric()) {
            return;
        }
        if self.options.ignore_words_with_digits && literal.chars().any(|c| c.is_numeric()) {
            return;
        }

        let letters = || literal.chars().filter(|c| c.is_alphabetic());
        let all_upper = letters().all(char::is_uppercase);
        if self.options.ignore_all_uppercase && all_upper && letters().count() > 1 {
            return;
        }

        let mixed = !all_upper && literal.chars().skip(1).any(char::is_uppercase);
        if mixed {
            if self.options.ignore_mixed_case {
                return;
            }
            // Only a plain run can be split by offset without a mnemonic in the way
            if literal.len() == trimmed.len() {
                for part in split_identifier(trimmed) {
                    self.push(part.offset_by(start), words);
                }
                return;
            }
        }

        self.push(
            Word {
                start,
                length: trimmed.len(),
                text: literal,
            },
            words,
        );
    }

    fn push(&self, word: Word, words: &mut Vec<Word>) {
        if self.options.ignore_single_letters && word.text.chars().count() < 2 {
            return;
        }
        words.push(word);
    }
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

/// Split an identifier on case transitions, acronym boundaries, digits and
/// non-alphanumeric separators. Digit-only parts are dropped.
///
/// `parseHTTPResponse2` yields `parse`, `HTTP`, `Response`.
pub fn split_identifier(identifier: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let chars: Vec<(usize, char)> = identifier.char_indices().collect();
    let mut start: Option<usize> = None;

    let flush = |from: usize, to: usize, words: &mut Vec<Word>| {
        let part = &identifier[from..to];
        if !part.is_empty() && !part.chars().all(|c| c.is_numeric()) {
            words.push(Word {
                start: from,
                length: part.len(),
                text: part.to_string(),
            });
        }
    };

    for (index, &(i, ch)) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if let Some(s) = start.take() {
                flush(s, i, &mut words);
            }
            continue;
        }
        let Some(s) = start else {
            start = Some(i);
            continue;
        };

        let prev = chars[index - 1].1;
        let next = chars.get(index + 1).map(|&(_, c)| c);
        let boundary = (prev.is_lowercase() && ch.is_uppercase())
            || (prev.is_uppercase() && ch.is_uppercase() && next.is_some_and(char::is_lowercase))
            || (prev.is_numeric() != ch.is_numeric());

        if boundary {
            flush(s, i, &mut words);
            start = Some(i);
        }
    }
    if let Some(s) = start {
        flush(s, identifier.len(), &mut words);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(words: &[Word]) -> Vec<&str> {
        words.iter().map(|w| w.text.as_str()).collect()
    }

    fn split(text: &str) -> Vec<Word> {
        WordSplitter::default().split(text, SplitContext::default())
    }

    #[test]
    fn test_identifier_splitting() {
        let parts = split_identifier("camelCase");
        assert_eq!(texts(&parts), vec!["camel", "Case"]);
        assert_eq!(texts(&split_identifier("snake_case")), vec!["snake", "case"]);
        assert_eq!(texts(&split_identifier("kebab-case")), vec!["kebab", "case"]);
        assert_eq!(
            texts(&split_identifier("parseHTTPResponse2")),
            vec!["parse", "HTTP", "Response"]
        );
        assert_eq!(parts[1].range(), 5..9);
    }

    #[test]
    fn test_basic_words_and_offsets() {
        let text = "Hello, world! It's fine.";
        let words = split(text);
        assert_eq!(texts(&words), vec!["Hello", "world", "It's", "fine"]);
        for word in &words {
            assert_eq!(&text[word.range()], word.text);
        }
    }

    #[test]
    fn test_words_reconstruct_with_separators() {
        let text = "one two, three\tfour";
        let words = split(text);
        let mut rebuilt = String::new();
        let mut cursor = 0;
        for word in &words {
            rebuilt.push_str(&text[cursor..word.start]);
            rebuilt.push_str(&text[word.range()]);
            cursor = word.range().end;
        }
        rebuilt.push_str(&text[cursor..]);
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_escape_and_adjacent_word_skipped() {
        let words = split(r"First line\nSecond line\tthird");
        assert_eq!(texts(&words), vec!["First", "line", "line"]);
    }

    #[test]
    fn test_escaped_apostrophe_is_kept() {
        let words = split(r"don\'t stop");
        assert_eq!(texts(&words), vec!["don't", "stop"]);
        assert_eq!(words[0].length, 6);
    }

    #[test]
    fn test_verbatim_text_has_no_escapes() {
        let splitter = WordSplitter::default();
        let context = SplitContext {
            escapes: false,
            ..SplitContext::default()
        };
        let text = r#"say \"hi\" now"#;
        assert_eq!(texts(&splitter.split(text, context)), vec!["say", "hi", "now"]);
        assert_eq!(texts(&split(text)), vec!["say", "now"]);
    }

    #[test]
    fn test_mnemonic_is_stripped() {
        let words = split("&Open the &file");
        assert_eq!(texts(&words), vec!["Open", "the", "file"]);
        assert_eq!(words[0].range(), 1..5);

        let words = split("E&xit now");
        assert_eq!(texts(&words), vec!["Exit", "now"]);
        assert_eq!(words[0].length, 5);
    }

    #[test]
    fn test_digits_uppercase_and_underscores() {
        let words = split("HTTP abc123 snake_case plain");
        assert_eq!(texts(&words), vec!["plain"]);

        let splitter = WordSplitter::new(WordSplitterOptions {
            treat_underscore_as_separator: true,
            ..WordSplitterOptions::default()
        });
        let words = splitter.split("snake_case", SplitContext::default());
        assert_eq!(texts(&words), vec!["snake", "case"]);
    }

    #[test]
    fn test_mixed_case_split_or_ignored() {
        assert_eq!(texts(&split("use getValue here")), vec!["use", "get", "Value", "here"]);

        let splitter = WordSplitter::new(WordSplitterOptions {
            ignore_mixed_case: true,
            ..WordSplitterOptions::default()
        });
        let words = splitter.split("use getValue here", SplitContext::default());
        assert_eq!(texts(&words), vec!["use", "here"]);
    }

    #[test]
    fn test_format_specifiers_and_interpolation() {
        assert_eq!(texts(&split("Found {0:N2} items in %s files")), vec!["Found", "items", "in", "files"]);

        let interpolated = SplitContext {
            interpolated: true,
            ..SplitContext::default()
        };
        let words = WordSplitter::default().split("Hello {userName}, bye", interpolated);
        assert_eq!(texts(&words), vec!["Hello", "bye"]);
    }

    #[test]
    fn test_paths_emails_urls_and_tags() {
        let words = split(
            "Mail bob@exmaple.com or open C:\\tmp\\fille.txt via https://exmaple.com/x <b>bold</b> config.json",
        );
        assert_eq!(texts(&words), vec!["Mail", "or", "open", "via", "bold"]);
    }
}
