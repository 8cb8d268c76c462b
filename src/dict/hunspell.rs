//! Reading hunspell `.aff`/`.dic` pairs.
//!
//! Affix rules, casing and suggestions are `spellbook`'s job. This module only
//! gets the files into the UTF-8 text it accepts and lists the stems of the
//! word list for exact-case lookups.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::DictionaryError;

/// The decoded text of one affix file and its word list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunspellPair {
    pub aff: String,
    pub dic: String,
}

impl HunspellPair {
    /// A pair with no affix rules whose word list is exactly `words`.
    /// Entries containing whitespace cannot be expressed in a `.dic` file and
    /// are left out.
    pub fn from_words<'w>(words: impl IntoIterator<Item = &'w str>) -> Self {
        let entries: Vec<String> = words
            .into_iter()
            .filter(|w| !w.is_empty() && !w.contains(char::is_whitespace))
            .map(|w| format!("{}\n", w.replace('/', "\\/")))
            .collect();
        Self {
            aff: "SET UTF-8\n".to_string(),
            dic: format!("{}\n{}", entries.len(), entries.concat()),
        }
    }

    pub fn read(aff_path: &Path, dic_path: &Path) -> Result<Self, DictionaryError> {
        let aff_bytes = fs::read(aff_path)?;
        let encoding = declared_encoding(&aff_bytes);
        let aff = decode(&aff_bytes, encoding.as_deref());
        let dic = decode(&fs::read(dic_path)?, encoding.as_deref());
        Ok(Self {
            aff: declare_utf8(&aff),
            dic,
        })
    }

    /// Stems of the word list, flags and morphology stripped.
    pub fn stems(&self) -> Vec<String> {
        entries(&self.dic)
            .map(|line| split_entry(line).0)
            .filter(|w| !w.is_empty())
            .collect()
    }

    pub fn compile(&self, language: &str) -> Result<spellbook::Dictionary, DictionaryError> {
        let corrupt = |message: String| DictionaryError::Corrupt {
            language: language.to_string(),
            message,
        };
        if self.dic.contains('\0') || self.aff.contains('\0') {
            return Err(corrupt("dictionary files are not text".to_string()));
        }
        let count = entries(&self.dic).count();
        if count == 0 {
            return Err(corrupt("word list is empty".to_string()));
        }

        // The word list may omit its leading entry count
        let dic = match self.dic.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(first) if first.parse::<usize>().is_ok() => self.dic.clone(),
            _ => format!("{count}\n{}", self.dic),
        };
        let dictionary =
            spellbook::Dictionary::new(&self.aff, &dic).map_err(|e| corrupt(e.to_string()))?;
        debug!(language, entries = count, "compiled hunspell dictionary");
        Ok(dictionary)
    }
}

/// Word list lines after the count line, without comments.
fn entries(dic: &str) -> impl Iterator<Item = &str> {
    let mut lines = dic.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    if lines.peek().is_some_and(|l| l.parse::<usize>().is_ok()) {
        lines.next();
    }
    lines.filter(|l| !l.starts_with('#'))
}

/// Split a `.dic` line into its word and flags. `\/` escapes a slash, and a
/// tab or space starts morphological fields.
fn split_entry(line: &str) -> (String, &str) {
    let entry = line
        .split(|c: char| c == '\t' || c == ' ')
        .next()
        .unwrap_or_default();
    let mut slash = None;
    let mut escaped = false;
    for (i, c) in entry.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            '/' if !escaped => {
                slash = Some(i);
                break;
            }
            _ => escaped = false,
        }
    }
    match slash {
        Some(i) => (entry[..i].replace("\\/", "/"), &entry[i + 1..]),
        None => (entry.replace("\\/", "/"), ""),
    }
}

fn declared_encoding(bytes: &[u8]) -> Option<String> {
    bytes.split(|b| *b == b'\n').find_map(|line| {
        let line = std::str::from_utf8(line).ok()?.trim();
        line.strip_prefix("SET")
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(|rest| rest.trim().to_ascii_uppercase())
    })
}

fn decode(bytes: &[u8], encoding: Option<&str>) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let latin1 = |b: &[u8]| b.iter().map(|&b| b as char).collect::<String>();
    match encoding {
        Some("UTF-8" | "UTF8") => String::from_utf8_lossy(bytes).into_owned(),
        Some("ISO8859-1" | "ISO-8859-1" | "LATIN1") => latin1(bytes),
        Some(other) => {
            warn!(encoding = other, "unsupported dictionary encoding, reading as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
        None => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => latin1(bytes),
        },
    }
}

/// The text has been decoded, so its `SET` line now has to say UTF-8.
fn declare_utf8(aff: &str) -> String {
    let mut out = String::with_capacity(aff.len());
    for line in aff.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("SET") && trimmed[3..].starts_with(char::is_whitespace) {
            out.push_str("SET UTF-8\n");
        } else {
            out.push_str(line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const AFF: &str = "SET UTF-8\n\
        PFX U Y 1\n\
        PFX U 0 un .\n\
        SFX S Y 2\n\
        SFX S y ies [^aeiou]y\n\
        SFX S 0 s [aeiou]y\n";

    fn pair(aff: &str, dic: &str) -> HunspellPair {
        HunspellPair {
            aff: aff.to_string(),
            dic: dic.to_string(),
        }
    }

    #[test]
    fn test_affixed_forms_are_accepted() {
        let dict = pair(AFF, "2\ncity/S\ntoy/SU\n").compile("en-US").unwrap();
        assert!(dict.check("cities"));
        assert!(dict.check("toys"));
        assert!(dict.check("untoys"));
        assert!(!dict.check("citys"));
        assert!(!dict.check("uncity"));
    }

    #[test]
    fn test_stems_strip_flags_and_morphology() {
        let stems = pair("", "3\nand\\/or\nfoo/X\tpo:noun\n# note\nbar\n").stems();
        assert_eq!(stems, vec!["and/or", "foo", "bar"]);
    }

    #[test]
    fn test_missing_count_line_is_tolerated() {
        let dict = pair("SET UTF-8\n", "colour\ncentre\n").compile("en-GB").unwrap();
        assert!(dict.check("centre"));
    }

    #[test]
    fn test_empty_or_binary_list_is_corrupt() {
        assert!(matches!(
            pair("SET UTF-8\n", "0\n").compile("en-US"),
            Err(DictionaryError::Corrupt { .. })
        ));
        assert!(matches!(
            pair("SET UTF-8\n", "\0\0").compile("en-US"),
            Err(DictionaryError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_from_words_skips_phrases() {
        let words = HunspellPair::from_words(["hello", "ice cream", "and/or"]);
        assert_eq!(words.dic, "2\nhello\nand\\/or\n");
        assert_eq!(words.stems(), vec!["hello", "and/or"]);
    }

    #[test]
    fn test_read_latin1_pair() {
        let dir = tempdir().unwrap();
        let aff = dir.path().join("de_DE.aff");
        let dic = dir.path().join("de_DE.dic");
        fs::write(&aff, b"SET ISO8859-1\n").unwrap();
        fs::write(&dic, b"1\nStra\xDFe\n").unwrap();

        let pair = HunspellPair::read(&aff, &dic).unwrap();
        assert_eq!(pair.aff, "SET UTF-8\n");
        assert_eq!(pair.stems(), vec!["Straße"]);
        assert!(pair.compile("de-DE").unwrap().check("Straße"));
    }
}
