use fst::automaton::Levenshtein;
use fst::{IntoStreamer, Set, Streamer};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use super::suggestions::{
    capitalize, edit_distance, is_all_uppercase, is_capitalized, transformations, Suggestion,
};
use crate::dict::hunspell::HunspellPair;
use crate::error::DictionaryError;

#[derive(Debug, Default)]
struct UserWords {
    exact: HashSet<String>,
    folded: HashSet<String>,
}

impl UserWords {
    fn insert(&mut self, word: &str) {
        self.exact.insert(word.to_string());
        self.folded.insert(word.to_lowercase());
    }

    fn remove(&mut self, word: &str) {
        self.exact.remove(word);
        let lower = word.to_lowercase();
        if !self.exact.iter().any(|w| w.to_lowercase() == lower) {
            self.folded.remove(&lower);
        }
    }
}

/// One language: a hunspell checker, the stems of its word list, and a
/// mutable user word list.
pub struct Dictionary {
    language: String,
    checker: spellbook::Dictionary,
    stems: Set<Vec<u8>>,
    user: RwLock<UserWords>,
    user_file: Option<PathBuf>,
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("language", &self.language)
            .field("stems", &self.stems.len())
            .field("user_file", &self.user_file)
            .finish_non_exhaustive()
    }
}

fn build_set(language: &str, mut words: Vec<String>) -> Result<Set<Vec<u8>>, DictionaryError> {
    words.sort();
    words.dedup();
    Set::from_iter(words).map_err(|e| DictionaryError::Corrupt {
        language: language.to_string(),
        message: e.to_string(),
    })
}

impl Dictionary {
    /// A dictionary without affix rules. Entries containing whitespace are
    /// only reachable through suggestions and exact lookups.
    pub fn from_words<I, S>(language: &str, words: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        let pair = HunspellPair::from_words(words.iter().map(String::as_str));
        let checker = spellbook::Dictionary::new(&pair.aff, &pair.dic).map_err(|e| {
            DictionaryError::Corrupt {
                language: language.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            language: language.to_string(),
            checker,
            stems: build_set(language, words)?,
            user: RwLock::default(),
            user_file: None,
        })
    }

    /// Load a hunspell `.aff`/`.dic` pair.
    pub fn load_hunspell(language: &str, aff: &Path, dic: &Path) -> Result<Self, DictionaryError> {
        let pair = HunspellPair::read(aff, dic)?;
        let checker = pair.compile(language)?;
        Ok(Self {
            language: language.to_string(),
            checker,
            stems: build_set(language, pair.stems())?,
            user: RwLock::default(),
            user_file: None,
        })
    }

    /// Attach the user word list at `path`, reading it if it exists. Later
    /// additions are appended to the same file.
    pub fn with_user_file(mut self, path: impl Into<PathBuf>) -> Result<Self, DictionaryError> {
        let path = path.into();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut user = self.write_user();
            for line in content.lines() {
                let word = line.trim();
                if !word.is_empty() && !word.starts_with('#') {
                    user.insert(word);
                }
            }
            debug!(language = %self.language, count = user.exact.len(), "loaded user words");
        }
        self.user_file = Some(path);
        Ok(self)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of stems in the base list.
    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn user_file(&self) -> Option<&Path> {
        self.user_file.as_deref()
    }

    pub fn user_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self.read_user().exact.iter().cloned().collect();
        words.sort();
        words
    }

    fn read_user(&self) -> RwLockReadGuard<'_, UserWords> {
        self.user.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_user(&self) -> RwLockWriteGuard<'_, UserWords> {
        self.user.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn base_contains(&self, word: &str) -> bool {
        self.stems.contains(word) || self.checker.check(word)
    }

    /// Case-sensitive lookups still accept a capitalised or all-caps form of
    /// a lowercase entry, and an all-caps form of a capitalised one.
    pub fn contains(&self, word: &str, case_sensitive: bool) -> bool {
        let user = self.read_user();
        if self.base_contains(word) || user.exact.contains(word) {
            return true;
        }

        let lower = word.to_lowercase();
        if !case_sensitive {
            return self.checker.check(&lower)
                || self.checker.check(&word.to_uppercase())
                || self.stems.contains(&lower)
                || user.folded.contains(&lower);
        }

        let known = |w: &str| user.exact.contains(w);
        if is_capitalized(word) && known(&lower) {
            return true;
        }
        word.chars().count() > 1
            && is_all_uppercase(word)
            && (known(&lower) || known(&capitalize(&lower)))
    }

    /// Entries spelled like `word` apart from case.
    pub fn case_variants(&self, word: &str) -> Vec<String> {
        let user = self.read_user();
        let lower = word.to_lowercase();
        let listed = |w: &str| self.stems.contains(w) || user.exact.contains(w);
        let mut variants = Vec::new();
        for variant in [capitalize(&lower), lower.clone(), word.to_uppercase()] {
            // An all-caps or capitalised word is accepted for a lowercase
            // entry, so only the lowercase form may come from the checker.
            let known = listed(&variant) || (variant == lower && self.checker.check(&lower));
            if known && variant != word && !variants.contains(&variant) {
                variants.push(variant);
            }
        }
        variants
    }

    /// Up to `max` candidates ordered by edit distance.
    pub fn suggest(&self, word: &str, max: usize) -> Vec<Suggestion> {
        let lower = word.to_lowercase();
        let mut found: BTreeSet<String> = BTreeSet::new();

        let mut hunspell = Vec::new();
        self.checker.suggest(word, &mut hunspell);
        found.extend(
            hunspell
                .into_iter()
                .filter(|candidate| edit_distance(&lower, &candidate.to_lowercase()) <= 3),
        );

        let mut queries = vec![word];
        if lower != word {
            queries.push(&lower);
        }

        for distance in 1..=2 {
            for query in &queries {
                match Levenshtein::new(query, distance) {
                    Ok(automaton) => {
                        let mut stream = self.stems.search(&automaton).into_stream();
                        while let Some(key) = stream.next() {
                            if let Ok(candidate) = std::str::from_utf8(key) {
                                found.insert(candidate.to_string());
                            }
                        }
                    }
                    Err(e) => trace!(query, "levenshtein automaton unavailable: {e}"),
                }
            }
            if found.len() >= max {
                break;
            }
        }

        for candidate in self.read_user().exact.iter() {
            if edit_distance(&lower, &candidate.to_lowercase()) <= 2 {
                found.insert(candidate.clone());
            }
        }

        if found.is_empty() {
            for candidate in transformations(&lower) {
                if self.contains(&candidate, false) {
                    found.insert(candidate);
                }
            }
        }

        let mut suggestions: Vec<Suggestion> = found
            .into_iter()
            .map(|candidate| Suggestion {
                distance: edit_distance(&lower, &candidate.to_lowercase()),
                word: candidate,
            })
            .collect();
        suggestions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.word.cmp(&b.word)));
        suggestions.truncate(max);
        suggestions
    }

    /// Add `word` to the user list. The backing file is written first; memory
    /// is only touched when that succeeds. Returns false if already present.
    pub fn add_word(&self, word: &str) -> Result<bool, DictionaryError> {
        let mut user = self.write_user();
        if user.exact.contains(word) {
            return Ok(false);
        }
        if let Some(path) = &self.user_file {
            append_line(path, word)?;
        }
        user.insert(word);
        Ok(true)
    }

    pub fn remove_word(&self, word: &str) -> Result<bool, DictionaryError> {
        let mut user = self.write_user();
        if !user.exact.contains(word) {
            return Ok(false);
        }
        if let Some(path) = &self.user_file {
            let mut remaining: Vec<&str> = user
                .exact
                .iter()
                .map(String::as_str)
                .filter(|w| *w != word)
                .collect();
            remaining.sort_unstable();
            let mut content = remaining.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            fs::write(path, content).map_err(|source| DictionaryError::Write {
                path: path.clone(),
                source,
            })?;
        }
        user.remove(word);
        Ok(true)
    }
}

/// Append one line, creating the file and its directory when missing.
pub(crate) fn append_line(path: &Path, line: &str) -> Result<(), DictionaryError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")
    };
    write().map_err(|source| DictionaryError::Write {
        path: path.to_path_buf(),
        source,
    })
}
