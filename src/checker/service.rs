//! The aggregate dictionary service.
//!
//! Lookups read the shared state directly from any thread. Mutations are
//! commands on a bounded queue consumed by a single owner thread, which
//! applies them one at a time, replies over a oneshot channel and then
//! broadcasts a [`DictionaryEvent`] so interactive callers can re-render.

use dashmap::DashSet;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use super::dictionary::{append_line, Dictionary};
use super::suggestions::{camel_join, match_case};
use crate::error::DictionaryError;

const COMMAND_QUEUE_DEPTH: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Where a word instance sits: the file and the byte offset in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordLocation {
    pub source: PathBuf,
    pub offset: usize,
}

impl WordLocation {
    pub fn new(source: impl Into<PathBuf>, offset: usize) -> Self {
        Self {
            source: source.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryEvent {
    WordAdded { language: String, word: String },
    WordRemoved { language: String, word: String },
    WordIgnored { word: String },
    IgnoredOnce { word: String, location: WordLocation },
    ReplaceAll { word: String, replacement: String },
}

/// What the misspelled word is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuggestionContext {
    #[default]
    Text,
    /// A part of a split identifier; multi-word suggestions are camel-joined.
    Identifier,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub ignored_words: Vec<String>,
    pub ignored_words_file: Option<PathBuf>,
    pub exclusion_expressions: Vec<String>,
    pub max_suggestions: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            ignored_words: Vec::new(),
            ignored_words_file: None,
            exclusion_expressions: Vec::new(),
            max_suggestions: 5,
        }
    }
}

struct Shared {
    dictionaries: Vec<Dictionary>,
    ignored: DashSet<String>,
    ignored_once: DashSet<(String, WordLocation)>,
    exclusions: Vec<Regex>,
    ignored_words_file: Option<PathBuf>,
    max_suggestions: usize,
}

impl Shared {
    fn dictionary(&self, language: Option<&str>) -> Result<&Dictionary, DictionaryError> {
        match language {
            None => self
                .dictionaries
                .first()
                .ok_or_else(|| DictionaryError::NoDictionaries(Vec::new())),
            Some(language) => self
                .dictionaries
                .iter()
                .find(|d| d.language().eq_ignore_ascii_case(language))
                .ok_or_else(|| DictionaryError::UnknownLanguage(language.to_string())),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, DictionaryError>>;

enum Command {
    AddWord {
        language: Option<String>,
        word: String,
        reply: Reply<bool>,
    },
    RemoveWord {
        language: Option<String>,
        word: String,
        reply: Reply<bool>,
    },
    IgnoreWord {
        word: String,
        reply: Reply<bool>,
    },
    IgnoreOnce {
        word: String,
        location: WordLocation,
        reply: Reply<bool>,
    },
    ReplaceAll {
        word: String,
        replacement: String,
        reply: Reply<()>,
    },
}

/// Cloneable handle; the owner thread stops once every handle is dropped.
#[derive(Clone)]
pub struct DictionaryService {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<DictionaryEvent>,
}

impl DictionaryService {
    /// Dictionaries are deduplicated by language, keeping the first. An empty
    /// set is an error: nothing could be spell checked.
    pub fn new(dictionaries: Vec<Dictionary>, settings: ServiceSettings) -> Result<Self, DictionaryError> {
        let mut seen = HashSet::new();
        let dictionaries: Vec<Dictionary> = dictionaries
            .into_iter()
            .filter(|d| {
                let first = seen.insert(d.language().to_ascii_lowercase());
                if !first {
                    warn!(language = d.language(), "skipping duplicate dictionary");
                }
                first
            })
            .collect();
        if dictionaries.is_empty() {
            return Err(DictionaryError::NoDictionaries(Vec::new()));
        }

        let ignored = DashSet::new();
        for word in &settings.ignored_words {
            ignored.insert(word.to_lowercase());
        }
        if let Some(path) = settings.ignored_words_file.as_ref().filter(|p| p.exists()) {
            let content = std::fs::read_to_string(path)?;
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .for_each(|word| {
                    ignored.insert(word.to_lowercase());
                });
        }

        let exclusions = settings
            .exclusion_expressions
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(%pattern, "invalid exclusion expression: {e}");
                    None
                }
            })
            .collect();

        let shared = Arc::new(Shared {
            dictionaries,
            ignored,
            ignored_once: DashSet::new(),
            exclusions,
            ignored_words_file: settings.ignored_words_file,
            max_suggestions: settings.max_suggestions,
        });

        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let owner = Owner {
            shared: Arc::clone(&shared),
            events: events.clone(),
        };
        thread::Builder::new()
            .name("dictionary-service".to_string())
            .spawn(move || owner.run(receiver))?;

        Ok(Self {
            shared,
            commands,
            events,
        })
    }

    pub fn languages(&self) -> Vec<&str> {
        self.shared.dictionaries.iter().map(Dictionary::language).collect()
    }

    pub fn dictionaries(&self) -> &[Dictionary] {
        &self.shared.dictionaries
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DictionaryEvent> {
        self.events.subscribe()
    }

    /// Accepted by any dictionary, ignored for the session or matched by an
    /// exclusion expression.
    pub fn is_correct(&self, word: &str, case_sensitive: bool) -> bool {
        self.shared
            .dictionaries
            .iter()
            .any(|d| d.contains(word, case_sensitive))
            || self.shared.ignored.contains(&word.to_lowercase())
            || self.shared.exclusions.iter().any(|re| re.is_match(word))
    }

    /// [`Self::is_correct`], or this exact instance was ignored once.
    pub fn is_correct_at(&self, word: &str, location: &WordLocation, case_sensitive: bool) -> bool {
        self.is_correct(word, case_sensitive)
            || self
                .shared
                .ignored_once
                .contains(&(word.to_lowercase(), location.clone()))
    }

    /// Dictionary entries that differ from `word` only by case. A word with
    /// any is not really misspelled unless case matters to the caller.
    pub fn case_variants(&self, word: &str) -> Vec<String> {
        let mut variants: Vec<String> = Vec::new();
        for variant in self.shared.dictionaries.iter().flat_map(|d| d.case_variants(word)) {
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }
        variants
    }

    pub fn suggest(&self, word: &str) -> Vec<String> {
        self.suggest_for(word, SuggestionContext::Text)
    }

    /// Merged suggestions from every dictionary, closest first and in
    /// dictionary order on ties. A candidate that only differs from `word`
    /// by case is dropped.
    pub fn suggest_for(&self, word: &str, context: SuggestionContext) -> Vec<String> {
        let max = self.shared.max_suggestions;
        let mut ranked: Vec<(usize, usize, String)> = self
            .shared
            .dictionaries
            .iter()
            .enumerate()
            .flat_map(|(rank, d)| {
                d.suggest(word, max)
                    .into_iter()
                    .map(move |s| (s.distance, rank, s.word))
            })
            .collect();
        ranked.sort_by_key(|(distance, rank, _)| (*distance, *rank));

        let lower = word.to_lowercase();
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for (_, _, candidate) in ranked {
            if candidate.to_lowercase() == lower {
                continue;
            }
            let shaped = match context {
                SuggestionContext::Text => candidate,
                SuggestionContext::Identifier => camel_join(&candidate),
            };
            let shaped = match_case(word, &shaped);
            if seen.insert(shaped.clone()) {
                suggestions.push(shaped);
            }
        }
        suggestions.truncate(max);
        suggestions
    }

    /// Add to the user list of `language`, or of the first dictionary.
    pub fn add_word(&self, language: Option<&str>, word: &str) -> Result<bool, DictionaryError> {
        self.request(|reply| Command::AddWord {
            language: language.map(str::to_string),
            word: word.to_string(),
            reply,
        })
    }

    pub fn remove_word(&self, language: Option<&str>, word: &str) -> Result<bool, DictionaryError> {
        self.request(|reply| Command::RemoveWord {
            language: language.map(str::to_string),
            word: word.to_string(),
            reply,
        })
    }

    /// Ignore `word` everywhere, persisting it to the ignored-words file if
    /// one is configured.
    pub fn ignore_word(&self, word: &str) -> Result<bool, DictionaryError> {
        self.request(|reply| Command::IgnoreWord {
            word: word.to_string(),
            reply,
        })
    }

    pub fn ignore_once(&self, word: &str, location: WordLocation) -> Result<bool, DictionaryError> {
        self.request(|reply| Command::IgnoreOnce {
            word: word.to_string(),
            location,
            reply,
        })
    }

    /// Announce a replace-all; the caller edits the files.
    pub fn replace_all(&self, word: &str, replacement: &str) -> Result<(), DictionaryError> {
        self.request(|reply| Command::ReplaceAll {
            word: word.to_string(),
            replacement: replacement.to_string(),
            reply,
        })
    }

    fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, DictionaryError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .blocking_send(command(reply))
            .map_err(|_| DictionaryError::ServiceStopped)?;
        response
            .blocking_recv()
            .map_err(|_| DictionaryError::ServiceStopped)?
    }
}

struct Owner {
    shared: Arc<Shared>,
    events: broadcast::Sender<DictionaryEvent>,
}

impl Owner {
    fn run(self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.blocking_recv() {
            self.apply(command);
        }
        debug!("dictionary service stopped");
    }

    fn notify(&self, event: DictionaryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn apply(&self, command: Command) {
        match command {
            Command::AddWord { language, word, reply } => {
                let result = self.shared.dictionary(language.as_deref()).and_then(|d| {
                    let added = d.add_word(&word)?;
                    if added {
                        self.notify(DictionaryEvent::WordAdded {
                            language: d.language().to_string(),
                            word: word.clone(),
                        });
                    }
                    Ok(added)
                });
                let _ = reply.send(result);
            }
            Command::RemoveWord { language, word, reply } => {
                let result = self.shared.dictionary(language.as_deref()).and_then(|d| {
                    let removed = d.remove_word(&word)?;
                    if removed {
                        self.notify(DictionaryEvent::WordRemoved {
                            language: d.language().to_string(),
                            word: word.clone(),
                        });
                    }
                    Ok(removed)
                });
                let _ = reply.send(result);
            }
            Command::IgnoreWord { word, reply } => {
                let _ = reply.send(self.ignore(word));
            }
            Command::IgnoreOnce { word, location, reply } => {
                let added = self
                    .shared
                    .ignored_once
                    .insert((word.to_lowercase(), location.clone()));
                if added {
                    self.notify(DictionaryEvent::IgnoredOnce { word, location });
                }
                let _ = reply.send(Ok(added));
            }
            Command::ReplaceAll { word, replacement, reply } => {
                self.notify(DictionaryEvent::ReplaceAll { word, replacement });
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn ignore(&self, word: String) -> Result<bool, DictionaryError> {
        let lower = word.to_lowercase();
        if self.shared.ignored.contains(&lower) {
            return Ok(false);
        }
        if let Some(path) = &self.shared.ignored_words_file {
            append_line(path, &word)?;
        }
        self.shared.ignored.insert(lower);
        self.notify(DictionaryEvent::WordIgnored { word });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn service(settings: ServiceSettings) -> DictionaryService {
        let us = Dictionary::from_words("en-US", ["color", "center", "the", "ice", "cream"]).unwrap();
        let gb = Dictionary::from_words("en-GB", ["colour", "centre", "the"]).unwrap();
        DictionaryService::new(vec![us, gb], settings).unwrap()
    }

    #[test]
    fn test_aggregate_lookup_and_suggestions() {
        let service = service(ServiceSettings::default());
        assert!(service.is_correct("color", false));
        assert!(service.is_correct("colour", false));
        assert!(!service.is_correct("colur", false));
        assert_eq!(service.suggest("colur"), vec!["color", "colour"]);
    }

    #[test]
    fn test_case_only_candidates_are_dropped() {
        let dict = Dictionary::from_words("en-US", ["Paris", "parse"]).unwrap();
        let service = DictionaryService::new(vec![dict], ServiceSettings::default()).unwrap();
        assert!(!service.is_correct("paris", true));
        assert!(service.is_correct("paris", false));
        assert!(!service.suggest("paris").iter().any(|s| s.eq_ignore_ascii_case("paris")));
        assert_eq!(service.case_variants("paris"), vec!["Paris"]);
    }

    #[test]
    fn test_identifier_context_camel_joins() {
        let dict = Dictionary::from_words("en-US", ["ice cream"]).unwrap();
        let service = DictionaryService::new(vec![dict], ServiceSettings::default()).unwrap();
        assert_eq!(service.suggest_for("icecream", SuggestionContext::Identifier), vec!["iceCream"]);
        assert_eq!(service.suggest_for("Icecream", SuggestionContext::Identifier), vec!["IceCream"]);
        assert_eq!(service.suggest("icecream"), vec!["ice cream"]);
    }

    #[test]
    fn test_duplicate_languages_keep_first() {
        let first = Dictionary::from_words("en-US", ["alpha"]).unwrap();
        let second = Dictionary::from_words("en-us", ["beta"]).unwrap();
        let service = DictionaryService::new(vec![first, second], ServiceSettings::default()).unwrap();
        assert_eq!(service.languages(), vec!["en-US"]);
        assert!(!service.is_correct("beta", false));
    }

    #[test]
    fn test_no_dictionaries_is_distinct_error() {
        assert!(matches!(
            DictionaryService::new(Vec::new(), ServiceSettings::default()),
            Err(DictionaryError::NoDictionaries(_))
        ));
    }

    #[test]
    fn test_ignore_once_is_scoped_to_location() {
        let service = service(ServiceSettings::default());
        let here = WordLocation::new("a.txt", 10);
        let there = WordLocation::new("a.txt", 42);
        assert!(service.ignore_once("teh", here.clone()).unwrap());
        assert!(service.is_correct_at("teh", &here, false));
        assert!(!service.is_correct_at("teh", &there, false));
        assert!(!service.is_correct("teh", false));
    }

    #[test]
    fn test_mutations_raise_events() {
        let dir = tempdir().unwrap();
        let ignored_file = dir.path().join("ignored.txt");
        let service = service(ServiceSettings {
            ignored_words_file: Some(ignored_file.clone()),
            ..ServiceSettings::default()
        });
        let mut events = service.subscribe();

        assert!(service.add_word(Some("en-GB"), "favour").unwrap());
        assert!(service.is_correct("favour", true));
        assert_eq!(
            events.try_recv().unwrap(),
            DictionaryEvent::WordAdded {
                language: "en-GB".to_string(),
                word: "favour".to_string()
            }
        );

        assert!(service.ignore_word("Kubernetes").unwrap());
        assert!(service.is_correct("kubernetes", true));
        assert_eq!(std::fs::read_to_string(&ignored_file).unwrap(), "Kubernetes\n");
        assert!(matches!(events.try_recv().unwrap(), DictionaryEvent::WordIgnored { .. }));

        service.replace_all("teh", "the").unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            DictionaryEvent::ReplaceAll {
                word: "teh".to_string(),
                replacement: "the".to_string()
            }
        );

        assert!(matches!(
            service.add_word(Some("fr-FR"), "bonjour"),
            Err(DictionaryError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn test_exclusions_and_ignored_words() {
        let dir = tempdir().unwrap();
        let ignored_file = dir.path().join("ignored.txt");
        std::fs::write(&ignored_file, "# project words\nspellscan\n").unwrap();
        let service = service(ServiceSettings {
            ignored_words: vec!["rayon".to_string()],
            ignored_words_file: Some(ignored_file),
            exclusion_expressions: vec![r"^[a-f0-9]{7,}$".to_string(), "(".to_string()],
            ..ServiceSettings::default()
        });
        assert!(service.is_correct("SpellScan", false));
        assert!(service.is_correct("Rayon", false));
        assert!(service.is_correct("deadbeef", false));
        assert!(!service.is_correct("deadbeefx", false));
    }
}
