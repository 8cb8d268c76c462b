pub mod dictionary;
pub mod doubled;
pub mod service;
pub mod suggestions;
pub mod tokenizer;

use crate::classifier::registry::{ClassifierRegistry, FileClassification};
use crate::classifier::{Classification, ClassifiedSpan};
use crate::cli::output::{print_event, prompt_correction, Correction};
use crate::error::Cancelled;
use crate::{CheckResult, Config, IssueKind, SpellError};
use anyhow::{Context, Result};
use doubled::{DoubledWordDetector, LocatedWord};
use rayon::prelude::*;
use service::{DictionaryService, SuggestionContext, WordLocation};
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokenizer::{split_identifier, SplitContext, Word, WordSplitter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span};

/// Classifies files, splits spans into words and checks them against the
/// dictionary service.
pub struct SpellChecker {
    registry: ClassifierRegistry,
    splitter: WordSplitter,
    service: DictionaryService,
    case_sensitive: bool,
    detect_doubled_words: bool,
    cancel: CancellationToken,
}

impl SpellChecker {
    pub fn new(config: &Config) -> Result<Self> {
        let registry = config
            .build_registry()
            .context("Invalid classifier configuration")?;
        let dictionaries = crate::dict::manager::load_dictionaries(config)?;
        let service = DictionaryService::new(dictionaries, config.service_settings())?;
        Ok(Self::with_parts(registry, service, config))
    }

    pub fn with_parts(registry: ClassifierRegistry, service: DictionaryService, config: &Config) -> Self {
        Self {
            registry,
            splitter: WordSplitter::new(config.words.clone()),
            service,
            case_sensitive: config.case_sensitive,
            detect_doubled_words: config.detect_doubled_words,
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &ClassifierRegistry {
        &self.registry
    }

    pub fn service(&self) -> &DictionaryService {
        &self.service
    }

    /// Cancelling the token stops running checks between files and spans.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Every finding in `content`, in file order.
    pub fn check_content(&self, path: &Path, content: &str) -> Result<Vec<SpellError>, Cancelled> {
        let _span = info_span!("check", path = %path.display()).entered();
        let file = match self.registry.classify_path(path, content) {
            FileClassification::Excluded => {
                debug!("extension excluded");
                return Ok(Vec::new());
            }
            FileClassification::Classified(file) => file,
        };

        let mut detector = DoubledWordDetector::new();
        let mut errors = Vec::new();

        for span in &file.spans {
            if self.cancel.is_cancelled() {
                debug!("check cancelled");
                return Err(Cancelled);
            }
            if !span.classification.is_spell_checkable() {
                detector.reset();
                continue;
            }

            let (words, context) = if span.classification == Classification::Identifier {
                (split_identifier(span.text), SuggestionContext::Identifier)
            } else {
                let split = SplitContext {
                    escapes: span.classification != Classification::VerbatimStringLiteral,
                    interpolated: span.classification == Classification::InterpolatedStringLiteral,
                    mnemonic: file.mnemonic,
                };
                (self.splitter.split(span.text, split), SuggestionContext::Text)
            };

            for (index, word) in words.iter().enumerate() {
                let offset = span.start + word.start;
                let located = LocatedWord {
                    offset,
                    length: word.length,
                    text: &word.text,
                };
                if self.detect_doubled_words && detector.observe(content, located, index > 0) {
                    errors.push(issue(content, span, word, IssueKind::DoubledWord, Vec::new()));
                }

                let location = WordLocation::new(path, offset);
                if self.service.is_correct_at(&word.text, &location, self.case_sensitive) {
                    continue;
                }
                let variants = self.service.case_variants(&word.text);
                let suggestions = if variants.is_empty() {
                    self.service.suggest_for(&word.text, context)
                } else if self.case_sensitive {
                    variants
                } else {
                    continue;
                };
                errors.push(issue(content, span, word, IssueKind::Misspelling, suggestions));
            }
        }

        Ok(errors)
    }

    pub fn check(&self, file_path: &Path) -> Result<CheckResult> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
        let errors = self.check_content(file_path, &content)?;
        Ok(CheckResult {
            error_count: errors.len(),
            fixed_count: 0,
            errors,
        })
    }

    /// Check files in parallel; results keep the order of `files`.
    pub fn check_files(&self, files: &[PathBuf]) -> Vec<(PathBuf, Result<CheckResult>)> {
        files
            .par_iter()
            .map(|path| {
                let result = if self.cancel.is_cancelled() {
                    Err(Cancelled.into())
                } else {
                    self.check(path)
                };
                (path.clone(), result)
            })
            .collect()
    }

    /// Apply the top suggestion to every misspelling and drop the second word
    /// of every doubled pair, then check the edited file again. Whatever is
    /// left is reported.
    pub fn fix_auto(&self, file_path: &Path) -> Result<CheckResult> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
        let errors = self.check_content(file_path, &content)?;

        let edits: Vec<Edit> = errors
            .iter()
            .filter_map(|error| match error.kind {
                // A word with a mnemonic inside is not spelled literally in the file.
                IssueKind::Misspelling if !is_literal(&content, error) => None,
                IssueKind::Misspelling => error
                    .suggestions
                    .first()
                    .map(|s| Edit::replace(error, s)),
                IssueKind::DoubledWord => removal(&content, error),
            })
            .collect();

        self.write_and_recheck(file_path, &content, edits)
    }

    pub fn fix_interactive(&self, file_path: &Path, colored: bool) -> Result<CheckResult> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
        let errors = self.check_content(file_path, &content)?;
        let mut events = self.service.subscribe();

        let mut edits = Vec::new();
        let mut replace_all: HashMap<String, String> = HashMap::new();

        for error in &errors {
            let replaced = replace_all.get(&error.word).filter(|_| error.kind == IssueKind::Misspelling);
            if let Some(replacement) = replaced {
                if is_literal(&content, error) {
                    edits.push(Edit::replace(error, replacement));
                }
                continue;
            }
            // An earlier answer may already cover this word.
            let location = WordLocation::new(file_path, error.offset);
            if error.kind == IssueKind::Misspelling
                && self.service.is_correct_at(&error.word, &location, self.case_sensitive)
            {
                continue;
            }

            match prompt_correction(error, colored)? {
                Correction::Skip => {}
                Correction::Replace(replacement) if is_literal(&content, error) => {
                    edits.push(Edit::replace(error, &replacement))
                }
                Correction::Replace(_) => {}
                Correction::ReplaceAll(replacement) => {
                    self.service.replace_all(&error.word, &replacement)?;
                    if is_literal(&content, error) {
                        edits.push(Edit::replace(error, &replacement));
                    }
                    replace_all.insert(error.word.clone(), replacement);
                }
                Correction::RemoveDuplicate => edits.extend(removal(&content, error)),
                Correction::IgnoreOnce => {
                    self.service.ignore_once(&error.word, location)?;
                }
                Correction::IgnoreAll => {
                    self.service.ignore_word(&error.word)?;
                }
                Correction::AddToDictionary => {
                    self.service.add_word(None, &error.word)?;
                }
                Correction::Quit => break,
            }

            while let Ok(event) = events.try_recv() {
                print_event(&event, colored);
            }
        }

        self.write_and_recheck(file_path, &content, edits)
    }

    fn write_and_recheck(&self, file_path: &Path, content: &str, edits: Vec<Edit>) -> Result<CheckResult> {
        let (new_content, fixed_count) = apply_edits(content, edits);
        if fixed_count > 0 {
            fs::write(file_path, &new_content)
                .with_context(|| format!("Failed to write file: {}", file_path.display()))?;
        }
        let remaining = self.check_content(file_path, &new_content)?;
        Ok(CheckResult {
            error_count: remaining.len(),
            fixed_count,
            errors: remaining,
        })
    }
}

fn issue(
    content: &str,
    span: &ClassifiedSpan<'_>,
    word: &Word,
    kind: IssueKind,
    suggestions: Vec<String>,
) -> SpellError {
    let offset = span.start + word.start;
    let line_start = content[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = content[offset..]
        .find('\n')
        .map_or(content.len(), |i| offset + i);
    SpellError {
        word: word.text.clone(),
        kind,
        classification: span.classification,
        offset,
        length: word.length,
        line: content[..offset].matches('\n').count() + 1,
        column: content[line_start..offset].chars().count() + 1,
        context: content[line_start..line_end].trim_end_matches('\r').to_string(),
        suggestions,
    }
}

/// A byte range to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    range: Range<usize>,
    replacement: String,
}

impl Edit {
    fn replace(error: &SpellError, replacement: &str) -> Self {
        Self {
            range: error.offset..error.offset + error.length,
            replacement: replacement.to_string(),
        }
    }
}

fn is_literal(content: &str, error: &SpellError) -> bool {
    content.get(error.offset..error.offset + error.length) == Some(error.word.as_str())
}

/// Delete a doubled word together with the whitespace before it. Pairs
/// split by anything other than whitespace, such as comment markers, are
/// left alone.
fn removal(content: &str, error: &SpellError) -> Option<Edit> {
    let end = error.offset + error.length;
    let start = content[..error.offset].trim_end().len();
    if start == error.offset || start == 0 {
        return None;
    }
    Some(Edit {
        range: start..end,
        replacement: String::new(),
    })
}

/// Apply edits from the end of the buffer backwards so earlier offsets stay
/// valid. An edit overlapping one already applied is dropped.
fn apply_edits(content: &str, mut edits: Vec<Edit>) -> (String, usize) {
    edits.sort_by_key(|e| std::cmp::Reverse(e.range.start));
    let mut result = content.to_string();
    let mut applied = 0;
    let mut floor = usize::MAX;
    for edit in edits {
        if edit.range.end > floor || edit.range.end > result.len() {
            continue;
        }
        result.replace_range(edit.range.clone(), &edit.replacement);
        floor = edit.range.start;
        applied += 1;
    }
    (result, applied)
}
