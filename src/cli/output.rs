use crate::checker::service::DictionaryEvent;
use crate::classifier::registry::FileClassification;
use crate::classifier::span::segments;
use crate::{CheckResult, IssueKind, SpellError};
use anyhow::Result;
use colored::*;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonError<'a> {
    file: String,
    line: usize,
    column: usize,
    offset: usize,
    length: usize,
    word: &'a str,
    kind: IssueKind,
    classification: &'static str,
    suggestions: &'a [String],
    context: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    files_checked: usize,
    total_errors: usize,
    errors: Vec<JsonError<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonSpan<'a> {
    start: usize,
    length: usize,
    classification: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonClassification<'a> {
    file: String,
    classifier: Option<&'a str>,
    spans: Vec<JsonSpan<'a>>,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("failed to serialize output: {e}"),
    }
}

pub fn print_errors(file_path: &Path, result: &CheckResult, colored_output: bool) {
    print_text_errors(file_path, result, colored_output);
}

fn print_text_errors(file_path: &Path, result: &CheckResult, colored_output: bool) {
    if result.errors.is_empty() {
        return;
    }

    let file_name = file_path.display().to_string();

    if colored_output {
        println!("\n{}", file_name.bold().underline());
    } else {
        println!("\n{}", file_name);
    }

    for error in &result.errors {
        let line_info = format!("{}:{}", error.line, error.column);
        let label = match error.kind {
            IssueKind::Misspelling => "",
            IssueKind::DoubledWord => " (doubled)",
        };

        if colored_output {
            println!(
                "  {} {}{} {}",
                line_info.blue().bold(),
                error.word.red().bold(),
                label.yellow(),
                format_context(&error.context, &error.word, colored_output)
            );

            if !error.suggestions.is_empty() {
                let suggestions = error
                    .suggestions
                    .iter()
                    .map(|s| s.green().to_string())
                    .collect::<Vec<_>>()
                    .join(&", ".dimmed().to_string());
                println!("    {} {}", "→".dimmed(), suggestions);
            }
        } else {
            println!("  {} {}{} {}", line_info, error.word, label, &error.context);

            if !error.suggestions.is_empty() {
                println!("    → {}", error.suggestions.join(", "));
            }
        }
    }
}

/// One JSON document covering every checked file.
pub fn print_json_report(results: &[(&Path, &CheckResult)]) {
    let errors: Vec<JsonError> = results
        .iter()
        .flat_map(|(file_path, result)| {
            result.errors.iter().map(move |e| JsonError {
                file: file_path.display().to_string(),
                line: e.line,
                column: e.column,
                offset: e.offset,
                length: e.length,
                word: &e.word,
                kind: e.kind,
                classification: e.classification.name(),
                suggestions: &e.suggestions,
                context: &e.context,
            })
        })
        .collect();

    print_json(&JsonOutput {
        files_checked: results.len(),
        total_errors: errors.len(),
        errors,
    });
}

/// The span list of one file, for the `classify` command.
pub fn print_classification(
    file_path: &Path,
    content: &str,
    classification: &FileClassification<'_>,
    colored_output: bool,
    format: &OutputFormat,
) {
    let spans = classification.spans();
    if *format == OutputFormat::Json {
        print_json(&JsonClassification {
            file: file_path.display().to_string(),
            classifier: classification.classifier_id(),
            spans: spans
                .iter()
                .map(|s| JsonSpan {
                    start: s.start,
                    length: s.len(),
                    classification: s.classification.name(),
                    text: s.text,
                })
                .collect(),
        });
        return;
    }

    let header = match classification.classifier_id() {
        Some(id) => format!("{} [{}]", file_path.display(), id),
        None => format!("{} [excluded]", file_path.display()),
    };
    if colored_output {
        println!("{}", header.bold().underline());
    } else {
        println!("{}", header);
    }

    for span in spans {
        let range = format!("{}..{}", span.start, span.end());
        let text = format!("{:?}", span.text);
        if colored_output {
            println!(
                "  {:>12} {:<26} {}",
                range.blue(),
                span.classification.name().cyan(),
                text.dimmed()
            );
        } else {
            println!("  {:>12} {:<26} {}", range, span.classification.name(), text);
        }
    }

    let covered: usize = segments(content, spans)
        .iter()
        .filter(|(class, _)| class.is_some())
        .map(|(_, text)| text.len())
        .sum();
    println!("  {} spans, {} of {} bytes classified", spans.len(), covered, content.len());
}

fn format_context(context: &str, word: &str, colored: bool) -> String {
    if colored {
        context.replace(word, &word.red().bold().to_string())
    } else {
        context.to_string()
    }
}

pub fn print_check_summary(total_errors: usize, files: usize, colored: bool) {
    let file_word = if files == 1 { "file" } else { "files" };
    println!();
    if total_errors == 0 {
        if colored {
            println!("{}", "✓ No spelling errors found!".green().bold());
        } else {
            println!("✓ No spelling errors found!");
        }
    } else {
        let error_word = if total_errors == 1 { "error" } else { "errors" };
        if colored {
            println!(
                "{} {} {} found in {} {}",
                "✗".red().bold(),
                total_errors.to_string().red().bold(),
                error_word,
                files,
                file_word
            );
        } else {
            println!("✗ {} {} found in {} {}", total_errors, error_word, files, file_word);
        }
    }
}

pub fn print_fix_summary(total_fixed: usize, remaining: usize, files: usize, colored: bool) {
    let file_word = if files == 1 { "file" } else { "files" };
    println!();
    if total_fixed == 0 {
        if colored {
            println!("{}", "No corrections applied.".green().bold());
        } else {
            println!("No corrections applied.");
        }
    } else {
        let fix_word = if total_fixed == 1 { "correction" } else { "corrections" };
        if colored {
            println!(
                "{} {} {} applied to {} {}",
                "✓".green().bold(),
                total_fixed.to_string().green().bold(),
                fix_word,
                files,
                file_word
            );
        } else {
            println!("✓ {} {} applied to {} {}", total_fixed, fix_word, files, file_word);
        }
    }
    if remaining > 0 {
        println!("{} issues remain", remaining);
    }
}

/// What the user chose for one finding in interactive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    Skip,
    Replace(String),
    ReplaceAll(String),
    RemoveDuplicate,
    IgnoreOnce,
    IgnoreAll,
    AddToDictionary,
    Quit,
}

pub fn prompt_correction(error: &SpellError, colored: bool) -> Result<Correction> {
    let title = match error.kind {
        IssueKind::Misspelling => "Misspelling found:",
        IssueKind::DoubledWord => "Doubled word found:",
    };
    if colored {
        println!(
            "\n{} {}:{}",
            title.yellow().bold(),
            error.line.to_string().blue(),
            error.column.to_string().blue()
        );
    } else {
        println!("\n{} {}:{}", title, error.line, error.column);
    }
    println!("  {}", format_context(&error.context, &error.word, colored));

    let mut items = vec!["Skip".to_string()];
    let mut choices = vec![Correction::Skip];

    match error.kind {
        IssueKind::DoubledWord => {
            items.push(format!("Remove the second '{}'", error.word));
            choices.push(Correction::RemoveDuplicate);
        }
        IssueKind::Misspelling => {
            for suggestion in error.suggestions.iter().take(9) {
                items.push(format!("Replace with '{}'", suggestion));
                choices.push(Correction::Replace(suggestion.clone()));
            }
            if let Some(top) = error.suggestions.first() {
                items.push(format!("Replace all with '{}'", top));
                choices.push(Correction::ReplaceAll(top.clone()));
            }
            items.push("Edit...".to_string());
            choices.push(Correction::Replace(String::new()));
            items.push("Ignore once".to_string());
            choices.push(Correction::IgnoreOnce);
            items.push("Ignore all".to_string());
            choices.push(Correction::IgnoreAll);
            items.push("Add to dictionary".to_string());
            choices.push(Correction::AddToDictionary);
        }
    }
    items.push("Quit".to_string());
    choices.push(Correction::Quit);

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Action")
        .items(&items)
        .default(0)
        .interact()?;

    match choices.swap_remove(index) {
        Correction::Replace(text) if text.is_empty() => {
            let replacement: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Replacement")
                .with_initial_text(error.word.clone())
                .interact_text()?;
            Ok(Correction::Replace(replacement))
        }
        choice => Ok(choice),
    }
}

pub fn print_event(event: &DictionaryEvent, colored: bool) {
    let message = match event {
        DictionaryEvent::WordAdded { language, word } => format!("Added '{word}' to {language}"),
        DictionaryEvent::WordRemoved { language, word } => {
            format!("Removed '{word}' from {language}")
        }
        DictionaryEvent::WordIgnored { word } => format!("Ignoring '{word}'"),
        DictionaryEvent::IgnoredOnce { word, location } => {
            format!("Ignoring '{word}' at byte {}", location.offset)
        }
        DictionaryEvent::ReplaceAll { word, replacement } => {
            format!("Replacing every '{word}' with '{replacement}'")
        }
    };
    if colored {
        println!("  {}", message.dimmed());
    } else {
        println!("  {}", message);
    }
}
