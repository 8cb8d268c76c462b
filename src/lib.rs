pub mod checker;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dict;
pub mod error;

pub use checker::SpellChecker;
pub use classifier::{Classification, ClassifiedSpan};
pub use config::Config;

use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub error_count: usize,
    pub fixed_count: usize,
    pub errors: Vec<SpellError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Misspelling,
    DoubledWord,
}

/// One finding. `offset` and `length` are bytes into the file; `line` and
/// `column` are 1-based, the column counted in chars.
#[derive(Debug, Clone)]
pub struct SpellError {
    pub word: String,
    pub kind: IssueKind,
    pub classification: Classification,
    pub offset: usize,
    pub length: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
    pub suggestions: Vec<String>,
}
