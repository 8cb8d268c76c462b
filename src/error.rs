//! Error types shared by the classifier and dictionary layers.

use std::path::PathBuf;
use thiserror::Error;

/// Raised by classifiers that require well-formed input.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The strict XML variant could not parse the buffer.
    #[error("malformed markup at byte {position}: {message}")]
    MalformedMarkup { position: usize, message: String },
}

impl ClassificationError {
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedMarkup {
            position,
            message: message.into(),
        }
    }
}

/// Problems found while resolving classifier definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown regex option '{0}'")]
    UnknownRegexOption(String),

    #[error("unknown classification '{0}'")]
    UnknownClassification(String),

    #[error("classifier '{id}' has an invalid rule: {message}")]
    InvalidRule { id: String, message: String },

    #[error("extension '{extension}' maps to unknown classifier '{id}'")]
    UnknownClassifierId { extension: String, id: String },

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Dictionary loading and mutation failures.
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary '{language}' is missing its {missing} file")]
    MissingPair {
        language: String,
        missing: &'static str,
    },

    #[error("dictionary '{language}' is corrupt: {message}")]
    Corrupt { language: String, message: String },

    #[error("no dictionaries could be loaded for {0:?}")]
    NoDictionaries(Vec<String>),

    #[error("no loaded dictionary for language '{0}'")]
    UnknownLanguage(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dictionary service has stopped")]
    ServiceStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A check stopped because its cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("check cancelled")]
pub struct Cancelled;
