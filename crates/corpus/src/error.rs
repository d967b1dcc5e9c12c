// ABOUTME: Error types for corpus curation operations.
// ABOUTME: Provides CorpusError with configuration, encoding, empty-result and I/O variants.

use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can occur while building, curating or persisting a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Invalid run configuration (unsupported format, bad ratio, missing file).
    #[error("configuration error: {0}")]
    Config(String),

    /// A tree document was requested but the data is not UTF-8.
    #[error("encoding error: {required} is required for tree documents, detected {detected}")]
    Encoding {
        detected: String,
        required: &'static str,
    },

    /// A stage left no rows to export.
    #[error("{stage} produced an empty corpus; no output written")]
    EmptyResult { stage: &'static str },

    /// Rows violate the tree invariants.
    #[error("malformed corpus: {0}")]
    Malformed(String),

    /// Cooperative cancellation was requested.
    #[error("cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl CorpusError {
    /// Creates a Config error with a custom message.
    pub fn config(msg: impl Into<String>) -> Self {
        CorpusError::Config(msg.into())
    }

    /// Creates a Malformed error with a custom message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        CorpusError::Malformed(msg.into())
    }

    /// Creates a Spreadsheet error from the xlsx reader or writer.
    pub fn spreadsheet(err: impl fmt::Display) -> Self {
        CorpusError::Spreadsheet(err.to_string())
    }

    /// Returns true if this is a Config error.
    pub fn is_config(&self) -> bool {
        matches!(self, CorpusError::Config(_))
    }

    /// Returns true if this is an EmptyResult error.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, CorpusError::EmptyResult { .. })
    }
}

pub type Result<T, E = CorpusError> = std::result::Result<T, E>;
