// ABOUTME: Error types for reading source documents and selector profiles.
// ABOUTME: Provides SourceError with XML, profile lookup and I/O variants.

use std::io;

use thiserror::Error;

/// Errors raised while turning a scraped source document into fragments.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The document is not well-formed XML.
    #[error("xml error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// No profile is registered under the requested name.
    #[error("unknown source profile `{name}` (available: {available})")]
    UnknownProfile { name: String, available: String },

    /// A profile file could not be parsed or holds an invalid selector.
    #[error("invalid source profiles: {0}")]
    Profiles(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    pub fn profiles(msg: impl Into<String>) -> Self {
        SourceError::Profiles(msg.into())
    }

    pub fn is_unknown_profile(&self) -> bool {
        matches!(self, SourceError::UnknownProfile { .. })
    }
}

pub type Result<T, E = SourceError> = std::result::Result<T, E>;
