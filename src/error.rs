//! Error types for the visitor archetype classifier

use thiserror::Error;

/// Errors surfaced by the session store, event schema and configuration layer.
///
/// Extractors never produce errors: an extractor without enough samples simply
/// abstains and contributes nothing to the score vector.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
