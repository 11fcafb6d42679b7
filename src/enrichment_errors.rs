//! # Enrichment Error Types Module
//!
//! This module defines the error types used by the enrichment pipeline and the
//! optional AI lane. None of these errors is allowed to abort a product: stages
//! turn them into warnings or skipped deltas, and the AI lane turns them into an
//! empty augmentation result.

/// Errors raised while running a deterministic enrichment stage
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichError {
    /// A delta carried a value of the wrong kind for its field
    FieldType {
        /// Field name as it appears in provenance
        field: String,
        /// Human-readable name of the expected value kind
        expected: &'static str,
    },
    /// A stage failed internally
    Stage {
        /// Stage name
        stage: String,
        /// Failure description
        message: String,
    },
}

impl std::fmt::Display for EnrichError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichError::FieldType { field, expected } => {
                write!(f, "Field type error: '{field}' expects {expected}")
            }
            EnrichError::Stage { stage, message } => write!(f, "Stage error in {stage}: {message}"),
        }
    }
}

impl std::error::Error for EnrichError {}

/// Errors raised by the AI augmentation lane
#[derive(Debug, Clone, PartialEq)]
pub enum AiError {
    /// Transport-level failure (connection, timeout, body read)
    Http(String),
    /// Non-2xx response from the chat endpoint
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },
    /// Response or message content was not the expected JSON
    Parse(String),
    /// Response carried no choices
    EmptyChoices,
    /// Cache file read/write failure
    Io(String),
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::Http(msg) => write!(f, "HTTP error: {msg}"),
            AiError::Status { status, body } => write!(f, "Unexpected status {status}: {body}"),
            AiError::Parse(msg) => write!(f, "Parse error: {msg}"),
            AiError::EmptyChoices => write!(f, "Response contained no choices"),
            AiError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for AiError {}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for AiError {
    fn from(err: std::io::Error) -> Self {
        AiError::Io(err.to_string())
    }
}
