//! Error types for the personal finance advisor

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Startup Errors (fatal)
    // =============================

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Reference data error: {0}")]
    ReferenceDataError(String),

    // =============================
    // Per-turn Errors (contained)
    // =============================

    #[error("Completion endpoint error: {0}")]
    CompletionError(String),

    #[error("Embedding endpoint error: {0}")]
    EmbeddingError(String),

    #[error("Remote call timed out after {0}s")]
    RemoteTimeout(u64),

    #[error("Context store capacity exceeded: {0}")]
    CapacityError(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Empty user input")]
    EmptyInput,

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AdvisorError {
    /// Transient remote failures are retried once before the caller degrades
    /// to a partial-turn reply.
    pub fn is_transient(&self) -> bool {
        match self {
            AdvisorError::RemoteTimeout(_) => true,
            AdvisorError::HttpError(e) => e.is_timeout() || e.is_connect(),
            AdvisorError::CompletionError(_) | AdvisorError::EmbeddingError(_) => true,
            _ => false,
        }
    }
}
