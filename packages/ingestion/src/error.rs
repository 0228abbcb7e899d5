//! Typed errors for the ingestion library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Validation problems are deliberately NOT errors: the validator reports
//! them as [`Finding`](crate::types::Finding) values so callers can render
//! itemized reports. Only failures of collaborators (stores, language
//! models, text extractors) surface through these enums.

use thiserror::Error;

/// Errors that can occur during ingestion operations.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Storage operation failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Language model unavailable or failed
    #[error("language model error: {0}")]
    Llm(#[from] LlmError),

    /// Text extraction (OCR) from document bytes failed
    #[error("text extraction error: {0}")]
    TextExtraction(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Import payload rejected by validation; the findings carry the detail
    #[error("import payload failed validation with {} error(s)", errors.len())]
    InvalidPayload { errors: Vec<String> },
}

/// Errors raised by persistence backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    /// Row not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Row could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure (connection, query, IO)
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap an arbitrary backend failure.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }

    /// True when the write was rejected by a uniqueness constraint.
    ///
    /// Import treats conflicts as duplicate submissions (a warning), not
    /// as backend failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised by language model backends.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API answered but produced no usable content
    #[error("empty response from language model")]
    EmptyResponse,

    /// The call exceeded the configured deadline
    #[error("language model call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Missing or malformed client configuration
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for language model operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_detection() {
        let err = StoreError::Conflict {
            constraint: "documents_site_batch_url_key".to_string(),
        };
        assert!(err.is_conflict());
        assert!(!StoreError::backend("boom").is_conflict());
    }

    #[test]
    fn store_error_converts_to_ingest_error() {
        let err: IngestError = StoreError::NotFound {
            entity: "site",
            id: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, IngestError::Store(_)));
        assert!(err.to_string().contains("site not found"));
    }

    #[test]
    fn invalid_payload_counts_errors() {
        let err = IngestError::InvalidPayload {
            errors: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().contains("2 error(s)"));
    }
}
