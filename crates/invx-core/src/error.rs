//! Error types for the invx-core library.

use thiserror::Error;

/// Main error type for host-facing operations (config and input loading).
///
/// Extraction itself never fails; see [`crate::invoice::extract`].
#[derive(Error, Debug)]
pub enum InvxError {
    /// Invoice extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Malformed JSON input or config.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Recoverable conditions raised inside the extraction pipeline.
///
/// These never reach the caller of `extract`: the pipeline falls back to
/// another strategy or drops the offending token.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Not enough evidence to run a strategy.
    #[error("insufficient evidence: {0}")]
    InsufficientEvidence(String),

    /// A token carried a zero-area, all-zero or non-finite bounding box.
    #[error("degenerate geometry for token {text:?}: {reason}")]
    DegenerateGeometry { text: String, reason: String },
}

/// Result type for the invx library.
pub type Result<T> = std::result::Result<T, InvxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExtractionError::InsufficientEvidence("1 numeric x-position".to_string());
        assert_eq!(err.to_string(), "insufficient evidence: 1 numeric x-position");

        let err: InvxError = ExtractionError::DegenerateGeometry {
            text: "12".to_string(),
            reason: "zero area".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "extraction error: degenerate geometry for token \"12\": zero area"
        );
    }
}
