//! Error types for the PDF Annotator MCP server

use thiserror::Error;

/// Result type alias for the PDF Annotator MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF Annotator MCP server
#[derive(Error, Debug)]
pub enum Error {
    /// File could not be resolved inside the sandbox.
    ///
    /// Carries only the caller's query. The reason for the rejection is logged
    /// where it happens and is never part of this error.
    #[error("PDF not found: {query}")]
    NotFound { query: String },

    /// Page specification is malformed or out of bounds
    #[error("Invalid page range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },

    /// The structural reader could not open or parse the document
    #[error("Failed to read PDF: {reason}")]
    BackendReadFailure { reason: String },

    /// One backend failed while the other succeeded
    #[error("{backend} backend failed: {reason}")]
    PartialBackendFailure {
        backend: &'static str,
        reason: String,
    },

    /// PDF is encrypted
    #[error("PDF is password protected")]
    PasswordRequired,

    /// No usable directory could be configured at startup
    #[error("No accessible directories configured")]
    NoAllowedRoots,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::NotFound { query } => format!(
                "Could not find file '{}'. Provide an absolute path or place the file within the configured accessible directories.",
                query
            ),
            Error::InvalidRange { range, reason } => {
                format!("Invalid page range '{}': {}", range, reason)
            }
            Error::BackendReadFailure { .. } => "Failed to read PDF".to_string(),
            Error::PartialBackendFailure { backend, .. } => {
                format!("PDF {} extraction failed", backend)
            }
            Error::PasswordRequired => {
                "PDF is password protected (encrypted documents are not supported)".to_string()
            }
            Error::NoAllowedRoots => "No accessible directories configured".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }

    pub(crate) fn invalid_range(range: &str, reason: impl Into<String>) -> Self {
        Error::InvalidRange {
            range: range.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_does_not_leak_reason() {
        let err = Error::NotFound {
            query: "secret.pdf".to_string(),
        };
        let msg = err.client_message();
        assert!(msg.starts_with("Could not find file 'secret.pdf'"));
        assert!(!msg.contains("denied"));
        assert!(!msg.contains("size"));
    }

    #[test]
    fn test_backend_failure_hides_library_text() {
        let err = Error::BackendReadFailure {
            reason: "xref table broken at offset 1234".to_string(),
        };
        assert_eq!(err.client_message(), "Failed to read PDF");
    }
}
