//! Call-level error types.
//!
//! Only call errors are caller-visible: a worker `Error` reply rejects the
//! one call it names. Channel-level and protocol-level faults are logged as
//! diagnostics and never surface here.

use thiserror::Error;

use crate::protocol::{codes, ErrorInfo};

/// Result type for worker calls.
pub type CallResult<T> = Result<T, CallError>;

/// Errors a single call can fail with.
#[derive(Error, Debug)]
pub enum CallError {
    /// Worker could not parse the supplied document bytes.
    #[error("could not parse document: {0}")]
    DocumentParse(String),

    /// Page index outside the open document's page range.
    #[error("page out of range: {0}")]
    PageOutOfRange(String),

    /// Multipage command issued out of sequence.
    #[error("multipage sequence violation: {0}")]
    SequenceViolation(String),

    /// Worker error with a code this layer does not classify.
    #[error("worker error: {message} (code: {code})")]
    Remote {
        /// Error code from the worker.
        code: String,
        /// Error message from the worker.
        message: String,
    },

    /// The reply payload did not match the shape of the issued command.
    #[error("reply payload did not match the issued command")]
    UnexpectedReply,
}

impl CallError {
    /// Create a remote error from an error descriptor.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classify a worker error code into a more specific error type.
    fn classify(code: &str, message: &str) -> Self {
        match code {
            codes::DOCUMENT_PARSE_FAILED => Self::DocumentParse(message.to_string()),
            codes::PAGE_OUT_OF_RANGE => Self::PageOutOfRange(message.to_string()),
            codes::SEQUENCE_VIOLATION => Self::SequenceViolation(message.to_string()),
            _ => Self::remote(code, message),
        }
    }
}

impl From<ErrorInfo> for CallError {
    fn from(info: ErrorInfo) -> Self {
        Self::classify(&info.code, &info.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            CallError::from(ErrorInfo::new(codes::DOCUMENT_PARSE_FAILED, "bad magic")),
            CallError::DocumentParse(_)
        ));
        assert!(matches!(
            CallError::from(ErrorInfo::new(codes::PAGE_OUT_OF_RANGE, "page 9 of 2")),
            CallError::PageOutOfRange(_)
        ));
        assert!(matches!(
            CallError::from(ErrorInfo::new(codes::SEQUENCE_VIOLATION, "no open session")),
            CallError::SequenceViolation(_)
        ));
        assert!(matches!(
            CallError::from(ErrorInfo::new("OUT_OF_MEMORY", "oom")),
            CallError::Remote { .. }
        ));
    }
}
