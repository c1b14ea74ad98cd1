//! Error types for tracklet-core

use std::any::Any;

use thiserror::Error;

/// Main error type for the tracklet-core library
#[derive(Error, Debug)]
pub enum Error {
    /// A dispatch was requested before `init` set up the session
    #[error("tracker not initialized, call init() first")]
    NotInitialized,

    /// Caller supplied an unusable argument (e.g. empty distinct id)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Payload could not be serialized
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Gzip compression failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Collector answered with a non-200 status
    #[error("collector returned HTTP {0}")]
    HttpStatus(u16),

    /// Connection-level failure, including errors while building the request
    #[error("network error: {0}")]
    Network(String),

    /// The transport's own timeout elapsed
    #[error("request timed out")]
    Timeout,

    /// Every attempt in the retry budget failed
    #[error("event delivery failed after {attempts} attempts: {last}")]
    RetryBudgetExhausted { attempts: u32, last: Box<Error> },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Randomness source failed while generating a GUID
    #[error("guid generation failed: {0}")]
    Guid(String),

    /// No async runtime available, or a dispatch task failed to join
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Whether a failed attempt with this error may be retried.
    ///
    /// Encode and compression failures are input-independent, so only
    /// transport outcomes qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus(_) | Error::Network(_) | Error::Timeout
        )
    }
}

/// Result type alias for tracklet-core
pub type Result<T> = std::result::Result<T, Error>;

/// Text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::HttpStatus(503).is_retryable());
        assert!(Error::HttpStatus(400).is_retryable());
        assert!(Error::Network("connection refused".to_string()).is_retryable());
        assert!(Error::Timeout.is_retryable());

        assert!(!Error::NotInitialized.is_retryable());
        assert!(!Error::Compression("bad".to_string()).is_retryable());
        assert!(!Error::RetryBudgetExhausted {
            attempts: 4,
            last: Box::new(Error::Timeout),
        }
        .is_retryable());
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*caught), "boom 7");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(panic_message(&*caught), "unknown panic");
    }

    #[test]
    fn test_exhausted_message_names_last_failure() {
        let err = Error::RetryBudgetExhausted {
            attempts: 4,
            last: Box::new(Error::HttpStatus(502)),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("HTTP 502"));
    }
}
