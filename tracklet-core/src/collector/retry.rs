//! Retry policy
//!
//! The decision after each attempt is a pure function of the attempt index
//! and its outcome. Retries happen immediately; the transport timeout is the
//! only time bound on a dispatch.

use super::transport::AttemptOutcome;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What the dispatcher does after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Delivered, stop
    Finish,
    /// Run another attempt with the next index
    Retry,
    /// Budget spent, surface the failure
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on attempts per dispatch
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Decide what follows attempt `attempt_index` (zero-based)
    pub fn decide(&self, attempt_index: u32, outcome: &AttemptOutcome) -> RetryDecision {
        match outcome {
            AttemptOutcome::Success => RetryDecision::Finish,
            AttemptOutcome::HttpError { .. }
            | AttemptOutcome::NetworkError(_)
            | AttemptOutcome::Timeout => {
                if attempt_index < self.max_retries {
                    RetryDecision::Retry
                } else {
                    RetryDecision::GiveUp
                }
            }
        }
    }
}
