//! Dispatch loop
//!
//! Drives one event through compress → send → decide until it is delivered
//! or the retry budget is spent. Attempts are strictly sequential: the next
//! one starts only after the previous session has been released.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;

use crate::config::TransportConfig;
use crate::error::{panic_message, Error, Result};

use super::compression::{self, CompressionMode};
use super::encoder::EncodedPayload;
use super::retry::{RetryDecision, RetryPolicy};
use super::transport::{
    AttemptOutcome, HttpTransport, OutboundRequest, SessionGuard, Transport,
};

/// Tracing target of the per-attempt retry decision
pub(crate) const DECISION_TARGET: &str = "tracklet::retry";

/// Result of a delivered dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Compression path of the final attempt
    pub compression: CompressionMode,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    max_payload_size: usize,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, max_payload_size: usize) -> Self {
        Self {
            transport,
            policy,
            max_payload_size,
        }
    }

    /// Build a dispatcher backed by [`HttpTransport`]
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::new(
            Arc::new(transport),
            RetryPolicy::new(config.max_retries),
            config.max_payload_size,
        ))
    }

    /// Deliver `payload` to `url`.
    ///
    /// Compression runs again on every attempt from the same encoded bytes.
    /// Compression failures end the dispatch immediately; transport failures
    /// are retried until the budget runs out.
    pub async fn dispatch(&self, url: &str, payload: &EncodedPayload) -> Result<DispatchReport> {
        let mut attempts = 0;
        self.dispatch_counted(url, payload, &mut attempts).await
    }

    /// Same as [`dispatch`](Self::dispatch), keeping `attempts` at the number
    /// of transport attempts started so far.
    ///
    /// The count stays accurate whichever way the dispatch ends, including a
    /// compression failure on a retry or an unwinding transport.
    pub async fn dispatch_counted(
        &self,
        url: &str,
        payload: &EncodedPayload,
        attempts: &mut u32,
    ) -> Result<DispatchReport> {
        let mut attempt_index = 0u32;

        loop {
            let compressed = compression::compress(payload, self.max_payload_size).await?;
            let request = OutboundRequest {
                url: url.to_string(),
                body: compressed.bytes,
            };

            *attempts = attempt_index + 1;
            let (outcome, decision) = self.attempt(attempt_index, request).await;

            match decision {
                RetryDecision::Finish => {
                    tracing::debug!(
                        attempts = attempt_index + 1,
                        size = payload.len(),
                        "Delivered event"
                    );
                    return Ok(DispatchReport {
                        attempts: attempt_index + 1,
                        compression: compressed.mode,
                    });
                }
                RetryDecision::Retry => {
                    tracing::warn!(
                        attempt = attempt_index + 1,
                        max_attempts = self.policy.max_attempts(),
                        outcome = ?outcome,
                        "Transient error sending event, retrying"
                    );
                    attempt_index += 1;
                }
                RetryDecision::GiveUp => {
                    let last = outcome
                        .to_error()
                        .unwrap_or_else(|| Error::Network("unknown failure".to_string()));
                    return Err(Error::RetryBudgetExhausted {
                        attempts: attempt_index + 1,
                        last: Box::new(last),
                    });
                }
            }
        }
    }

    /// Run one attempt on a fresh session and decide what follows.
    ///
    /// Timeouts and network errors release the session before deciding;
    /// HTTP responses are decided first, then released. Either way the
    /// session is gone before this returns. A panic while opening or
    /// sending counts as a network error.
    async fn attempt(
        &self,
        attempt_index: u32,
        request: OutboundRequest,
    ) -> (AttemptOutcome, RetryDecision) {
        let opened = panic::catch_unwind(AssertUnwindSafe(|| self.transport.open()))
            .unwrap_or_else(|panic| {
                Err(Error::Network(format!(
                    "transport open panicked: {}",
                    panic_message(&*panic)
                )))
            });

        let mut guard = match opened {
            Ok(session) => SessionGuard::new(session),
            Err(e) => {
                let outcome = AttemptOutcome::NetworkError(e.to_string());
                let decision = self.decide(attempt_index, &outcome);
                return (outcome, decision);
            }
        };

        let outcome = AssertUnwindSafe(guard.send(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                AttemptOutcome::NetworkError(format!(
                    "transport send panicked: {}",
                    panic_message(&*panic)
                ))
            });

        if matches!(
            outcome,
            AttemptOutcome::Timeout | AttemptOutcome::NetworkError(_)
        ) {
            guard.release();
        }
        let decision = self.decide(attempt_index, &outcome);
        // no-op when already released above
        guard.release();

        (outcome, decision)
    }

    fn decide(&self, attempt_index: u32, outcome: &AttemptOutcome) -> RetryDecision {
        let decision = self.policy.decide(attempt_index, outcome);
        tracing::trace!(
            target: DECISION_TARGET,
            attempt = attempt_index + 1,
            ?outcome,
            ?decision,
            "Retry decision"
        );
        decision
    }
}
