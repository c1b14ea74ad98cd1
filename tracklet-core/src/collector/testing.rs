//! Scripted in-memory transport for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::error::{Error, Result};

use super::dispatcher::DECISION_TARGET;
use super::transport::{AttemptOutcome, OutboundRequest, Transport, TransportSession};

/// One scripted attempt
#[derive(Debug, Clone)]
pub enum Step {
    /// Session opens and the send yields this outcome
    Respond(AttemptOutcome),
    /// `open` itself fails
    OpenFails,
    /// `open` panics
    OpenPanics,
    /// Session opens and the send panics
    SendPanics,
    /// Send succeeds and `release` panics
    ReleasePanics,
}

/// Transport interaction, numbered by session in open order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Open(usize),
    Send(usize),
    Release(usize),
    /// Retry decision taken by the dispatcher
    Decide,
}

/// Plays back a script of outcomes; answers `Success` once the script runs out
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    opened: AtomicUsize,
    releases: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<OutboundRequest>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn failing(outcome: AttemptOutcome, times: usize) -> Arc<Self> {
        Self::new(std::iter::repeat(Step::Respond(outcome)).take(times))
    }

    /// Sessions successfully opened
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Raw `release` calls across all sessions
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Log retry decisions made on this thread into [`calls`](Self::calls).
    ///
    /// Only covers dispatches polled on the current thread, which is what
    /// `#[tokio::test]` gives.
    pub fn record_decisions(&self) -> DefaultGuard {
        let recorder = DecisionRecorder {
            calls: self.calls.clone(),
        };
        tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder))
    }
}

impl Transport for ScriptedTransport {
    fn open(&self) -> Result<Box<dyn TransportSession>> {
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(Step::Respond(AttemptOutcome::Success));

        match step {
            Step::OpenFails => Err(Error::Network("scripted open failure".to_string())),
            Step::OpenPanics => panic!("scripted open panic"),
            step => {
                let id = self.opened.fetch_add(1, Ordering::SeqCst);
                self.calls.lock().push(Call::Open(id));
                Ok(Box::new(ScriptedSession {
                    id,
                    step,
                    releases: self.releases.clone(),
                    requests: self.requests.clone(),
                    calls: self.calls.clone(),
                }))
            }
        }
    }
}

struct ScriptedSession {
    id: usize,
    step: Step,
    releases: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<OutboundRequest>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

#[async_trait]
impl TransportSession for ScriptedSession {
    async fn send(&mut self, request: OutboundRequest) -> AttemptOutcome {
        self.calls.lock().push(Call::Send(self.id));
        self.requests.lock().push(request);
        tokio::task::yield_now().await;

        match &self.step {
            Step::Respond(outcome) => outcome.clone(),
            Step::SendPanics => panic!("scripted send panic"),
            _ => AttemptOutcome::Success,
        }
    }

    fn release(&mut self) {
        self.calls.lock().push(Call::Release(self.id));
        self.releases.fetch_add(1, Ordering::SeqCst);
        if matches!(self.step, Step::ReleasePanics) {
            panic!("scripted release panic");
        }
    }
}

struct DecisionRecorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl<S: Subscriber> Layer<S> for DecisionRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == DECISION_TARGET {
            self.calls.lock().push(Call::Decide);
        }
    }
}
