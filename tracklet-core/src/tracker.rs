//! Public tracker API
//!
//! [`Tracker`] wraps the dispatch pipeline with the three calls embedding
//! code uses: `init`, `identify` and `send`. Validation happens synchronously;
//! delivery runs on a spawned task and terminal failures are reported out of
//! band (an `error!` log line and the optional error handler).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::collector::{DispatchReport, Dispatcher, EncodedPayload};
use crate::config::Config;
use crate::error::{panic_message, Error, Result};
use crate::session::{build_query_string, generate_guid, Environment, TrackerSession};
use crate::types::{
    DispatchStats, EventKind, EventPayload, IdentifyProps, InitData, InitResult, Properties,
    StatsSnapshot,
};

/// Callback invoked with every terminal dispatch failure
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Handle to a spawned dispatch
///
/// Dropping it detaches the dispatch; it still runs to completion.
pub struct DispatchHandle {
    task: JoinHandle<Result<DispatchReport>>,
}

impl DispatchHandle {
    /// Wait for the dispatch to finish
    pub async fn wait(self) -> Result<DispatchReport> {
        self.task
            .await
            .map_err(|e| Error::Runtime(format!("dispatch task failed: {}", e)))?
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Event tracker
pub struct Tracker {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    session: RwLock<Option<Arc<TrackerSession>>>,
    stats: Arc<DispatchStats>,
    error_handler: Option<ErrorHandler>,
}

impl Tracker {
    /// Create a tracker that delivers over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let dispatcher = Dispatcher::from_config(&config.transport)?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Create a tracker around an existing dispatcher
    pub fn with_dispatcher(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            session: RwLock::new(None),
            stats: Arc::new(DispatchStats::default()),
            error_handler: None,
        }
    }

    /// Register a callback for terminal dispatch failures
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Initialize the tracker session.
    ///
    /// `environment` 2 selects test credentials, anything else production.
    /// Never fails: internal errors come back as a `500` result.
    pub fn init(&self, environment: Option<i32>, data: Option<InitData>) -> InitResult {
        let environment = Environment::from_code(environment);

        match self.try_init(environment, data.unwrap_or_default()) {
            Ok(guid) => {
                tracing::info!(
                    environment = environment.as_str(),
                    guid = %guid,
                    "Tracker initialized"
                );
                InitResult {
                    status: 200,
                    message: "Success Init Tracker".to_string(),
                    guid: Some(guid),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Tracker init failed");
                InitResult {
                    status: 500,
                    message: e.to_string(),
                    guid: None,
                }
            }
        }
    }

    fn try_init(&self, environment: Environment, data: InitData) -> Result<String> {
        let credentials = self.config.credentials.for_environment(environment);
        if !credentials.is_ready() {
            tracing::warn!(
                environment = environment.as_str(),
                "Credentials incomplete, dispatches will fail until init with a configured environment"
            );
        }

        let query_param = build_query_string(&data.query_param);
        let guid = match data.guid.filter(|guid| !guid.is_empty()) {
            Some(guid) => guid,
            None => generate_guid()?,
        };

        let session = TrackerSession::new(environment, credentials, query_param, guid.clone());
        *self.session.write() = Some(Arc::new(session));

        Ok(guid)
    }

    /// Identify the current user and send an `identify` event
    pub fn identify(&self, distinct_id: &str, props: &IdentifyProps) -> Result<DispatchHandle> {
        if distinct_id.is_empty() {
            return Err(Error::InvalidArgument("distinct_id is required".to_string()));
        }

        let session = {
            let mut guard = self.session.write();
            let session = guard
                .as_mut()
                .filter(|s| s.is_ready())
                .ok_or(Error::NotInitialized)?;
            Arc::make_mut(session).distinct_id = Some(distinct_id.to_string());
            session.clone()
        };

        let payload = EventPayload::identify(distinct_id, props);
        let encoded = EncodedPayload::encode(&payload)?;
        self.spawn_dispatch(session, payload.label().to_string(), encoded)
    }

    /// Send an analytics event.
    ///
    /// `kind` maps 1 = click, 2 = pageview, 3 = expose; anything else is a click.
    pub fn send(&self, kind: Option<i32>, properties: Properties) -> Result<DispatchHandle> {
        let session = self.ready_session()?;
        let payload = EventPayload::event(EventKind::from_code(kind), properties);
        let encoded = EncodedPayload::encode(&payload)?;
        self.spawn_dispatch(session, payload.label().to_string(), encoded)
    }

    /// Send an already-shaped payload without envelope construction
    pub fn send_event<T: Serialize + ?Sized>(&self, payload: &T) -> Result<DispatchHandle> {
        let session = self.ready_session()?;
        let encoded = EncodedPayload::encode(payload)?;
        self.spawn_dispatch(session, "raw".to_string(), encoded)
    }

    /// Snapshot of the current session, if initialized
    pub fn session(&self) -> Option<TrackerSession> {
        self.session.read().as_deref().cloned()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ready_session(&self) -> Result<Arc<TrackerSession>> {
        self.session
            .read()
            .as_ref()
            .filter(|s| s.is_ready())
            .cloned()
            .ok_or(Error::NotInitialized)
    }

    /// Spawn the dispatch on the current runtime.
    ///
    /// The session snapshot travels with the task, so a later `init` does not
    /// change the endpoint of attempts still to come. Every terminal failure,
    /// a panic inside the pipeline included, is logged, counted and handed to
    /// the error handler.
    fn spawn_dispatch(
        &self,
        session: Arc<TrackerSession>,
        label: String,
        encoded: EncodedPayload,
    ) -> Result<DispatchHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(format!("no tokio runtime: {}", e)))?;

        self.stats.record_dispatched();

        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        let error_handler = self.error_handler.clone();

        let task = runtime.spawn(async move {
            let url = session.endpoint();
            let mut attempts = 0;
            let result = AssertUnwindSafe(dispatcher.dispatch_counted(&url, &encoded, &mut attempts))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::Runtime(format!(
                        "dispatch panicked: {}",
                        panic_message(&*panic)
                    )))
                });

            match result {
                Ok(report) => {
                    stats.record_delivered(report.attempts);
                    Ok(report)
                }
                Err(e) => {
                    stats.record_failed(attempts);
                    tracing::error!(payload = %label, attempts, error = %e, "Event dispatch failed");
                    if let Some(handler) = error_handler {
                        handler(&e);
                    }
                    Err(e)
                }
            }
        });

        Ok(DispatchHandle { task })
    }
}
