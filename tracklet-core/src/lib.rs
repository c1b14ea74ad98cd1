//! # tracklet-core
//!
//! Event telemetry client: sends lightweight analytics events (clicks,
//! pageviews, exposures, identify calls) to a collector endpoint as
//! gzip-compressed JSON, with a bounded number of retries per event.
//!
//! This library provides:
//! - The dispatch pipeline (encode, compress, send, retry)
//! - The [`Tracker`] API used by embedding code
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use tracklet_core::{Config, InitData, Properties, Tracker};
//!
//! # async fn run() -> tracklet_core::Result<()> {
//! let tracker = Tracker::new(Config::load()?)?;
//! let init = tracker.init(Some(2), Some(InitData::default()));
//! assert_eq!(init.status, 200);
//!
//! let mut props = Properties::new();
//! props.insert("path".to_string(), "/home".into());
//! tracker.send(Some(2), props)?.wait().await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Environment, TrackerSession};
pub use tracker::{DispatchHandle, ErrorHandler, Tracker};
pub use types::*;

// Public modules
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod tracker;
pub mod types;
