//! Event dispatch pipeline
//!
//! Every event goes through the same stages:
//! - **Encode**: serialize to UTF-8 JSON once per dispatch
//! - **Compress**: gzip, inline for small payloads and on the blocking pool above [`MAX_SIZE`]
//! - **Send**: POST on a fresh transport session that is released on every exit path
//! - **Decide**: finish, retry, or give up after the retry budget
//!
//! ## Wire format
//!
//! ```text
//! POST {api_link}?compression=gzip-js&...
//! Content-Type: text/plain
//! Accept: */*
//! Content-Encoding: gzip
//!
//! <gzip(json)>
//! ```

mod compression;
mod dispatcher;
mod encoder;
mod retry;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use compression::{compress, gzip, select_mode, Compressed, CompressionMode, MAX_SIZE};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use encoder::EncodedPayload;
pub use retry::{RetryDecision, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use transport::{
    AttemptOutcome, HttpTransport, OutboundRequest, SessionGuard, Transport, TransportSession,
};
