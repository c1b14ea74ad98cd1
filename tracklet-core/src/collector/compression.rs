//! Size-based gzip compression
//!
//! Payloads up to the size threshold are compressed inline on the caller's
//! task. Larger ones are compressed on the blocking pool so the caller's task
//! keeps running until the result is ready. Both paths use the same gzip
//! encoder and level, so the output is identical.

use std::io::Write;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

use super::encoder::EncodedPayload;

/// Default size threshold in bytes
pub const MAX_SIZE: usize = 2048;

/// Which compression path produced a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Compressed synchronously on the dispatching task
    Inline,
    /// Compressed on the blocking pool
    Background,
}

/// Gzip body ready to send
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Bytes,
    pub mode: CompressionMode,
}

/// Gzip a byte slice
pub fn gzip(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(input.len() / 2 + 32),
        Compression::default(),
    );
    encoder
        .write_all(input)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(e.to_string()))
}

/// Pick the compression path for a payload
pub fn select_mode(len: usize, max_size: usize) -> CompressionMode {
    if len > max_size {
        CompressionMode::Background
    } else {
        CompressionMode::Inline
    }
}

/// Compress an encoded payload, choosing the path by size.
///
/// A failure on either path is fatal for the dispatch.
pub async fn compress(payload: &EncodedPayload, max_size: usize) -> Result<Compressed> {
    let mode = select_mode(payload.len(), max_size);

    let bytes = match mode {
        CompressionMode::Inline => gzip(payload.bytes())?,
        CompressionMode::Background => {
            let input = payload.bytes().clone();
            tokio::task::spawn_blocking(move || gzip(&input))
                .await
                .map_err(|e| Error::Compression(format!("compression task failed: {}", e)))??
        }
    };

    tracing::debug!(
        size = payload.len(),
        compressed = bytes.len(),
        ?mode,
        "Compressed payload"
    );

    Ok(Compressed {
        bytes: Bytes::from(bytes),
        mode,
    })
}
