//! Payload encoding
//!
//! Serializes an event to UTF-8 JSON once per dispatch. The encoded bytes are
//! kept for the whole dispatch and re-compressed on each attempt.

use bytes::Bytes;
use serde::Serialize;

use crate::error::Result;

/// UTF-8 JSON bytes of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    bytes: Bytes,
}

impl EncodedPayload {
    /// Encode any serializable payload.
    ///
    /// Fails with [`crate::Error::Encode`] only for values serde_json cannot
    /// represent (e.g. maps with non-string keys).
    pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self {
            bytes: Bytes::from(bytes),
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, EventPayload, Properties};
    use std::collections::HashMap;

    #[test]
    fn test_encode_is_deterministic() {
        let mut props = Properties::new();
        props.insert("b".to_string(), 2.into());
        props.insert("a".to_string(), 1.into());
        let payload = EventPayload::event(EventKind::Click, props);

        let first = EncodedPayload::encode(&payload).unwrap();
        let second = EncodedPayload::encode(&payload).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            std::str::from_utf8(first.bytes()).unwrap(),
            r#"{"event":"click_event","properties":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn test_len_counts_utf8_bytes() {
        let encoded = EncodedPayload::encode("é").unwrap();
        // quotes plus a two-byte character
        assert_eq!(encoded.len(), 4);
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_non_string_keys_fail_to_encode() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "x");
        let err = EncodedPayload::encode(&map).unwrap_err();
        assert!(matches!(err, crate::Error::Encode(_)));
    }
}
