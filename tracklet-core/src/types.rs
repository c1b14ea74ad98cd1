//! Core domain types for tracklet
//!
//! | Term | Definition |
//! |------|------------|
//! | **Dispatch** | One logical event delivery, spanning up to `1 + max_retries` attempts |
//! | **Attempt** | One compress → transport cycle within a dispatch |
//! | **GUID** | Session-scoped client identifier, generated by `init` unless supplied |

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Free-form event properties
pub type Properties = serde_json::Map<String, serde_json::Value>;

// ============================================
// Event kinds
// ============================================

/// Analytics event kinds accepted by [`crate::Tracker::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Click,
    Pageview,
    Expose,
}

impl EventKind {
    /// Map a numeric kind code: 1 = click, 2 = pageview, 3 = expose.
    ///
    /// Unknown or absent codes fall back to click.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(2) => EventKind::Pageview,
            Some(3) => EventKind::Expose,
            _ => EventKind::Click,
        }
    }

    /// Event name sent to the collector
    pub fn event_name(&self) -> &'static str {
        match self {
            EventKind::Click => "click_event",
            EventKind::Pageview => "pageview_event",
            EventKind::Expose => "expose_event",
        }
    }
}

// ============================================
// Payload
// ============================================

/// A single event as delivered to the collector
///
/// Analytics events serialize as `{"event": name, "properties": {...}}`,
/// identify calls as `{"type": "identify", "properties": {...}}`.
/// A payload is never modified after construction, so every retry of a
/// dispatch sends the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(default)]
    pub properties: Properties,
}

impl EventPayload {
    /// Build an analytics event payload
    pub fn event(kind: EventKind, properties: Properties) -> Self {
        Self {
            event: Some(kind.event_name().to_string()),
            event_type: None,
            properties,
        }
    }

    /// Build an identify payload for a distinct id
    pub fn identify(distinct_id: &str, props: &IdentifyProps) -> Self {
        let mut properties = Properties::new();
        properties.insert("distinct_id".to_string(), distinct_id.into());
        properties.insert(
            "email".to_string(),
            props.email.clone().unwrap_or_default().into(),
        );
        properties.insert(
            "name".to_string(),
            props.name.clone().unwrap_or_default().into(),
        );

        Self {
            event: None,
            event_type: Some("identify".to_string()),
            properties,
        }
    }

    /// The event name or payload type, for logging
    pub fn label(&self) -> &str {
        self.event
            .as_deref()
            .or(self.event_type.as_deref())
            .unwrap_or("unknown")
    }
}

/// User traits attached to an identify call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifyProps {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// ============================================
// Init
// ============================================

/// Optional data passed to `init`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitData {
    /// Use this GUID instead of generating one
    #[serde(default)]
    pub guid: Option<String>,

    /// Extra query parameters appended to every collector request, in
    /// insertion order
    #[serde(default, rename = "queryParam")]
    pub query_param: IndexMap<String, String>,
}

/// Outcome of `init`
///
/// `init` never fails; internal errors come back as a `500` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitResult {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl InitResult {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

// ============================================
// Stats
// ============================================

/// Dispatch counters for a tracker
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Dispatches started
    pub dispatched: u64,
    /// Dispatches that ended in a 200
    pub delivered: u64,
    /// Dispatches that ended in a terminal error
    pub failed: u64,
    /// Transport attempts across all dispatches
    pub attempts: u64,
}

impl DispatchStats {
    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, attempts: u32) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(u64::from(attempts), Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, attempts: u32) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(u64::from(attempts), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_codes() {
        assert_eq!(EventKind::from_code(Some(1)), EventKind::Click);
        assert_eq!(EventKind::from_code(Some(2)), EventKind::Pageview);
        assert_eq!(EventKind::from_code(Some(3)), EventKind::Expose);
        assert_eq!(EventKind::from_code(Some(42)), EventKind::Click);
        assert_eq!(EventKind::from_code(None), EventKind::Click);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::Click.event_name(), "click_event");
        assert_eq!(EventKind::Pageview.event_name(), "pageview_event");
        assert_eq!(EventKind::Expose.event_name(), "expose_event");
    }

    #[test]
    fn test_event_payload_shape() {
        let mut props = Properties::new();
        props.insert("path".to_string(), "/home".into());

        let payload = EventPayload::event(EventKind::Pageview, props);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"event": "pageview_event", "properties": {"path": "/home"}})
        );
        assert_eq!(payload.label(), "pageview_event");
    }

    #[test]
    fn test_identify_payload_defaults_missing_traits() {
        let props = IdentifyProps {
            email: Some("a@example.com".to_string()),
            name: None,
        };
        let payload = EventPayload::identify("user-7", &props);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "identify");
        assert!(json.get("event").is_none());
        assert_eq!(json["properties"]["distinct_id"], "user-7");
        assert_eq!(json["properties"]["email"], "a@example.com");
        assert_eq!(json["properties"]["name"], "");
    }

    #[test]
    fn test_init_data_from_json() {
        let data: InitData =
            serde_json::from_str(r#"{"guid": "abc", "queryParam": {"app": "web"}}"#).unwrap();
        assert_eq!(data.guid.as_deref(), Some("abc"));
        assert_eq!(data.query_param.get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_init_data_keeps_query_param_order() {
        let data: InitData =
            serde_json::from_str(r#"{"queryParam": {"zone": "eu", "app": "web", "b": "1"}}"#)
                .unwrap();
        let keys: Vec<&str> = data.query_param.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zone", "app", "b"]);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = DispatchStats::default();
        stats.record_dispatched();
        stats.record_dispatched();
        stats.record_delivered(1);
        stats.record_failed(4);

        let snap = stats.snapshot();
        assert_eq!(snap.dispatched, 2);
        assert_eq!(snap.delivered, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.attempts, 5);
    }
}
