//! Event model and ingest-body validation
//!
//! Events arrive as JSON (a single object or an array of objects). Parsing is
//! strict about the required fields and ignores unknown ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured log event submitted by a producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub timestamp_ms: i64,
    pub level: Level,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Event {
    /// Minimal event with only the required fields set
    pub fn new(timestamp_ms: i64, level: Level, name: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            level,
            name: name.into(),
            device_id: None,
            session_id: None,
            flow_id: None,
            screen: None,
            message: None,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Rejection of an ingest body
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("expected an event object or an array of event objects")]
    UnexpectedShape,

    #[error("event at index {index} is invalid: {reason}")]
    InvalidEvent { index: usize, reason: String },
}

/// Parse an ingest request body into validated events, preserving order.
///
/// Either every element is valid or the whole body is rejected; nothing is
/// partially accepted.
pub fn parse_ingest_body(body: &[u8]) -> Result<Vec<Event>, ValidationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let items = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        _ => return Err(ValidationError::UnexpectedShape),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_event(index, item))
        .collect()
}

fn validate_event(index: usize, item: Value) -> Result<Event, ValidationError> {
    if !item.is_object() {
        return Err(ValidationError::InvalidEvent {
            index,
            reason: "not a JSON object".to_string(),
        });
    }

    let event: Event = serde_json::from_value(item).map_err(|e| ValidationError::InvalidEvent {
        index,
        reason: e.to_string(),
    })?;

    if event.name.trim().is_empty() {
        return Err(ValidationError::InvalidEvent {
            index,
            reason: "name must be a non-empty string".to_string(),
        });
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_object() {
        let body = json!({
            "timestampMs": 1705728000000_i64,
            "level": "info",
            "name": "app.start",
            "deviceId": "device-1",
            "payload": {"build": 42}
        });
        let events = parse_ingest_body(body.to_string().as_bytes()).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::Info);
        assert_eq!(events[0].device_id.as_deref(), Some("device-1"));
        assert_eq!(events[0].payload, Some(json!({"build": 42})));
    }

    #[test]
    fn test_parse_array_preserves_order() {
        let body = json!([
            {"timestampMs": 3, "level": "debug", "name": "c"},
            {"timestampMs": 1, "level": "warn", "name": "a"},
            {"timestampMs": 2, "level": "error", "name": "b"}
        ]);
        let events = parse_ingest_body(body.to_string().as_bytes()).unwrap();

        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_empty_array_is_accepted() {
        let events = parse_ingest_body(b"[]").unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_rejects_missing_required_fields() {
        let body = json!([
            {"timestampMs": 1, "level": "info", "name": "ok"},
            {"level": "info", "name": "no-timestamp"}
        ]);
        let err = parse_ingest_body(body.to_string().as_bytes()).unwrap_err();
        match err {
            ValidationError::InvalidEvent { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_unknown_level_and_blank_name() {
        let bad_level = json!({"timestampMs": 1, "level": "fatal", "name": "x"});
        assert!(parse_ingest_body(bad_level.to_string().as_bytes()).is_err());

        let blank_name = json!({"timestampMs": 1, "level": "info", "name": "  "});
        let err = parse_ingest_body(blank_name.to_string().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn test_rejects_scalars_and_garbage() {
        assert!(matches!(
            parse_ingest_body(b"42"),
            Err(ValidationError::UnexpectedShape)
        ));
        assert!(matches!(
            parse_ingest_body(b"{not json"),
            Err(ValidationError::MalformedJson(_))
        ));
        assert!(matches!(
            parse_ingest_body(b"[1, 2]"),
            Err(ValidationError::InvalidEvent { index: 0, .. })
        ));
    }

    #[test]
    fn test_null_payload_is_absent() {
        let body = json!({"timestampMs": 1, "level": "info", "name": "x", "payload": null});
        let events = parse_ingest_body(body.to_string().as_bytes()).unwrap();
        assert!(events[0].payload.is_none());
    }
}
