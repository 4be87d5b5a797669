//! Payload redaction
//!
//! Sensitive keys are matched case-insensitively against object keys at any
//! depth. Arrays are walked element-wise; their elements are never matched as
//! keys themselves. Payloads are owned `serde_json::Value` trees, so a
//! payload cannot reference itself and the walk always terminates.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::event::Event;

/// Replacement written in place of a redacted value
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Case-insensitive set of payload keys whose values must never be stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionKeys {
    keys: BTreeSet<String>,
}

impl RedactionKeys {
    /// Build a key set; entries are trimmed and lowercased, blanks dropped.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    /// Parse a comma-separated key list such as `email,token`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matches(&self, key: &str) -> bool {
        self.keys.contains(&key.to_lowercase())
    }

    /// Keys in sorted order, as reported by the health endpoint
    pub fn to_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

/// Return the event with its payload redacted.
///
/// An event without payload, or an empty key set, is handed back untouched.
pub fn redact_event(event: Event, keys: &RedactionKeys) -> Event {
    if keys.is_empty() {
        return event;
    }
    match event.payload {
        Some(ref payload) => {
            let redacted = redact_value(payload, keys);
            Event {
                payload: Some(redacted),
                ..event
            }
        }
        None => event,
    }
}

/// Produce a redacted copy of a JSON value
pub fn redact_value(value: &Value, keys: &RedactionKeys) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                let replaced = if keys.matches(key) {
                    Value::String(REDACTION_MARKER.to_string())
                } else {
                    redact_value(inner, keys)
                };
                out.insert(key.clone(), replaced);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_value(v, keys)).collect()),
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use serde_json::json;

    fn default_keys() -> RedactionKeys {
        RedactionKeys::parse("email,token,authorization,password")
    }

    #[test]
    fn test_parse_normalizes_keys() {
        let keys = RedactionKeys::parse(" Email, TOKEN ,,password ");
        assert_eq!(keys.to_vec(), vec!["email", "password", "token"]);
        assert!(keys.matches("EMAIL"));
        assert!(keys.matches("Token"));
        assert!(!keys.matches("username"));
    }

    #[test]
    fn test_nested_keys_are_redacted() {
        let payload = json!({
            "email": "a@b.com",
            "nested": {"password": "x", "safe": "ok"}
        });
        let redacted = redact_value(&payload, &default_keys());

        assert_eq!(redacted["email"], json!(REDACTION_MARKER));
        assert_eq!(redacted["nested"]["password"], json!(REDACTION_MARKER));
        assert_eq!(redacted["nested"]["safe"], json!("ok"));
    }

    #[test]
    fn test_arrays_are_walked_element_wise() {
        let payload = json!({
            "users": [
                {"Authorization": "Bearer abc", "id": 1},
                "token",
                [{"token": "t"}]
            ]
        });
        let redacted = redact_value(&payload, &default_keys());

        assert_eq!(redacted["users"][0]["Authorization"], json!(REDACTION_MARKER));
        assert_eq!(redacted["users"][0]["id"], json!(1));
        // a string element that happens to equal a key name is data, not a key
        assert_eq!(redacted["users"][1], json!("token"));
        assert_eq!(redacted["users"][2][0]["token"], json!(REDACTION_MARKER));
    }

    #[test]
    fn test_matching_key_replaces_whole_subtree() {
        let payload = json!({"token": {"access": "a", "refresh": "b"}});
        let redacted = redact_value(&payload, &default_keys());
        assert_eq!(redacted, json!({"token": REDACTION_MARKER}));
    }

    #[test]
    fn test_non_matching_payload_is_deep_equal() {
        let payload = json!({
            "screen": "checkout",
            "items": [{"sku": "A-1", "qty": 2}, null, true, 3.5],
            "meta": {"retry": false}
        });
        assert_eq!(redact_value(&payload, &default_keys()), payload);
    }

    #[test]
    fn test_event_without_payload_or_keys_is_unchanged() {
        let event = Event::new(1, Level::Info, "no.payload");
        assert_eq!(redact_event(event.clone(), &default_keys()), event);

        let with_payload = Event::new(1, Level::Info, "x").with_payload(json!({"email": "e"}));
        let untouched = redact_event(with_payload.clone(), &RedactionKeys::default());
        assert_eq!(untouched, with_payload);
    }

    #[test]
    fn test_redact_event_keeps_other_fields() {
        let mut event = Event::new(7, Level::Warn, "login").with_payload(json!({"password": "pw"}));
        event.flow_id = Some("flow-1".to_string());

        let redacted = redact_event(event, &default_keys());
        assert_eq!(redacted.timestamp_ms, 7);
        assert_eq!(redacted.flow_id.as_deref(), Some("flow-1"));
        assert_eq!(redacted.payload, Some(json!({"password": REDACTION_MARKER})));
    }
}
