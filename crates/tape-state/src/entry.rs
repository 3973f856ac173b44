//! Tape entry model.
//!
//! A [`LogEntry`] is the immutable unit of the tape. Its wire shape is the
//! contract every other component relies on:
//!
//! ```text
//! { "id": 7, "kind": "anchor", "payload": { "name": "...", "state": {...} }, "meta": {} }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object used for payloads, anchor state, and metadata.
pub type Object = Map<String, Value>;

/// Discriminator for entry payloads.
///
/// The set is open: kinds this build does not know about are kept verbatim
/// in [`EntryKind::Other`] so they survive a read/append cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    Message,
    ToolCall,
    ToolResult,
    Anchor,
    Event,
    System,
    Other(String),
}

impl EntryKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Message => "message",
            EntryKind::ToolCall => "tool_call",
            EntryKind::ToolResult => "tool_result",
            EntryKind::Anchor => "anchor",
            EntryKind::Event => "event",
            EntryKind::System => "system",
            EntryKind::Other(kind) => kind,
        }
    }
}

impl From<String> for EntryKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "message" => EntryKind::Message,
            "tool_call" => EntryKind::ToolCall,
            "tool_result" => EntryKind::ToolResult,
            "anchor" => EntryKind::Anchor,
            "event" => EntryKind::Event,
            "system" => EntryKind::System,
            _ => EntryKind::Other(kind),
        }
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry as stored on the tape, with its store-assigned sequence id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence id, unique within the tape
    pub id: u64,
    pub kind: EntryKind,
    pub payload: Object,
    #[serde(default)]
    pub meta: Object,
}

impl LogEntry {
    /// Attach a sequence id to an entry that has not been stored yet.
    pub fn from_new(id: u64, entry: NewEntry) -> Self {
        Self {
            id,
            kind: entry.kind,
            payload: entry.payload,
            meta: entry.meta,
        }
    }

    pub fn is_anchor(&self) -> bool {
        self.kind == EntryKind::Anchor
    }

    /// Anchor name, if this entry is an anchor with a string `name`.
    pub fn anchor_name(&self) -> Option<&str> {
        if !self.is_anchor() {
            return None;
        }
        self.payload.get("name").and_then(Value::as_str)
    }

    /// Anchor state map, if present and an object.
    pub fn anchor_state(&self) -> Option<&Object> {
        if !self.is_anchor() {
            return None;
        }
        self.payload.get("state").and_then(Value::as_object)
    }

    /// Integer `state.version` of an anchor.
    pub fn anchor_version(&self) -> Option<u64> {
        self.anchor_state()
            .and_then(|state| state.get("version"))
            .and_then(Value::as_u64)
    }

    /// Event name, if this entry is an event with a string `name`.
    pub fn event_name(&self) -> Option<&str> {
        if self.kind != EntryKind::Event {
            return None;
        }
        self.payload.get("name").and_then(Value::as_str)
    }

    /// Event data map, if present and an object.
    pub fn event_data(&self) -> Option<&Object> {
        if self.kind != EntryKind::Event {
            return None;
        }
        self.payload.get("data").and_then(Value::as_object)
    }
}

/// An entry before the store has assigned its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub payload: Object,
    pub meta: Object,
}

impl NewEntry {
    pub fn new(kind: EntryKind, payload: Object) -> Self {
        Self {
            kind,
            payload,
            meta: Object::new(),
        }
    }

    /// Anchor marking a named boundary, carrying a small state map.
    pub fn anchor(name: impl Into<String>, state: Object) -> Self {
        let mut payload = Object::new();
        payload.insert("name".into(), Value::String(name.into()));
        payload.insert("state".into(), Value::Object(state));
        Self::new(EntryKind::Anchor, payload)
    }

    pub fn event(name: impl Into<String>, data: Object) -> Self {
        let mut payload = Object::new();
        payload.insert("name".into(), Value::String(name.into()));
        payload.insert("data".into(), Value::Object(data));
        Self::new(EntryKind::Event, payload)
    }

    pub fn message(role: impl Into<String>, content: impl Into<String>) -> Self {
        let mut payload = Object::new();
        payload.insert("role".into(), Value::String(role.into()));
        payload.insert("content".into(), Value::String(content.into()));
        Self::new(EntryKind::Message, payload)
    }

    pub fn system(content: impl Into<String>) -> Self {
        let mut payload = Object::new();
        payload.insert("content".into(), Value::String(content.into()));
        Self::new(EntryKind::System, payload)
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        let mut payload = Object::new();
        payload.insert("name".into(), Value::String(name.into()));
        payload.insert("arguments".into(), arguments);
        Self::new(EntryKind::ToolCall, payload)
    }

    pub fn tool_result(name: impl Into<String>, result: Value) -> Self {
        let mut payload = Object::new();
        payload.insert("name".into(), Value::String(name.into()));
        payload.insert("result".into(), result);
        Self::new(EntryKind::ToolResult, payload)
    }

    /// Add a metadata key.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_kinds_serialize_as_snake_case() {
        let entry = LogEntry::from_new(3, NewEntry::tool_call("fs.read", json!({"path": "a"})));
        let line = serde_json::to_value(&entry).unwrap();
        assert_eq!(line["kind"], "tool_call");
        assert_eq!(line["id"], 3);
    }

    #[test]
    fn unknown_kind_round_trips_losslessly() {
        let raw = r#"{"id":9,"kind":"handoff_v2","payload":{"x":1},"meta":{"k":"v"}}"#;
        let entry: LogEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.kind, EntryKind::Other("handoff_v2".into()));

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[test]
    fn missing_meta_defaults_to_empty() {
        let raw = r#"{"id":1,"kind":"message","payload":{"role":"user","content":"hi"}}"#;
        let entry: LogEntry = serde_json::from_str(raw).unwrap();
        assert!(entry.meta.is_empty());
    }

    #[test]
    fn anchor_accessors() {
        let mut state = Object::new();
        state.insert("version".into(), json!(4));
        let entry = LogEntry::from_new(1, NewEntry::anchor("memory/seal", state));

        assert_eq!(entry.anchor_name(), Some("memory/seal"));
        assert_eq!(entry.anchor_version(), Some(4));
        assert_eq!(entry.event_name(), None);
    }

    #[test]
    fn non_integer_version_is_ignored() {
        let mut state = Object::new();
        state.insert("version".into(), json!("4"));
        let entry = LogEntry::from_new(1, NewEntry::anchor("memory/seal", state));
        assert_eq!(entry.anchor_version(), None);
    }

    #[test]
    fn event_accessors() {
        let mut data = Object::new();
        data.insert("content".into(), json!("hello"));
        let entry = LogEntry::from_new(2, NewEntry::event("memory.long_term", data));

        assert_eq!(entry.event_name(), Some("memory.long_term"));
        assert_eq!(entry.event_data().unwrap()["content"], "hello");
        assert_eq!(entry.anchor_name(), None);
    }
}
