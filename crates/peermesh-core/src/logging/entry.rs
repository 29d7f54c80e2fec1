//! One line of a JSONL log file.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single log entry in JSONL format.
///
/// Entries are self-contained, so files from several peers can be
/// concatenated and sorted by `ts` to get one mesh-wide timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 timestamp with milliseconds (e.g., "2026-10-19T14:30:45.123Z")
    pub ts: String,

    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Instance name of the node that wrote the entry
    pub instance: String,

    /// Module path (e.g., "peermesh_core::mesh::node")
    pub target: String,

    /// Human-readable message
    pub msg: String,

    /// Remote peer the event concerns, lifted out of `fields`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,

    /// Remaining structured fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,

    /// Enclosing spans, root first, joined with " > "
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        level: impl Into<String>,
        instance: impl Into<String>,
        target: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: level.into(),
            instance: instance.into(),
            target: target.into(),
            msg: msg.into(),
            peer: None,
            fields: None,
            span: None,
        }
    }

    /// Attach structured fields.
    ///
    /// A string `peer` field is moved into [`LogEntry::peer`] so log
    /// tooling can filter on it directly.
    pub fn with_fields(mut self, fields: serde_json::Map<String, Value>) -> Self {
        let mut fields = fields;
        if let Some(Value::String(peer)) = fields.remove("peer") {
            self.peer = Some(peer);
        }
        if !fields.is_empty() {
            self.fields = Some(Value::Object(fields));
        }
        self
    }

    /// Attach the span path
    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    /// Serialize to a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::new("info", "love", "peermesh_core::mesh::node", "Role decided");

        let json = entry.to_json_line().unwrap();
        assert!(json.contains("\"level\":\"info\""));
        assert!(json.contains("\"instance\":\"love\""));
        assert!(json.contains("\"msg\":\"Role decided\""));
        assert!(!json.contains("\"fields\""));

        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_peer_field_is_lifted() {
        let fields = json!({"peer": "abc123", "recipients": 3});
        let entry = LogEntry::new("info", "joy", "peermesh_core", "Gossiped peer list")
            .with_fields(fields.as_object().cloned().unwrap());

        assert_eq!(entry.peer.as_deref(), Some("abc123"));
        assert_eq!(entry.fields, Some(json!({"recipients": 3})));
    }

    #[test]
    fn test_only_peer_field_leaves_no_fields() {
        let fields = json!({"peer": "abc123"});
        let entry = LogEntry::new("debug", "joy", "peermesh_core", "Dialing")
            .with_fields(fields.as_object().cloned().unwrap());
        assert!(entry.fields.is_none());
    }
}
