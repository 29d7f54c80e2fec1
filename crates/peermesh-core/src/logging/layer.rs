//! Tracing layer that mirrors every event into a JSONL file.

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::entry::LogEntry;
use super::writer::InstanceLogWriter;

/// A tracing Layer that writes events to `<logs_dir>/raw/<date>_<instance>.jsonl`.
///
/// Each node uses its own instance name, so several peers started side by
/// side never share a file.
#[derive(Clone)]
pub struct JsonlLayer {
    writer: Arc<InstanceLogWriter>,
}

impl JsonlLayer {
    /// Create a layer for `instance`, creating `logs_dir/raw` if needed
    pub fn new(logs_dir: impl AsRef<Path>, instance: impl Into<String>) -> std::io::Result<Self> {
        let writer = InstanceLogWriter::new(logs_dir, instance)?;
        Ok(Self {
            writer: Arc::new(writer),
        })
    }

    /// Path to the log file
    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }

    /// Instance name
    pub fn instance(&self) -> &str {
        self.writer.instance()
    }
}

impl<S> Layer<S> for JsonlLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = metadata.level().as_str().to_lowercase();

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut entry = LogEntry::new(
            level,
            self.writer.instance(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        )
        .with_fields(visitor.fields);

        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                entry = entry.with_span(spans.join(" > "));
            }
        }

        // A failed write must not take the node down with it
        let _ = self.writer.write(&entry);
    }
}

/// Collects an event's message and fields as JSON values
#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogEntry;
    use tempfile::TempDir;
    use tracing_subscriber::prelude::*;

    fn read_log(layer_path: &std::path::Path) -> Vec<LogEntry> {
        std::fs::read_to_string(layer_path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_layer_captures_events() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path().join("logs");

        let layer = JsonlLayer::new(&logs_dir, "test").unwrap();
        let log_path = layer.log_path().to_path_buf();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Node started");
            tracing::warn!(peer = %"abc", recipients = 2u64, "Failed to send envelope");
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"level\":\"info\""));

        let entries = read_log(&log_path);
        let warn = entries.iter().find(|e| e.level == "warn").unwrap();
        assert_eq!(warn.msg, "Failed to send envelope");
        assert_eq!(warn.peer.as_deref(), Some("abc"));
        assert_eq!(warn.fields, Some(serde_json::json!({"recipients": 2})));
    }

    #[test]
    fn test_layer_records_span_path() {
        let temp = TempDir::new().unwrap();
        let layer = JsonlLayer::new(temp.path(), "spans").unwrap();
        let log_path = layer.log_path().to_path_buf();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let outer = tracing::info_span!("serve");
            let _outer = outer.enter();
            let inner = tracing::info_span!("command");
            let _inner = inner.enter();
            tracing::info!("Connecting");
        });

        let entries = read_log(&log_path);
        assert_eq!(entries[0].span.as_deref(), Some("serve > command"));
    }
}
