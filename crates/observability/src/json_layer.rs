//! JSONL sink: one [`LogEntry`] object per event.

use crate::fields::EventFields;
use crate::writer::append_line;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Serialized form of one event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// UTC, RFC 3339 with microseconds.
    pub timestamp: String,
    pub level: &'static str,
    pub service: String,
    pub pid: u32,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    /// Innermost span, when the event happened inside one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

pub struct JsonLayer<W> {
    service_name: String,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service_name: String, make_writer: W) -> Self {
        Self {
            service_name,
            make_writer,
        }
    }

    fn entry<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let collected = EventFields::of(event);
        LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            level: metadata.level().as_str(),
            service: self.service_name.clone(),
            pid: std::process::id(),
            target: metadata.target().to_string(),
            message: collected.message.unwrap_or_default(),
            fields: collected.fields,
            span: ctx.event_span(event).map(|span| span.name().to_string()),
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if let Ok(json) = serde_json::to_string(&self.entry(event, &ctx)) {
            let _ = append_line(self.make_writer.make_writer(), &json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WriterFactory;
    use tempfile::tempdir;
    use tracing_subscriber::layer::SubscriberExt;

    fn events(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_entry_omits_empty_fields_and_span() {
        let entry = LogEntry {
            timestamp: "2024-01-15T10:30:00.000000Z".to_string(),
            level: "INFO",
            service: "talkbridge".to_string(),
            pid: 12345,
            target: "talk_auth::session".to_string(),
            message: "session persisted".to_string(),
            fields: BTreeMap::new(),
            span: None,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["service"], "talkbridge");
        assert_eq!(value["pid"], 12345);
        assert!(value.get("fields").is_none());
        assert!(value.get("span").is_none());
    }

    #[test]
    fn test_layer_writes_one_object_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let layer = JsonLayer::new("test".to_string(), WriterFactory::open(&path).unwrap());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(attempt = 3_u64, "registration pending");
            let span = tracing::info_span!("attempt");
            let _entered = span.enter();
            tracing::info!("device registered");
        });

        let events = events(&path);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["level"], "WARN");
        assert_eq!(events[0]["message"], "registration pending");
        assert_eq!(events[0]["fields"]["attempt"], 3);
        assert_eq!(events[0]["pid"], std::process::id());
        assert_eq!(events[1]["span"], "attempt");
    }
}
