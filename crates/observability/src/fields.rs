//! Event field collection shared by the file layers.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::Event;

/// An event's `message` and its remaining fields, in key order.
#[derive(Debug, Default)]
pub(crate) struct EventFields {
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, Value>,
}

impl EventFields {
    pub(crate) fn of(event: &Event<'_>) -> Self {
        let mut collected = Self::default();
        event.record(&mut collected);
        collected
    }

    /// Fields as `(key, text)` pairs; strings are not quoted.
    pub(crate) fn rendered(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }

    fn put(&mut self, field: &Field, value: Value) {
        match (field.name(), value) {
            ("message", Value::String(text)) => self.message = Some(text),
            (name, value) => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Keeps the fields of every event it sees.
    struct Capture(Arc<Mutex<Vec<EventFields>>>);

    impl<S: tracing::Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(EventFields::of(event));
        }
    }

    fn capture(emit: impl FnOnce()) -> EventFields {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(seen.clone()));
        tracing::subscriber::with_default(subscriber, emit);
        let mut seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        seen.remove(0)
    }

    #[test]
    fn test_message_is_split_from_fields() {
        let collected = capture(|| {
            tracing::info!(chat_id = 42_i64, delivered = true, "message delivered");
        });

        assert_eq!(collected.message.as_deref(), Some("message delivered"));
        assert_eq!(collected.fields["chat_id"], 42);
        assert_eq!(collected.fields["delivered"], true);
    }

    #[test]
    fn test_rendered_fields_are_unquoted_and_sorted() {
        let collected = capture(|| {
            let reason = "offline";
            tracing::error!(reason = %reason, attempt = 2_u64, "send failed");
        });

        assert_eq!(
            collected.rendered(),
            vec![
                ("attempt".to_string(), "2".to_string()),
                ("reason".to_string(), "offline".to_string()),
            ]
        );
    }
}
