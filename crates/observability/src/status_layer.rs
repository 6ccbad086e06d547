//! Human-readable status log.
//!
//! Each event becomes one line of the form `[YYYY-MM-DD HH:MM:SS] message`,
//! followed by any structured fields as `key=value` pairs. Timestamps use
//! local time.

use crate::fields::EventFields;
use crate::writer::append_line;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Timestamp layout used for status lines.
pub const STATUS_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layer that appends plain status lines.
pub struct StatusLineLayer<W> {
    make_writer: W,
}

impl<W> StatusLineLayer<W> {
    pub fn new(make_writer: W) -> Self {
        Self { make_writer }
    }
}

/// Render a status line (without trailing newline).
pub fn format_status_line(
    at: &DateTime<Local>,
    message: &str,
    fields: &[(String, String)],
) -> String {
    let mut line = format!("[{}] {}", at.format(STATUS_TIMESTAMP_FORMAT), message);
    for (key, value) in fields {
        let _ = write!(line, " {}={}", key, value);
    }
    line
}

impl<S, W> Layer<S> for StatusLineLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let collected = EventFields::of(event);
        let line = format_status_line(
            &Local::now(),
            collected.message.as_deref().unwrap_or_default(),
            &collected.rendered(),
        );
        let _ = append_line(self.make_writer.make_writer(), &line);
    }
}
