//! Observability subsystem for aerodoc
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Atomic counters
//!
//! Observability is read-only: it never changes the outcome of an
//! operation, and a failing writer is ignored.
//!
//! # Usage
//!
//! ```ignore
//! use aerodoc::observability::{log_event_with_fields, Event, Severity};
//!
//! log_event_with_fields(Severity::Info, Event::DocCreated, &[("key", "User-1")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event without fields.
///
/// Fatal events are always logged at FATAL regardless of `severity`.
pub fn log_event(severity: Severity, event: Event) {
    log_event_with_fields(severity, event, &[]);
}

/// Log a lifecycle event with fields.
pub fn log_event_with_fields(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        severity
    };
    Logger::log(severity, event.as_str(), fields);
}
