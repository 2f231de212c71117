//! Progress events published during a production run.
//!
//! The contract is minimal pub/sub: an event name plus a structured
//! payload. [`ProgressSink`] implementations may forward to a channel,
//! a WebSocket broadcaster, or a log; publishing is fire-and-forget and
//! a misbehaving sink must swallow its own failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use uuid::Uuid;

/// Event payloads, tagged with the event name on serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    DetectionStarted {
        production_id: Uuid,
        total_pages: usize,
        total_windows: usize,
    },
    WindowCompleted {
        production_id: Uuid,
        window_index: usize,
        total_windows: usize,
        percent_complete: f64,
        candidates: usize,
    },
    DetectionCompleted {
        production_id: Uuid,
        windows_executed: usize,
        boundaries: usize,
    },
    SegmentProcessed {
        production_id: Uuid,
        segment_index: usize,
        total_segments: usize,
        percent_complete: f64,
        successful: bool,
    },
    ProductionCompleted {
        production_id: Uuid,
        segments: usize,
        errors: usize,
        average_confidence: f64,
    },
    ProductionFailed {
        production_id: Uuid,
        message: String,
    },
}

impl ProgressEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DetectionStarted { .. } => "detection_started",
            Self::WindowCompleted { .. } => "window_completed",
            Self::DetectionCompleted { .. } => "detection_completed",
            Self::SegmentProcessed { .. } => "segment_processed",
            Self::ProductionCompleted { .. } => "production_completed",
            Self::ProductionFailed { .. } => "production_failed",
        }
    }
}

/// Receives progress events. Implementations must not block for long
/// and must not propagate failures back into the production.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Discards all events.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn publish(&self, _event: ProgressEvent) {}
}

/// Logs each event at info level. Used by the CLI.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn publish(&self, event: ProgressEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(event = event.name(), "{json}"),
            Err(e) => tracing::debug!("unserializable progress event: {e}"),
        }
    }
}

/// Collects events in memory, for tests and for buffering consumers.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

impl ProgressSink for CollectingSink {
    fn publish(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Cooperative cancellation flag, checked between windows and between
/// segments. Cancelling mid-run still yields the partial result.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_event_tag() {
        let event = ProgressEvent::WindowCompleted {
            production_id: Uuid::nil(),
            window_index: 2,
            total_windows: 5,
            percent_complete: 40.0,
            candidates: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "window_completed");
        assert_eq!(json["window_index"], 2);
        assert_eq!(json["percent_complete"], 40.0);
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
