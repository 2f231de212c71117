//! Discovery production segmentation.
//!
//! Splits one concatenated discovery PDF into classified, page-bounded
//! logical documents in two phases: sliding-window boundary detection
//! (with reconciliation of overlapping candidates), then per-segment
//! processing with failure isolation.

pub mod detector;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod reconciler;

pub use detector::{plan_windows, BoundaryDetector, DetectionOutcome};
pub use orchestrator::Orchestrator;
pub use progress::{CancelFlag, CollectingSink, LogSink, NoopSink, ProgressEvent, ProgressSink};
pub use reconciler::reconcile;
