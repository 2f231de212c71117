//! PDF page extraction behind a bounded worker pool.
//!
//! CPU-bound parsing runs on [`PagePool`] workers so a slow parse never
//! blocks the orchestration loop. [`PageSource`] is the seam consumed by
//! boundary detection and segment processing.

mod pdf;
mod pool;
mod source;

pub use pool::PagePool;
pub use source::{PageSource, PdfPageSource};
