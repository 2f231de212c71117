use thiserror::Error;

/// Failures from page extraction.
///
/// `CorruptDocument` and `PageRangeInvalid` are terminal: retrying cannot
/// help, and a corrupt document aborts the whole production.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    #[error("invalid page range {start}..={end} (document has {total} pages)")]
    PageRangeInvalid {
        start: usize,
        end: usize,
        total: usize,
    },

    #[error("extraction worker failed: {0}")]
    Pool(String),
}

/// Orchestration-level failures that move a production to `Failed`.
///
/// Per-segment and per-window problems never surface here; they are
/// recorded on the [`ProductionResult`](crate::production::ProductionResult)
/// and processing continues.
#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("document could not be opened: {0}")]
    DocumentOpen(#[from] ExtractError),
}
