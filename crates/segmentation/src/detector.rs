//! Sliding-window boundary detection.
//!
//! Walks fixed-size, overlapping windows across the document, asks the
//! classifier for new-document starts in each, and converts the typed
//! signals into raw boundary candidates. A window that fails or answers
//! with noise contributes zero candidates; only extraction failures are
//! fatal.

use tracing::{debug, warn};
use uuid::Uuid;

use prodsplit_core::{Boundary, ExtractError, SegmentationError};
use prodsplit_extract::PageSource;
use prodsplit_llm::{BoundaryClassifier, WindowSignal};

use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};

/// Compute the `[start, end)` detection windows for a document.
///
/// Fails with `InvalidConfiguration` before any extraction when the
/// overlap leaves a non-positive stride.
pub fn plan_windows(
    total_pages: usize,
    window_size: usize,
    window_overlap: usize,
) -> Result<Vec<(usize, usize)>, SegmentationError> {
    if window_size == 0 || window_overlap >= window_size {
        return Err(SegmentationError::InvalidConfiguration(format!(
            "window_overlap ({window_overlap}) must be smaller than window_size ({window_size})"
        )));
    }
    let stride = window_size - window_overlap;
    Ok((0..total_pages)
        .step_by(stride)
        .map(|start| (start, (start + window_size).min(total_pages)))
        .collect())
}

/// Result of the detection phase, before reconciliation.
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    /// Raw candidates with `detection_window` populated.
    pub candidates: Vec<Boundary>,
    pub windows_executed: usize,
    /// (window index, message) for windows that degraded to zero candidates.
    pub window_errors: Vec<(usize, String)>,
    /// True when the run stopped early via the cancel flag.
    pub cancelled: bool,
}

pub struct BoundaryDetector<'a> {
    classifier: &'a BoundaryClassifier,
    pages: &'a dyn PageSource,
}

impl<'a> BoundaryDetector<'a> {
    pub fn new(classifier: &'a BoundaryClassifier, pages: &'a dyn PageSource) -> Self {
        Self { classifier, pages }
    }

    /// Scan the planned windows sequentially. Classification failures
    /// degrade per window; an extraction failure aborts the production.
    pub async fn run(
        &self,
        windows: &[(usize, usize)],
        production_id: Uuid,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<DetectionOutcome, ExtractError> {
        let total_windows = windows.len();

        let mut outcome = DetectionOutcome::default();

        for (index, &(window_start, window_end)) in windows.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(window = index, "detection cancelled");
                outcome.cancelled = true;
                break;
            }

            let text = self.pages.extract_text(window_start, window_end - 1).await?;

            let candidates = match self
                .classifier
                .detect_window(&text, window_start, window_end)
                .await
            {
                Ok(signals) => signals_to_boundaries(signals, window_start, window_end),
                Err(e) => {
                    warn!(window = index, "window degraded to zero candidates: {e}");
                    outcome.window_errors.push((index, e.to_string()));
                    Vec::new()
                }
            };

            debug!(
                window = index,
                start = window_start,
                end = window_end,
                candidates = candidates.len(),
                "window scanned"
            );

            outcome.windows_executed += 1;
            sink.publish(ProgressEvent::WindowCompleted {
                production_id,
                window_index: index,
                total_windows,
                percent_complete: (index + 1) as f64 / total_windows as f64 * 100.0,
                candidates: candidates.len(),
            });
            outcome.candidates.extend(candidates);
        }

        Ok(outcome)
    }
}

/// Convert one window's signals into boundary candidates.
///
/// Each signal opens a boundary at its start page; the boundary closes
/// where the next signal begins, or at the window end for the last one.
/// Pages before the first signal belong to a document opened in an
/// earlier window and produce no candidate here.
fn signals_to_boundaries(
    signals: Vec<WindowSignal>,
    window_start: usize,
    window_end: usize,
) -> Vec<Boundary> {
    let mut signals: Vec<WindowSignal> = signals
        .into_iter()
        .filter(|s| {
            let in_window = s.start_page >= window_start && s.start_page < window_end;
            if !in_window {
                debug!(
                    start_page = s.start_page,
                    window_start, window_end, "dropping signal outside its window"
                );
            }
            in_window
        })
        .collect();
    signals.sort_by(|a, b| {
        a.start_page
            .cmp(&b.start_page)
            .then(b.confidence.total_cmp(&a.confidence))
    });
    // Duplicate starts within one window: keep the most confident.
    signals.dedup_by_key(|s| s.start_page);

    let starts: Vec<usize> = signals.iter().map(|s| s.start_page).collect();
    signals
        .into_iter()
        .enumerate()
        .map(|(i, s)| Boundary {
            start_page: s.start_page,
            end_page: starts.get(i + 1).map(|n| n - 1).unwrap_or(window_end - 1),
            confidence: s.confidence,
            document_type_hint: s.document_type_hint,
            title: s.title_hint,
            indicators: s.indicators,
            bates_range: None,
            detection_window: Some((window_start, window_end)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodsplit_core::DocumentType;

    fn signal(start_page: usize, confidence: f64, hint: DocumentType) -> WindowSignal {
        WindowSignal {
            start_page,
            confidence,
            document_type_hint: hint,
            title_hint: None,
            indicators: Vec::new(),
        }
    }

    #[test]
    fn plans_overlapping_windows() {
        let windows = plan_windows(20, 5, 1).unwrap();
        assert_eq!(windows, vec![(0, 5), (4, 9), (8, 13), (12, 17), (16, 20)]);
    }

    #[test]
    fn short_document_gets_one_window() {
        assert_eq!(plan_windows(3, 5, 1).unwrap(), vec![(0, 3)]);
    }

    #[test]
    fn empty_document_gets_no_windows() {
        assert!(plan_windows(0, 5, 1).unwrap().is_empty());
    }

    #[test]
    fn overlap_at_or_above_window_size_is_invalid() {
        assert!(matches!(
            plan_windows(20, 5, 5),
            Err(SegmentationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan_windows(20, 5, 7),
            Err(SegmentationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan_windows(20, 0, 0),
            Err(SegmentationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn zero_overlap_is_valid() {
        let windows = plan_windows(10, 5, 0).unwrap();
        assert_eq!(windows, vec![(0, 5), (5, 10)]);
    }

    #[test]
    fn signal_opens_boundary_closed_by_window_end() {
        let boundaries = signals_to_boundaries(
            vec![signal(1, 0.9, DocumentType::DriverQualificationFile)],
            0,
            5,
        );
        assert_eq!(boundaries.len(), 1);
        assert_eq!((boundaries[0].start_page, boundaries[0].end_page), (1, 4));
        assert_eq!(boundaries[0].detection_window, Some((0, 5)));
    }

    #[test]
    fn consecutive_signals_close_each_other() {
        let boundaries = signals_to_boundaries(
            vec![
                signal(12, 0.8, DocumentType::Invoice),
                signal(15, 0.85, DocumentType::Deposition),
            ],
            12,
            17,
        );
        assert_eq!(boundaries.len(), 2);
        assert_eq!((boundaries[0].start_page, boundaries[0].end_page), (12, 14));
        assert_eq!((boundaries[1].start_page, boundaries[1].end_page), (15, 16));
    }

    #[test]
    fn signals_outside_the_window_are_dropped() {
        let boundaries = signals_to_boundaries(
            vec![
                signal(2, 0.9, DocumentType::Invoice),
                signal(30, 0.9, DocumentType::Deposition),
            ],
            0,
            5,
        );
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].start_page, 2);
    }

    #[test]
    fn duplicate_starts_keep_the_most_confident_signal() {
        let boundaries = signals_to_boundaries(
            vec![
                signal(2, 0.4, DocumentType::Invoice),
                signal(2, 0.9, DocumentType::Deposition),
            ],
            0,
            5,
        );
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].document_type_hint, DocumentType::Deposition);
        assert_eq!(boundaries[0].confidence, 0.9);
    }

    #[test]
    fn no_signals_produce_no_candidates() {
        assert!(signals_to_boundaries(Vec::new(), 4, 9).is_empty());
    }
}
