//! Reconciliation of raw per-window boundary candidates.
//!
//! Turns the unordered candidate list from all windows into one sorted,
//! non-overlapping list covering `[0, total_pages)` with no gaps. This
//! is the only place that invariant is enforced; callers must not
//! mutate the result afterward.

use tracing::debug;

use prodsplit_core::{Boundary, DocumentType};

/// Confidence assigned to the synthetic boundary when no window
/// produced any signal. Deliberately below the 0.7 review threshold.
const NO_SIGNAL_CONFIDENCE: f64 = 0.5;

/// Merge overlapping candidates into the final boundary list.
///
/// Two overlapping or adjacent candidates describe the same document
/// when they share a non-`Other` type hint, or when the overlap exceeds
/// half of the shorter span. The two conditions compose with a plain OR
/// (hint match short-circuits), matching the behavior this pipeline has
/// always had; confidence does not participate in the decision.
pub fn reconcile(candidates: Vec<Boundary>, total_pages: usize) -> Vec<Boundary> {
    if total_pages == 0 {
        return Vec::new();
    }

    // Drop candidates outside the document and clamp stragglers.
    let mut candidates: Vec<Boundary> = candidates
        .into_iter()
        .filter(|c| c.start_page < total_pages)
        .map(|mut c| {
            c.end_page = c.end_page.min(total_pages - 1);
            c.detection_window = None;
            c
        })
        .collect();

    if candidates.is_empty() {
        debug!("no boundary candidates; producing one catch-all segment");
        return vec![Boundary {
            start_page: 0,
            end_page: total_pages - 1,
            confidence: NO_SIGNAL_CONFIDENCE,
            document_type_hint: DocumentType::Other,
            title: None,
            indicators: vec!["no boundary signals detected".to_string()],
            bates_range: None,
            detection_window: None,
        }];
    }

    candidates.sort_by_key(|c| (c.start_page, c.end_page));

    let mut result = Vec::new();
    let mut iter = candidates.into_iter();
    let mut current = iter.next().expect("candidates is non-empty");

    for next in iter {
        if next.start_page > current.end_page + 1 {
            // Gap: the current document runs until the next detected start.
            current.end_page = next.start_page - 1;
            result.push(current);
            current = next;
        } else if same_document(&current, &next) {
            current = merge(current, next);
        } else {
            // Different documents sharing pages: the later start wins the
            // contested pages.
            current.end_page = next.start_page - 1;
            result.push(current);
            current = next;
        }
    }
    result.push(current);

    // The first document starts at page 0 and the last runs to the end,
    // whether or not any window said so explicitly.
    if let Some(first) = result.first_mut() {
        first.start_page = 0;
    }
    if let Some(last) = result.last_mut() {
        last.end_page = total_pages - 1;
    }

    result
}

fn same_document(current: &Boundary, next: &Boundary) -> bool {
    if current.document_type_hint == next.document_type_hint
        && current.document_type_hint != DocumentType::Other
    {
        return true;
    }
    // next.start_page >= current.start_page after sorting.
    let overlap = current
        .end_page
        .min(next.end_page)
        .checked_sub(next.start_page)
        .map(|d| d + 1)
        .unwrap_or(0);
    let shorter = current.page_count().min(next.page_count());
    overlap as f64 > shorter as f64 * 0.5
}

fn merge(current: Boundary, next: Boundary) -> Boundary {
    let (stronger, weaker) = if next.confidence > current.confidence {
        (&next, &current)
    } else {
        (&current, &next)
    };

    let mut indicators = current.indicators.clone();
    for ind in &next.indicators {
        if !indicators.contains(ind) {
            indicators.push(ind.clone());
        }
    }

    Boundary {
        start_page: current.start_page.min(next.start_page),
        end_page: current.end_page.max(next.end_page),
        confidence: current.confidence.max(next.confidence),
        document_type_hint: stronger.document_type_hint,
        title: stronger.title.clone().or_else(|| weaker.title.clone()),
        indicators,
        bates_range: current.bates_range.clone().or(next.bates_range.clone()),
        detection_window: None,
    }
}
