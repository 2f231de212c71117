//! Per-segment processing: text extraction, type classification, title
//! and Bates-range derivation.
//!
//! Oversized segments are processed in fixed-size sections so downstream
//! consumers receive their content in parts. Every failure here stays
//! inside the segment: the caller gets a failed segment plus a message,
//! never an error that could abort the remaining segments.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use prodsplit_core::config::SegmentationConfig;
use prodsplit_core::{
    BatesRange, Boundary, DocumentType, ExtractError, ProcessingStrategy, ProductionMetadata,
    Segment, SegmentPart,
};
use prodsplit_extract::PageSource;
use prodsplit_llm::{BoundaryClassifier, ClassifyError};

/// How many characters of head/tail text the title and Bates heuristics
/// look at.
const HEURISTIC_CHARS: usize = 500;

/// Hints at or above this confidence skip the classification call.
const HINT_TRUST_THRESHOLD: f64 = 0.8;

#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),
}

/// A processed segment plus the error message when processing failed.
pub struct ProcessedSegment {
    pub segment: Segment,
    pub error: Option<String>,
}

pub struct SegmentProcessor<'a> {
    classifier: &'a BoundaryClassifier,
    pages: &'a dyn PageSource,
    config: &'a SegmentationConfig,
    metadata: &'a ProductionMetadata,
}

impl<'a> SegmentProcessor<'a> {
    pub fn new(
        classifier: &'a BoundaryClassifier,
        pages: &'a dyn PageSource,
        config: &'a SegmentationConfig,
        metadata: &'a ProductionMetadata,
    ) -> Self {
        Self {
            classifier,
            pages,
            config,
            metadata,
        }
    }

    /// Process one reconciled boundary into a segment. Never fails; a
    /// processing error yields `extraction_successful = false` and the
    /// message for the production's error list.
    pub async fn process(&self, index: usize, boundary: &Boundary) -> ProcessedSegment {
        let strategy = if boundary.page_count() > self.config.large_document_threshold {
            ProcessingStrategy::Chunked
        } else {
            ProcessingStrategy::Standard
        };

        let mut segment = Segment {
            id: Uuid::new_v4(),
            start_page: boundary.start_page,
            end_page: boundary.end_page,
            document_type: boundary.document_type_hint,
            title: boundary
                .title
                .clone()
                .unwrap_or_else(|| boundary.document_type_hint.humanize().to_string()),
            bates_range: boundary.bates_range.clone(),
            indicators: boundary.indicators.clone(),
            confidence_score: boundary.confidence,
            extraction_successful: false,
            processing_strategy: strategy,
            is_complete: true,
            total_parts: 1,
            text: None,
            parts: Vec::new(),
            metadata: self.metadata.clone(),
        };

        let outcome = match strategy {
            ProcessingStrategy::Standard => self.process_standard(boundary, &mut segment).await,
            ProcessingStrategy::Chunked => self.process_chunked(boundary, &mut segment).await,
        };

        match outcome {
            Ok(()) => {
                segment.extraction_successful = true;
                debug!(
                    segment = index,
                    pages = segment.page_count(),
                    document_type = ?segment.document_type,
                    "segment processed"
                );
                ProcessedSegment {
                    segment,
                    error: None,
                }
            }
            Err(e) => {
                warn!(segment = index, "segment processing failed: {e}");
                ProcessedSegment {
                    segment,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn process_standard(
        &self,
        boundary: &Boundary,
        segment: &mut Segment,
    ) -> Result<(), ProcessError> {
        let text = self
            .pages
            .extract_text(boundary.start_page, boundary.end_page)
            .await?;

        segment.document_type = self.resolve_type(boundary, &text).await?;
        segment.title = extract_title(&text, segment.document_type, boundary.title.as_deref());
        segment.bates_range = extract_bates(&text, &text).or_else(|| boundary.bates_range.clone());
        segment.text = Some(text);
        Ok(())
    }

    async fn process_chunked(
        &self,
        boundary: &Boundary,
        segment: &mut Segment,
    ) -> Result<(), ProcessError> {
        let section_size = self.config.window_size;
        let page_count = boundary.page_count();
        let total_parts = page_count.div_ceil(section_size);

        let first_text = self
            .pages
            .extract_text(
                boundary.start_page,
                (boundary.start_page + section_size - 1).min(boundary.end_page),
            )
            .await?;

        // One classification per logical document; sections inherit it.
        segment.document_type = self.resolve_type(boundary, &first_text).await?;
        segment.title =
            extract_title(&first_text, segment.document_type, boundary.title.as_deref());

        let mut parts = Vec::with_capacity(total_parts);
        let mut last_text = first_text.clone();
        for part_index in 0..total_parts {
            let start = boundary.start_page + part_index * section_size;
            let end = (start + section_size - 1).min(boundary.end_page);
            let text = if part_index == 0 {
                first_text.clone()
            } else {
                self.pages.extract_text(start, end).await?
            };
            last_text = text.clone();
            parts.push(SegmentPart {
                part_index,
                start_page: start,
                end_page: end,
                context: format!(
                    "{} (part {}/{}, pages {}-{})",
                    segment.title,
                    part_index + 1,
                    total_parts,
                    start,
                    end
                ),
                text,
            });
        }

        segment.bates_range =
            extract_bates(&first_text, &last_text).or_else(|| boundary.bates_range.clone());
        segment.total_parts = total_parts;
        segment.is_complete = false;
        segment.parts = parts;
        Ok(())
    }

    /// Use the boundary hint directly when it is specific and confident;
    /// otherwise ask the classifier with a text preview.
    async fn resolve_type(
        &self,
        boundary: &Boundary,
        text: &str,
    ) -> Result<DocumentType, ProcessError> {
        if boundary.document_type_hint != DocumentType::Other
            && boundary.confidence > HINT_TRUST_THRESHOLD
        {
            return Ok(boundary.document_type_hint);
        }
        let preview = truncate_chars(text, self.config.preview_chars);
        Ok(self.classifier.classify_segment(preview).await?)
    }
}

// ── Text heuristics ─────────────────────────────────────────────────

/// Derive a title from the first ~500 characters.
///
/// Ordered heuristics: a header-like first line, then an `RE:` /
/// `SUBJECT:` line, then the boundary's own title hint, then the
/// humanized type name.
fn extract_title(text: &str, doc_type: DocumentType, hint_title: Option<&str>) -> String {
    let head = truncate_chars(text, HEURISTIC_CHARS);

    if let Some(line) = head.lines().map(str::trim).find(|l| !l.is_empty()) {
        if looks_like_header(line) {
            return line.to_string();
        }
    }

    if let Some(caps) = subject_pattern().captures(head) {
        let subject = caps[1].trim();
        if !subject.is_empty() {
            return subject.to_string();
        }
    }

    hint_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| doc_type.humanize().to_string())
}

/// Headers are short, not sentence-like, and mostly uppercase.
fn looks_like_header(line: &str) -> bool {
    let char_count = line.chars().count();
    if !(3..=80).contains(&char_count) || line.ends_with('.') {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper * 10 >= letters.len() * 6
}

/// Find a Bates range: first stamp in the head text, last stamp in the
/// tail text. A single stamp yields a degenerate one-page range.
fn extract_bates(head_text: &str, tail_text: &str) -> Option<BatesRange> {
    let head = truncate_chars(head_text, HEURISTIC_CHARS);
    let tail = last_chars(tail_text, HEURISTIC_CHARS);

    let first = bates_pattern().find(head).map(|m| m.as_str().to_string());
    let last = bates_pattern()
        .find_iter(tail)
        .last()
        .map(|m| m.as_str().to_string());

    match (first, last) {
        (Some(first), Some(last)) => Some(BatesRange { first, last }),
        (Some(only), None) | (None, Some(only)) => Some(BatesRange {
            first: only.clone(),
            last: only,
        }),
        (None, None) => None,
    }
}

fn subject_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*(?:RE|SUBJECT)[ \t]*:[ \t]*(.+)$").expect("valid subject pattern")
    })
}

fn bates_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Production prefixes run 2-8 uppercase letters, stamps 4-8 digits.
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Z]{2,8}[-_ ]?\d{4,8}\b").expect("valid bates pattern")
    })
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn last_chars(s: &str, max_chars: usize) -> &str {
    let total = s.chars().count();
    if total <= max_chars {
        return s;
    }
    let skip = total - max_chars;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line_becomes_title() {
        let text = "DRIVER QUALIFICATION FILE\n\nName: John Smith\nCDL #: 12345";
        assert_eq!(
            extract_title(text, DocumentType::Other, None),
            "DRIVER QUALIFICATION FILE"
        );
    }

    #[test]
    fn subject_line_becomes_title() {
        let text = "From: claims@example.com\nTo: legal@example.com\nRE: Policy claim 4411-B\n\nDear counsel,";
        assert_eq!(
            extract_title(text, DocumentType::Correspondence, None),
            "Policy claim 4411-B"
        );
    }

    #[test]
    fn title_falls_back_to_hint_then_type_name() {
        let text = "just some lowercase prose that reads like a sentence and keeps going on.";
        assert_eq!(
            extract_title(text, DocumentType::MedicalRecord, Some("Exam notes")),
            "Exam notes"
        );
        assert_eq!(
            extract_title(text, DocumentType::MedicalRecord, None),
            "Medical Record"
        );
    }

    #[test]
    fn long_first_line_is_not_a_header() {
        let line = "A".repeat(120);
        let text = format!("{line}\nmore text");
        assert_eq!(extract_title(&text, DocumentType::Other, None), "Document");
    }

    #[test]
    fn bates_range_spans_head_and_tail() {
        let head = "Produced subject to protective order\nACME0001\n...";
        let tail = "...\nACME0042\nEnd of document";
        let range = extract_bates(head, tail).unwrap();
        assert_eq!(range.first, "ACME0001");
        assert_eq!(range.last, "ACME0042");
    }

    #[test]
    fn single_stamp_yields_degenerate_range() {
        let range = extract_bates("cover page ACME0007", "no stamp here").unwrap();
        assert_eq!(range.first, "ACME0007");
        assert_eq!(range.last, "ACME0007");
    }

    #[test]
    fn no_stamp_yields_none() {
        assert!(extract_bates("plain text", "more plain text").is_none());
    }

    #[test]
    fn bates_pattern_accepts_separators() {
        assert!(bates_pattern().is_match("DEF-000123"));
        assert!(bates_pattern().is_match("WXY_4521"));
        assert!(bates_pattern().is_match("PLTF 00991"));
        assert!(!bates_pattern().is_match("page 12"));
    }

    #[test]
    fn last_chars_keeps_tail() {
        assert_eq!(last_chars("abcdef", 3), "def");
        assert_eq!(last_chars("ab", 5), "ab");
    }
}
