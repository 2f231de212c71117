//! Domain types for discovery production segmentation.
//!
//! A *production* is one concatenated discovery PDF. Boundary detection
//! proposes split points, reconciliation merges them into a contiguous
//! list, and each final boundary becomes a [`Segment`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Document taxonomy ───────────────────────────────────────────────

/// Fixed document-type taxonomy for trucking-litigation discovery.
///
/// Classifier labels outside this set map to [`DocumentType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    DriverQualificationFile,
    DriverLog,
    Deposition,
    MedicalRecord,
    AccidentReport,
    MaintenanceRecord,
    EmploymentRecord,
    BillOfLading,
    Insurance,
    Correspondence,
    Invoice,
    Contract,
    CourtFiling,
    Photograph,
    Other,
}

impl DocumentType {
    /// Map a classifier label onto the taxonomy. Unrecognized labels
    /// (including casing/whitespace noise) become `Other`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "DRIVER_QUALIFICATION_FILE" => Self::DriverQualificationFile,
            "DRIVER_LOG" | "DRIVER_LOGS" | "HOS_LOG" => Self::DriverLog,
            "DEPOSITION" => Self::Deposition,
            "MEDICAL_RECORD" | "MEDICAL_RECORDS" => Self::MedicalRecord,
            "ACCIDENT_REPORT" | "POLICE_REPORT" | "CRASH_REPORT" => Self::AccidentReport,
            "MAINTENANCE_RECORD" | "MAINTENANCE_RECORDS" => Self::MaintenanceRecord,
            "EMPLOYMENT_RECORD" | "PERSONNEL_FILE" => Self::EmploymentRecord,
            "BILL_OF_LADING" => Self::BillOfLading,
            "INSURANCE" | "INSURANCE_POLICY" => Self::Insurance,
            "CORRESPONDENCE" | "EMAIL" | "LETTER" => Self::Correspondence,
            "INVOICE" => Self::Invoice,
            "CONTRACT" | "AGREEMENT" => Self::Contract,
            "COURT_FILING" | "PLEADING" => Self::CourtFiling,
            "PHOTOGRAPH" | "PHOTO" => Self::Photograph,
            _ => Self::Other,
        }
    }

    /// Human-readable name, used as a title fallback.
    pub fn humanize(&self) -> &'static str {
        match self {
            Self::DriverQualificationFile => "Driver Qualification File",
            Self::DriverLog => "Driver Log",
            Self::Deposition => "Deposition",
            Self::MedicalRecord => "Medical Record",
            Self::AccidentReport => "Accident Report",
            Self::MaintenanceRecord => "Maintenance Record",
            Self::EmploymentRecord => "Employment Record",
            Self::BillOfLading => "Bill of Lading",
            Self::Insurance => "Insurance",
            Self::Correspondence => "Correspondence",
            Self::Invoice => "Invoice",
            Self::Contract => "Contract",
            Self::CourtFiling => "Court Filing",
            Self::Photograph => "Photograph",
            Self::Other => "Document",
        }
    }
}

// ── Boundaries ──────────────────────────────────────────────────────

/// Bates stamp range marking the first and last stamped page of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatesRange {
    pub first: String,
    pub last: String,
}

/// A candidate or final split point.
///
/// Raw candidates carry the `detection_window` that produced them;
/// reconciled boundaries do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    /// First page of the logical document (0-indexed, inclusive).
    pub start_page: usize,
    /// Last page (0-indexed, inclusive). Always >= `start_page`.
    pub end_page: usize,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    pub document_type_hint: DocumentType,
    pub title: Option<String>,
    /// Short evidence strings explaining the split, in detection order.
    pub indicators: Vec<String>,
    pub bates_range: Option<BatesRange>,
    /// (window_start, window_end) of the detection window, raw candidates only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_window: Option<(usize, usize)>,
}

impl Boundary {
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }
}

// ── Segments ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStrategy {
    Standard,
    Chunked,
}

/// One section of a chunked segment, emitted as its own part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentPart {
    /// 0-based index within the parent segment.
    pub part_index: usize,
    pub start_page: usize,
    pub end_page: usize,
    /// Short context line identifying this part for downstream consumers.
    pub context: String,
    pub text: String,
}

/// A finalized, page-bounded logical document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub start_page: usize,
    pub end_page: usize,
    pub document_type: DocumentType,
    pub title: String,
    pub bates_range: Option<BatesRange>,
    pub indicators: Vec<String>,
    /// Copied from the boundary at creation; never updated afterward.
    pub confidence_score: f64,
    pub extraction_successful: bool,
    pub processing_strategy: ProcessingStrategy,
    /// False while a chunked segment's content arrives in parts.
    pub is_complete: bool,
    /// Number of sections for chunked segments; 1 for standard.
    pub total_parts: usize,
    /// Full text for standard segments; chunked segments carry `parts`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parts: Vec<SegmentPart>,
    pub metadata: ProductionMetadata,
}

impl Segment {
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }
}

// ── Production metadata ─────────────────────────────────────────────

/// Opaque pass-through metadata attached to every emitted segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionMetadata {
    pub batch_id: Option<String>,
    pub producing_party: Option<String>,
    pub production_date: Option<NaiveDate>,
    #[serde(default)]
    pub responsiveness_tags: Vec<String>,
    pub confidentiality: Option<String>,
}

// ── Production result ───────────────────────────────────────────────

/// Orchestration state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionPhase {
    Init,
    BoundaryDetection,
    SegmentProcessing,
    Done,
    Failed,
}

/// Where an error was recorded: one segment, one detection window, or
/// the production itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    Segment(usize),
    Window(usize),
    Fatal,
}

impl std::fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Segment(i) => write!(f, "segment {i}"),
            Self::Window(i) => write!(f, "window {i}"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionError {
    pub scope: ErrorScope,
    pub message: String,
}

/// The single structured artifact of a production run.
///
/// Created once per input PDF, populated incrementally by the
/// orchestrator, and immutable once `processing_completed` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionResult {
    pub production_id: Uuid,
    pub phase: ProductionPhase,
    pub total_pages: usize,
    /// Number of sliding windows executed during boundary detection.
    pub processing_windows: usize,
    pub segments_found: Vec<Segment>,
    pub errors: Vec<ProductionError>,
    /// Mean of all segment confidences; 0 when no segments exist.
    pub average_confidence: f64,
    pub processing_started: DateTime<Utc>,
    pub processing_completed: Option<DateTime<Utc>>,
}

impl ProductionResult {
    pub fn new() -> Self {
        Self {
            production_id: Uuid::new_v4(),
            phase: ProductionPhase::Init,
            total_pages: 0,
            processing_windows: 0,
            segments_found: Vec::new(),
            errors: Vec::new(),
            average_confidence: 0.0,
            processing_started: Utc::now(),
            processing_completed: None,
        }
    }

    /// Segments below the review threshold. Derived, never stored.
    pub fn low_confidence_boundaries(&self, threshold: f64) -> Vec<&Segment> {
        self.segments_found
            .iter()
            .filter(|s| s.confidence_score < threshold)
            .collect()
    }

    /// Arithmetic mean of segment confidences; 0 for an empty list.
    pub fn compute_average_confidence(&self) -> f64 {
        if self.segments_found.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.segments_found.iter().map(|s| s.confidence_score).sum();
        sum / self.segments_found.len() as f64
    }
}

impl Default for ProductionResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_label_maps_known_types() {
        assert_eq!(
            DocumentType::from_label("DRIVER_QUALIFICATION_FILE"),
            DocumentType::DriverQualificationFile
        );
        assert_eq!(DocumentType::from_label("deposition"), DocumentType::Deposition);
        assert_eq!(DocumentType::from_label("Police Report"), DocumentType::AccidentReport);
    }

    #[test]
    fn from_label_defaults_to_other() {
        assert_eq!(DocumentType::from_label("TAX_RETURN"), DocumentType::Other);
        assert_eq!(DocumentType::from_label(""), DocumentType::Other);
        assert_eq!(DocumentType::from_label("???"), DocumentType::Other);
    }

    #[test]
    fn average_confidence_empty_is_zero() {
        let result = ProductionResult::new();
        assert_eq!(result.compute_average_confidence(), 0.0);
    }

    #[test]
    fn error_scope_display() {
        assert_eq!(ErrorScope::Segment(3).to_string(), "segment 3");
        assert_eq!(ErrorScope::Fatal.to_string(), "Fatal");
    }
}
