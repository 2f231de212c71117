//! Boundary-detection and type-classification calls.
//!
//! Responses are parsed into typed signals or degraded to an explicit
//! `NoSignal`; a partially-usable dynamic object is never returned.
//! Transient failures are retried with exponential backoff; what counts
//! as transient is decided by [`LlmError::is_transient`], not by the
//! caller inspecting error internals.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use prodsplit_core::config::{LlmConfig, OllamaConfig};
use prodsplit_core::DocumentType;

use crate::provider::{LlmError, LlmProvider, Message, Role};

/// Character budget for window text sent to the classifier.
const WINDOW_TEXT_BUDGET: usize = 8000;

const WINDOW_SYSTEM_PROMPT: &str = "\
You are analyzing a window of pages from a legal discovery production: one \
large PDF containing many unrelated documents concatenated together. \
Identify every page in this window where a NEW document begins. Look for \
letterheads, caption pages, form headers, signature blocks followed by a \
fresh header, restarting page numbers, and Bates-number discontinuities.\n\
Respond ONLY with a JSON array, one object per new-document start:\n\
[{\"start_page\": <absolute 0-indexed page>, \"confidence\": <0.0-1.0>, \
\"document_type_hint\": \"<TYPE>\", \"title_hint\": \"<title or null>\", \
\"indicators\": [\"<evidence>\", ...]}]\n\
TYPE must be one of: DRIVER_QUALIFICATION_FILE, DRIVER_LOG, DEPOSITION, \
MEDICAL_RECORD, ACCIDENT_REPORT, MAINTENANCE_RECORD, EMPLOYMENT_RECORD, \
BILL_OF_LADING, INSURANCE, CORRESPONDENCE, INVOICE, CONTRACT, COURT_FILING, \
PHOTOGRAPH, OTHER.\n\
If no new document starts in this window, respond with [].";

const SEGMENT_SYSTEM_PROMPT: &str = "\
You classify legal discovery documents. Given a text preview, respond with \
exactly one label from: DRIVER_QUALIFICATION_FILE, DRIVER_LOG, DEPOSITION, \
MEDICAL_RECORD, ACCIDENT_REPORT, MAINTENANCE_RECORD, EMPLOYMENT_RECORD, \
BILL_OF_LADING, INSURANCE, CORRESPONDENCE, INVOICE, CONTRACT, COURT_FILING, \
PHOTOGRAPH, OTHER. Respond with the label only, no explanation.";

/// A typed boundary signal parsed from one window's response.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSignal {
    /// Absolute 0-indexed page where a new document begins.
    pub start_page: usize,
    /// Clamped to [0, 1].
    pub confidence: f64,
    pub document_type_hint: DocumentType,
    pub title_hint: Option<String>,
    pub indicators: Vec<String>,
}

/// Wire form of a signal. Kept separate from [`WindowSignal`] so schema
/// validation happens in one place.
#[derive(Debug, Deserialize)]
struct RawSignal {
    start_page: usize,
    confidence: f64,
    #[serde(default)]
    document_type_hint: Option<String>,
    #[serde(default)]
    title_hint: Option<String>,
    #[serde(default)]
    indicators: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// The service answered but the response carried no usable signal.
    #[error("no usable signal: {0}")]
    NoSignal(String),
}

// ── Retry policy ────────────────────────────────────────────────────

/// Exponential backoff for transient classification failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.factor.pow(attempt)
    }
}

// ── Classifier ──────────────────────────────────────────────────────

/// Wraps an [`LlmProvider`] with the segmentation prompts, typed
/// response parsing, and the application-level retry loop.
pub struct BoundaryClassifier {
    provider: Box<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl BoundaryClassifier {
    pub fn new(provider: Box<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build from config, creating the appropriate provider.
    pub fn from_config(
        llm_config: &LlmConfig,
        ollama_config: &OllamaConfig,
    ) -> Result<Self, LlmError> {
        let provider = crate::providers::create_provider(llm_config, ollama_config)?;
        Ok(Self::new(provider, llm_config.temperature, llm_config.max_tokens))
    }

    /// Ask for new-document starts within one window.
    ///
    /// Returns the typed signal list (possibly empty), `NoSignal` for a
    /// malformed response, or the last transient error once retries are
    /// exhausted. The caller decides how to degrade.
    pub async fn detect_window(
        &self,
        window_text: &str,
        window_start: usize,
        window_end: usize,
    ) -> Result<Vec<WindowSignal>, ClassifyError> {
        let user_prompt = format!(
            "Window covers absolute pages {} through {} (0-indexed). Page offset: {}.\n\n{}",
            window_start,
            window_end.saturating_sub(1),
            window_start,
            truncate_chars(window_text, WINDOW_TEXT_BUDGET),
        );

        let response = self
            .complete_with_retry(WINDOW_SYSTEM_PROMPT, &user_prompt)
            .await?;
        debug!(window_start, "classifier response: {}", response);

        parse_signals(&response)
    }

    /// Classify one segment's type from a text preview. Unrecognized
    /// labels map to `Other` rather than erroring.
    pub async fn classify_segment(&self, preview: &str) -> Result<DocumentType, ClassifyError> {
        let response = self
            .complete_with_retry(SEGMENT_SYSTEM_PROMPT, preview)
            .await?;
        Ok(DocumentType::from_label(response.trim()))
    }

    async fn complete_with_retry(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, ClassifyError> {
        let mut attempt = 0;
        loop {
            let messages = vec![
                Message {
                    role: Role::System,
                    content: system.to_string(),
                },
                Message {
                    role: Role::User,
                    content: user.to_string(),
                },
            ];
            match self
                .provider
                .complete(messages, self.temperature, self.max_tokens)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient classification failure, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse a window response into typed signals.
///
/// An empty array is a valid "no new documents here" answer. Anything
/// that does not deserialize as a signal array is `NoSignal`.
pub fn parse_signals(response: &str) -> Result<Vec<WindowSignal>, ClassifyError> {
    let json_str = extract_json(response);
    let raw: Vec<RawSignal> = serde_json::from_str(json_str)
        .map_err(|e| ClassifyError::NoSignal(format!("unparseable response: {e}")))?;

    Ok(raw
        .into_iter()
        .map(|r| WindowSignal {
            start_page: r.start_page,
            confidence: r.confidence.clamp(0.0, 1.0),
            document_type_hint: r
                .document_type_hint
                .as_deref()
                .map(DocumentType::from_label)
                .unwrap_or(DocumentType::Other),
            title_hint: r.title_hint.filter(|t| !t.trim().is_empty()),
            indicators: r.indicators,
        })
        .collect())
}

/// Extract JSON from an LLM response, handling markdown code blocks.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        let json_start = start + 3;
        // Skip past any language identifier on the same line
        let after_tick = &trimmed[json_start..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            return after_tick[content_start..content_start + end].trim();
        }
    }

    // Try a raw JSON array or object embedded in prose
    if let Some(start) = trimmed.find('[') {
        if let Some(end) = trimmed.rfind(']') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}

/// Truncate on a char boundary without allocating when under budget.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_raw_array() {
        let input = r#"[{"start_page": 3}]"#;
        assert_eq!(extract_json(input), r#"[{"start_page": 3}]"#);
    }

    #[test]
    fn extract_json_code_block() {
        let input = "Here you go:\n```json\n[{\"start_page\": 0}]\n```\nDone.";
        assert_eq!(extract_json(input), r#"[{"start_page": 0}]"#);
    }

    #[test]
    fn extract_json_array_with_prose() {
        let input = "The boundaries are: [{\"start_page\": 5}] as requested.";
        assert_eq!(extract_json(input), r#"[{"start_page": 5}]"#);
    }

    #[test]
    fn parse_signals_full_schema() {
        let response = r#"[
            {"start_page": 1, "confidence": 0.9,
             "document_type_hint": "DRIVER_QUALIFICATION_FILE",
             "title_hint": "DQ File - J. Smith",
             "indicators": ["letterhead", "form header"]},
            {"start_page": 15, "confidence": 0.85,
             "document_type_hint": "DEPOSITION",
             "title_hint": null, "indicators": []}
        ]"#;
        let signals = parse_signals(response).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].start_page, 1);
        assert_eq!(
            signals[0].document_type_hint,
            DocumentType::DriverQualificationFile
        );
        assert_eq!(signals[0].indicators.len(), 2);
        assert_eq!(signals[1].document_type_hint, DocumentType::Deposition);
        assert_eq!(signals[1].title_hint, None);
    }

    #[test]
    fn parse_signals_empty_array_is_ok() {
        assert_eq!(parse_signals("[]").unwrap(), vec![]);
    }

    #[test]
    fn parse_signals_clamps_confidence() {
        let signals =
            parse_signals(r#"[{"start_page": 0, "confidence": 1.7}]"#).unwrap();
        assert_eq!(signals[0].confidence, 1.0);
    }

    #[test]
    fn parse_signals_unknown_type_is_other() {
        let signals = parse_signals(
            r#"[{"start_page": 0, "confidence": 0.5, "document_type_hint": "RECIPE"}]"#,
        )
        .unwrap();
        assert_eq!(signals[0].document_type_hint, DocumentType::Other);
    }

    #[test]
    fn parse_signals_prose_is_no_signal() {
        let err = parse_signals("I could not find any boundaries, sorry!").unwrap_err();
        assert!(matches!(err, ClassifyError::NoSignal(_)));
    }

    #[test]
    fn retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    // ── Retry behavior against a scripted provider ────────────────

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    struct ScriptedProvider {
        calls: Arc<AtomicUsize>,
        responses: Vec<Result<String, u16>>,
    }

    #[async_trait]
    impl crate::provider::LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(i).cloned().unwrap_or(Err(500)) {
                Ok(s) => Ok(s),
                Err(status) => Err(LlmError::Api {
                    status,
                    body: "scripted failure".into(),
                }),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls: calls.clone(),
            responses: vec![Err(503), Err(503), Ok("[]".into())],
        };
        let classifier = BoundaryClassifier::new(Box::new(provider), 0.1, 256);
        let signals = classifier.detect_window("text", 0, 5).await.unwrap();
        assert!(signals.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls: calls.clone(),
            responses: vec![Err(503), Err(503), Err(503), Err(503)],
        };
        let classifier = BoundaryClassifier::new(Box::new(provider), 0.1, 256);
        let err = classifier.detect_window("text", 0, 5).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Llm(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            calls: calls.clone(),
            responses: vec![Err(401)],
        };
        let classifier = BoundaryClassifier::new(Box::new(provider), 0.1, 256);
        let err = classifier.detect_window("text", 0, 5).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Llm(LlmError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn classify_segment_maps_label() {
        let provider = ScriptedProvider {
            calls: Arc::new(AtomicUsize::new(0)),
            responses: vec![Ok("DEPOSITION\n".into())],
        };
        let classifier = BoundaryClassifier::new(Box::new(provider), 0.1, 256);
        let ty = classifier.classify_segment("Q. Please state your name.").await.unwrap();
        assert_eq!(ty, DocumentType::Deposition);
    }
}
