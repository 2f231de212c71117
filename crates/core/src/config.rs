use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub segmentation: SegmentationConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            llm: LlmConfig::from_env(),
            ollama: OllamaConfig::from_env(),
            segmentation: SegmentationConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  llm:          provider={}", self.llm.provider);
        tracing::info!("  ollama:       url={}", self.ollama.url);
        tracing::info!(
            "  segmentation: window={}/overlap={}, threshold={}, chunk_at={} pages, pool={}",
            self.segmentation.window_size,
            self.segmentation.window_overlap,
            self.segmentation.confidence_threshold,
            self.segmentation.large_document_threshold,
            self.segmentation.extract_pool_size,
        );
    }
}

// ── LLM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which backend to use: "anthropic", "openai", or "ollama".
    pub provider: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// TCP connect timeout for classification calls, in seconds.
    pub connect_timeout_secs: u64,
    /// Total request timeout for classification calls, in seconds.
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    fn from_env() -> Self {
        Self {
            provider: env_or("LLM_PROVIDER", "anthropic"),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            anthropic_model: env_or("ANTHROPIC_MODEL", "claude-3-5-haiku-latest"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: env_opt("OPENAI_BASE_URL"),
            temperature: env_f32("LLM_TEMPERATURE", 0.1),
            max_tokens: env_u64("LLM_MAX_TOKENS", 2048) as u32,
            connect_timeout_secs: env_u64("LLM_CONNECT_TIMEOUT_SECS", 10),
            request_timeout_secs: env_u64("LLM_REQUEST_TIMEOUT_SECS", 30),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            "openai" => self.openai_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    fn from_env() -> Self {
        Self {
            url: env_or("OLLAMA_URL", "http://localhost:11434"),
            model: env_or("OLLAMA_MODEL", "llama3.1"),
        }
    }
}

// ── Segmentation ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Pages per detection window.
    pub window_size: usize,
    /// Pages shared between adjacent windows.
    pub window_overlap: usize,
    /// Boundaries below this confidence are flagged for review.
    pub confidence_threshold: f64,
    /// Segments larger than this many pages are processed in sections.
    pub large_document_threshold: usize,
    /// Worker threads for CPU-bound PDF parsing.
    pub extract_pool_size: usize,
    /// Characters of segment text sent to the classifier as a preview.
    pub preview_chars: usize,
}

impl SegmentationConfig {
    fn from_env() -> Self {
        Self {
            window_size: env_usize("SEG_WINDOW_SIZE", 5),
            window_overlap: env_usize("SEG_WINDOW_OVERLAP", 1),
            confidence_threshold: env_f64("SEG_CONFIDENCE_THRESHOLD", 0.7),
            large_document_threshold: env_usize("SEG_LARGE_DOC_THRESHOLD", 25),
            extract_pool_size: env_usize("SEG_EXTRACT_POOL_SIZE", 4),
            preview_chars: env_usize("SEG_PREVIEW_CHARS", 1500),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            window_overlap: 1,
            confidence_threshold: 0.7,
            large_document_threshold: 25,
            extract_pool_size: 4,
            preview_chars: 1500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmentation_defaults() {
        let cfg = SegmentationConfig::default();
        assert_eq!(cfg.window_size, 5);
        assert_eq!(cfg.window_overlap, 1);
        assert_eq!(cfg.confidence_threshold, 0.7);
        assert_eq!(cfg.large_document_threshold, 25);
    }
}
