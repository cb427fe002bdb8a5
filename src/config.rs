//! Configuration for the study service.
//!
//! Every knob lives in [`StudyConfig`], built via [`StudyConfigBuilder`] and
//! handed to [`crate::generate::StudyService`] at construction. API keys and
//! storage locations never live in process-wide state; the binary maps its
//! flags and environment variables onto the builder.

use crate::error::StudyError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the study service.
///
/// # Example
/// ```rust
/// use smartstudy_ai::StudyConfig;
///
/// let config = StudyConfig::builder()
///     .model("gemini-2.5-flash")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StudyConfig {
    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Study material benefits from a little variety in phrasing, but the
    /// JSON contract gets shakier as temperature rises.
    pub temperature: f32,

    /// Output-token cap per call. If None, each task uses
    /// [`crate::task::TaskKind::default_max_tokens`].
    pub max_tokens: Option<usize>,

    /// Retries on a failed or timed-out model call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Bound on a single model call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Extra model calls when a reply falls back during extraction. Default: 1.
    pub fallback_retries: u32,

    /// Largest accepted text input in bytes. Default: 100 000.
    pub max_text_bytes: usize,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_file_bytes: usize,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Where notes and uploads are kept. Default: in memory.
    pub storage: StorageBackend,

    /// Address the HTTP server binds to. Default: 0.0.0.0:8080.
    pub bind_addr: SocketAddr,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            fallback_retries: 1,
            max_text_bytes: 100_000,
            max_file_bytes: 10 * 1024 * 1024,
            system_prompt: None,
            storage: StorageBackend::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl fmt::Debug for StudyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("fallback_retries", &self.fallback_retries)
            .field("max_text_bytes", &self.max_text_bytes)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("storage", &self.storage)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl StudyConfig {
    /// Create a new builder for `StudyConfig`.
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model name for display; "auto" when the provider picks.
    pub fn model_label(&self) -> &str {
        self.model.as_deref().unwrap_or("auto")
    }
}

/// Builder for [`StudyConfig`].
#[derive(Debug)]
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn fallback_retries(mut self, n: u32) -> Self {
        self.config.fallback_retries = n;
        self
    }

    pub fn max_text_bytes(mut self, n: usize) -> Self {
        self.config.max_text_bytes = n;
        self
    }

    pub fn max_file_bytes(mut self, n: usize) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn storage(mut self, storage: StorageBackend) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudyConfig, StudyError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(StudyError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == Some(0) {
            return Err(StudyError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_text_bytes == 0 || c.max_file_bytes == 0 {
            return Err(StudyError::InvalidConfig(
                "Input size limits must be ≥ 1 byte".into(),
            ));
        }
        if let StorageBackend::Filesystem(ref root) = c.storage {
            if root.as_os_str().is_empty() {
                return Err(StudyError::InvalidConfig(
                    "Filesystem storage needs a data directory".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Persistence backend for notes and uploaded files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    /// Process-local maps; everything is lost on restart. (default)
    #[default]
    Memory,
    /// JSON documents and blobs under a data directory.
    Filesystem(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StudyConfig::default();
        assert_eq!(c.temperature, 0.3);
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.fallback_retries, 1);
        assert_eq!(c.storage, StorageBackend::Memory);
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.model_label(), "auto");
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = StudyConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let err = StudyConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_empty_data_dir() {
        let err = StudyConfig::builder()
            .storage(StorageBackend::Filesystem(PathBuf::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("data directory"));
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", StudyConfig::default());
        assert!(s.contains("StudyConfig"));
        assert!(s.contains("provider: None"));
    }
}
