//! Error types for the smartstudy-ai library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`StudyError`]: **Fatal** for the request: the input was rejected, the
//!   model could not be reached, or the result could not be saved. Returned
//!   as `Err(StudyError)` from [`crate::generate::StudyService`].
//!
//! * [`ExtractionFallback`]: **Non-fatal**: the model answered but its reply
//!   could not be coerced into the expected shape. The request still succeeds
//!   with the fallback content; the reason travels alongside the result in
//!   [`crate::output::Extraction::Fallback`].
//!
//! Model failures and persistence failures are kept apart so a client can
//! tell "generate again" from "save again".

use crate::output::NoteDraft;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the smartstudy-ai library.
#[derive(Debug, Error)]
pub enum StudyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request is malformed (missing text, bad user id, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Text or file exceeds the configured limit.
    #[error("Input too large: {what} is {size} bytes, limit is {limit} bytes")]
    InputTooLarge {
        what: &'static str,
        size: usize,
        limit: usize,
    },

    /// Uploaded file is neither a PDF, a supported image, nor UTF-8 text.
    #[error("Unsupported file type '{content_type}'. Upload a PDF, PNG, JPEG, GIF, WebP or plain-text file.")]
    UnsupportedFileType { content_type: String },

    /// A note or blob id does not exist for this user.
    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model call did not answer within the configured bound.
    #[error("Model call timed out after {secs}s ({attempts} attempts)")]
    ModelTimeout { secs: u64, attempts: u32 },

    /// The model service rejected or failed the call after all retries.
    #[error("Model unavailable after {attempts} attempts: {detail}")]
    ModelUnavailable { attempts: u32, detail: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Generation succeeded but the note or upload could not be stored.
    ///
    /// `draft` holds the generated result when there is one, so the caller
    /// can retry the save without paying for another model call.
    #[error("Failed to persist result: {detail}")]
    PersistenceFailure {
        detail: String,
        draft: Option<Box<NoteDraft>>,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudyError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StudyError::ModelTimeout { .. }
                | StudyError::ModelUnavailable { .. }
                | StudyError::PersistenceFailure { .. }
        )
    }

    /// Stable snake_case identifier for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            StudyError::InvalidInput(_) => "invalid_input",
            StudyError::InputTooLarge { .. } => "input_too_large",
            StudyError::UnsupportedFileType { .. } => "unsupported_file_type",
            StudyError::NotFound { .. } => "not_found",
            StudyError::ModelTimeout { .. } => "model_timeout",
            StudyError::ModelUnavailable { .. } => "model_unavailable",
            StudyError::ProviderNotConfigured { .. } => "provider_not_configured",
            StudyError::PersistenceFailure { .. } => "persistence_failure",
            StudyError::InvalidConfig(_) => "invalid_config",
            StudyError::Internal(_) => "internal",
        }
    }
}

/// Why the extractor returned a fallback instead of validated data.
///
/// Never propagated as an error: it is logged and reported next to the
/// fallback result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExtractionFallback {
    /// The model returned nothing but whitespace.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// No parseable JSON could be recovered, even after repair.
    #[error("no JSON value could be recovered from the model response")]
    NoJson,

    /// JSON was recovered but it does not match the expected shape.
    #[error("recovered JSON does not match the expected shape: {detail}")]
    ShapeMismatch { detail: String },
}
