use crate::error::ExtractionFallback;
use crate::output::{GenerationOutcome, GenerationStats, NoteDraft, StructuredResult};
use crate::task::TaskKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: String,
    pub task_kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub task_kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub note_id: String,
    pub task_kind: TaskKind,
    pub title: String,
    pub result: StructuredResult,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<ExtractionFallback>,
    pub stats: GenerationStats,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            note_id: outcome.note.id,
            task_kind: outcome.note.task_kind,
            title: outcome.note.title,
            result: outcome.note.result,
            fallback_used: outcome.note.fallback_used,
            fallback_reason: outcome.fallback,
            stats: outcome.stats,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
}

/// The resolved model and what each task asks of it.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub model: String,
    pub temperature: f32,
    pub tasks: Vec<TaskInfo>,
}

#[derive(Debug, Serialize)]
pub struct TaskInfo {
    pub task_kind: TaskKind,
    pub requires_file: bool,
    pub max_tokens: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub retryable: bool,
    /// Unsaved result; post it back to `/api/users/:user_id/notes`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<NoteDraft>,
}
