use super::error::ApiError;
use super::models::{
    GenerateRequest, GenerateResponse, HealthResponse, ModelsResponse, RegenerateRequest, TaskInfo,
};
use crate::error::StudyError;
use crate::generate::StudyService;
use crate::output::{Note, NoteDraft, NoteSummary};
use crate::pipeline::input::{GenerationRequest, SourceFile};
use crate::pipeline::render::render_plain;
use crate::task::TaskKind;
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

fn parse_task(raw: &str) -> Result<TaskKind, StudyError> {
    raw.parse::<TaskKind>()
        .map_err(|e| StudyError::InvalidInput(e.to_string()))
}

pub async fn health(State(service): State<StudyService>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: service.model_name().to_string(),
    })
}

pub async fn models(State(service): State<StudyService>) -> Json<ModelsResponse> {
    let tasks = TaskKind::ALL
        .into_iter()
        .map(|task| TaskInfo {
            task_kind: task,
            requires_file: task.requires_file(),
            max_tokens: service.max_tokens_for(task),
        })
        .collect();
    Json(ModelsResponse {
        model: service.model_name().to_string(),
        temperature: service.config().temperature,
        tasks,
    })
}

pub async fn generate(
    State(service): State<StudyService>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(payload) = payload?;
    let task = parse_task(&payload.task_kind)?;
    let mut request = GenerationRequest::text(payload.user_id, task, payload.text);
    request.title = payload.title;

    let outcome = service.generate(request).await?;
    Ok(Json(outcome.into()))
}

/// Multipart fields: `user_id`, `task_kind` (default `ocr_summary`),
/// optional `title` and `text`, and `file`.
pub async fn upload(
    State(service): State<StudyService>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut user_id = None;
    let mut task = TaskKind::OcrSummary;
    let mut title = None;
    let mut text = String::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" => user_id = Some(field.text().await?),
            "task_kind" => task = parse_task(&field.text().await?)?,
            "title" => title = Some(field.text().await?),
            "text" => text = field.text().await?,
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some(SourceFile {
                    bytes: bytes.to_vec(),
                    content_type,
                    filename,
                });
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| StudyError::InvalidInput("missing 'user_id' field".into()))?;
    let file = file.ok_or_else(|| StudyError::InvalidInput("missing 'file' field".into()))?;

    let mut request = GenerationRequest::file(user_id, task, file);
    request.source_text = text;
    request.title = title;

    let outcome = service.generate(request).await?;
    Ok(Json(outcome.into()))
}

pub async fn list_notes(
    State(service): State<StudyService>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<NoteSummary>>, ApiError> {
    Ok(Json(service.notes(&user_id).await?))
}

pub async fn save_note(
    State(service): State<StudyService>,
    Path(user_id): Path<String>,
    payload: Result<Json<NoteDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let Json(draft) = payload?;
    let note = service.save_draft(&user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(service): State<StudyService>,
    Path((user_id, note_id)): Path<(String, String)>,
) -> Result<Json<Note>, ApiError> {
    Ok(Json(service.note(&user_id, &note_id).await?))
}

pub async fn note_text(
    State(service): State<StudyService>,
    Path((user_id, note_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let note = service.note(&user_id, &note_id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_plain(&note.result),
    )
        .into_response())
}

pub async fn regenerate(
    State(service): State<StudyService>,
    Path((user_id, note_id)): Path<(String, String)>,
    payload: Result<Json<RegenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(payload) = payload?;
    let task = parse_task(&payload.task_kind)?;
    let outcome = service
        .regenerate(&user_id, &note_id, task, payload.title)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn get_blob(
    State(service): State<StudyService>,
    Path((user_id, blob_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let blob = service.blob(&user_id, &blob_id).await?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}

pub async fn not_found() -> Response {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", "route not found").into_response()
}
