//! Request orchestration: validate → store upload → prompt → model →
//! extract → store note.
//!
//! [`StudyService`] is the single entry point used by the HTTP surface and
//! the CLI. It is cheap to clone; every collaborator sits behind an `Arc`.
//!
//! ## Failure model
//!
//! - Bad input fails before any network call.
//! - A reply that does not match the expected shape is *not* an error: the
//!   model is asked again up to `fallback_retries` times, then the fallback
//!   result is stored and reported as `fallback_used`.
//! - A note that cannot be saved surfaces as
//!   [`StudyError::PersistenceFailure`] carrying the unsaved draft, so the
//!   caller can hand it back to [`StudyService::save_draft`] without paying
//!   for another generation.

use crate::config::StudyConfig;
use crate::error::{ExtractionFallback, StudyError};
use crate::output::{
    Extraction, GenerationOutcome, GenerationStats, Note, NoteDraft, NoteSummary, SourceRef,
    StructuredResult,
};
use crate::pipeline::extract::{extract, extract_shape};
use crate::pipeline::input::{prepare, validate_user_id, GenerationRequest, PreparedInput};
use crate::pipeline::llm::{invoke, Attachment, EdgequakeModel, ModelInvoker, ModelPrompt};
use crate::pipeline::render::study_text;
use crate::prompts::{build_file_prompt, build_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::store::{build_stores, Blob, BlobRef, BlobStore, NoteStore, StoreError};
use crate::task::TaskKind;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Generates, stores and serves study material.
#[derive(Clone)]
pub struct StudyService {
    config: Arc<StudyConfig>,
    model: Arc<dyn ModelInvoker>,
    notes: Arc<dyn NoteStore>,
    blobs: Arc<dyn BlobStore>,
}

impl StudyService {
    pub fn new(
        config: StudyConfig,
        model: Arc<dyn ModelInvoker>,
        notes: Arc<dyn NoteStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            model,
            notes,
            blobs,
        }
    }

    /// Resolve the model provider and open the configured storage backend.
    pub fn from_config(config: StudyConfig) -> Result<Self, StudyError> {
        let model = Arc::new(EdgequakeModel::from_config(&config)?);
        let (notes, blobs) = build_stores(&config.storage);
        info!("Storage backend: {:?}", config.storage);
        Ok(Self::new(config, model, notes, blobs))
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Output-token budget of one model call for `task`.
    pub fn max_tokens_for(&self, task: TaskKind) -> usize {
        self.config
            .max_tokens
            .unwrap_or_else(|| task.default_max_tokens())
    }

    // ── Generation ──────────────────────────────────────────────────────

    /// Generate study material from text or an upload and store it as a note.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutcome, StudyError> {
        let start = Instant::now();
        let input = prepare(request, &self.config)?;
        info!(
            "Generating {} for user {} ({} chars{})",
            input.task_kind,
            input.user_id,
            input.text.chars().count(),
            if input.file.is_some() { ", with upload" } else { "" }
        );

        let source = match input.file {
            Some(ref file) => {
                let reference = self
                    .blobs
                    .put(&input.user_id, &file.content_type, &file.bytes)
                    .await
                    .map_err(|e| persistence_failure(e, None))?;
                debug!("Stored upload as {}/{}", reference.user_id, reference.blob_id);
                SourceRef::Blob {
                    reference,
                    content_type: file.content_type.clone(),
                    size: file.bytes.len(),
                }
            }
            None => SourceRef::Text {
                chars: input.text.chars().count(),
            },
        };

        self.run(input, source, start).await
    }

    /// Generate new material of kind `task` from the content of a stored note.
    pub async fn regenerate(
        &self,
        user_id: &str,
        note_id: &str,
        task: TaskKind,
        title: Option<String>,
    ) -> Result<GenerationOutcome, StudyError> {
        let start = Instant::now();
        let existing = self.note(user_id, note_id).await?;
        let text = study_text(&existing.result);
        if text.is_empty() {
            return Err(StudyError::InvalidInput(format!(
                "note '{note_id}' has no content to generate from"
            )));
        }

        let mut request = GenerationRequest::text(user_id, task, text);
        request.title = title;
        let input = prepare(request, &self.config)?;
        info!("Regenerating note {} as {} for user {}", note_id, task, user_id);

        let source = SourceRef::Note {
            note_id: existing.id,
        };
        self.run(input, source, start).await
    }

    async fn run(
        &self,
        input: PreparedInput,
        source: SourceRef,
        start: Instant,
    ) -> Result<GenerationOutcome, StudyError> {
        let prompt = self.build_model_prompt(&input);
        let mut stats = GenerationStats::default();
        let llm_start = Instant::now();

        let mut extraction: Option<Extraction> = None;
        for round in 0..=self.config.fallback_retries {
            let outcome = match invoke(self.model.as_ref(), &prompt, &self.config).await {
                Ok(outcome) => outcome,
                // A failed extra call keeps the fallback already in hand.
                Err(e) if extraction.is_some() => {
                    warn!(
                        "Extra model call for {} failed, keeping fallback: {}",
                        input.task_kind, e
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
            stats.model_attempts += outcome.attempts;
            stats.extraction_attempts += 1;
            stats.input_tokens += outcome.reply.prompt_tokens;
            stats.output_tokens += outcome.reply.completion_tokens;

            let current = extract(&outcome.reply.content, input.task_kind);
            if let Some(reason) = current.fallback_reason() {
                warn!(
                    "Extraction fell back for {} (round {}/{}): {}",
                    input.task_kind,
                    round + 1,
                    self.config.fallback_retries + 1,
                    reason
                );
                extraction = Some(current);
                continue;
            }
            extraction = Some(current);
            break;
        }
        stats.llm_duration_ms = llm_start.elapsed().as_millis() as u64;

        let extraction =
            extraction.ok_or_else(|| StudyError::Internal("model was never called".into()))?;
        let fallback: Option<ExtractionFallback> = extraction.fallback_reason().cloned();

        let draft = NoteDraft {
            title: input.title,
            task_kind: input.task_kind,
            source,
            result: extraction.into_result(),
            fallback_used: fallback.is_some(),
        };
        let note = Note::from_draft(input.user_id, draft);
        if let Err(e) = self.notes.put(&note).await {
            return Err(persistence_failure(e, Some(note.to_draft())));
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Stored note {} ({}, fallback: {}) in {}ms",
            note.id,
            note.task_kind,
            note.fallback_used,
            stats.total_duration_ms
        );

        Ok(GenerationOutcome {
            note,
            fallback,
            stats,
        })
    }

    fn build_model_prompt(&self, input: &PreparedInput) -> ModelPrompt {
        let system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let max_tokens = self.max_tokens_for(input.task_kind);

        let (user, attachment) = match input.file {
            Some(ref file) if file.send_to_model => (
                build_file_prompt(input.task_kind, &input.text),
                Some(Attachment {
                    content_type: file.content_type.clone(),
                    bytes: file.bytes.clone(),
                }),
            ),
            _ => (build_prompt(input.task_kind, &input.text), None),
        };

        ModelPrompt {
            system,
            user,
            attachment,
            temperature: self.config.temperature,
            max_tokens,
        }
    }

    // ── Retry-save ──────────────────────────────────────────────────────

    /// Store a draft returned with a persistence failure.
    ///
    /// The stored result is always the extractor's: a draft flagged as a
    /// fallback must be exactly the fallback for its task kind, any other
    /// draft is re-validated and stored as decoded.
    pub async fn save_draft(&self, user_id: &str, mut draft: NoteDraft) -> Result<Note, StudyError> {
        validate_user_id(user_id)?;
        draft.result = checked_draft_result(&draft)?;

        draft.title = draft.title.trim().to_string();
        if draft.title.is_empty() {
            draft.title = draft.task_kind.default_title().to_string();
        }

        let note = Note::from_draft(user_id, draft);
        if let Err(e) = self.notes.put(&note).await {
            return Err(persistence_failure(e, Some(note.to_draft())));
        }
        info!("Saved draft as note {} for user {}", note.id, user_id);
        Ok(note)
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn note(&self, user_id: &str, note_id: &str) -> Result<Note, StudyError> {
        validate_user_id(user_id)?;
        self.notes
            .get(user_id, note_id)
            .await
            .map_err(|e| read_failure(e, "note", note_id))?
            .ok_or_else(|| StudyError::NotFound {
                what: "note",
                id: note_id.to_string(),
            })
    }

    /// A user's notes, newest first.
    pub async fn notes(&self, user_id: &str) -> Result<Vec<NoteSummary>, StudyError> {
        validate_user_id(user_id)?;
        let notes = self
            .notes
            .list(user_id)
            .await
            .map_err(|e| persistence_failure(e, None))?;
        Ok(notes.iter().map(NoteSummary::from).collect())
    }

    pub async fn blob(&self, user_id: &str, blob_id: &str) -> Result<Blob, StudyError> {
        validate_user_id(user_id)?;
        let reference = BlobRef {
            user_id: user_id.to_string(),
            blob_id: blob_id.to_string(),
        };
        self.blobs
            .get(&reference)
            .await
            .map_err(|e| read_failure(e, "blob", blob_id))?
            .ok_or_else(|| StudyError::NotFound {
                what: "blob",
                id: blob_id.to_string(),
            })
    }
}

fn checked_draft_result(draft: &NoteDraft) -> Result<StructuredResult, StudyError> {
    let expected = draft.task_kind.shape();
    if draft.result.shape() != expected {
        return Err(StudyError::InvalidInput(format!(
            "result does not have the {:?} shape required by '{}'",
            expected, draft.task_kind
        )));
    }

    if draft.fallback_used {
        let text = match draft.result {
            StructuredResult::Summary(ref s) => s.text.as_str(),
            _ => "",
        };
        let fallback = StructuredResult::fallback(expected, text);
        if draft.result != fallback {
            return Err(StudyError::InvalidInput(
                "a fallback draft must hold only the fallback result".into(),
            ));
        }
        return Ok(fallback);
    }

    let json = serde_json::to_string(&draft.result)
        .map_err(|e| StudyError::Internal(format!("draft serialisation: {e}")))?;
    match extract_shape(&json, expected) {
        Extraction::Validated(result) => Ok(result),
        Extraction::Fallback { reason, .. } => {
            Err(StudyError::InvalidInput(format!("invalid draft: {reason}")))
        }
    }
}

fn persistence_failure(e: StoreError, draft: Option<NoteDraft>) -> StudyError {
    warn!("Storage failure: {}", e);
    StudyError::PersistenceFailure {
        detail: e.to_string(),
        draft: draft.map(Box::new),
    }
}

/// A malformed id cannot name a stored document, so it reads as missing.
fn read_failure(e: StoreError, what: &'static str, id: &str) -> StudyError {
    match e {
        StoreError::InvalidKey(_) => StudyError::NotFound {
            what,
            id: id.to_string(),
        },
        other => persistence_failure(other, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{McqQuestion, McqSet};
    use crate::pipeline::input::SourceFile;
    use crate::pipeline::llm::{InvokeError, ModelReply};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with scripted texts in order, repeating the last one.
    struct Scripted {
        replies: Vec<&'static str>,
        prompts: Mutex<Vec<ModelPrompt>>,
    }

    impl Scripted {
        fn new(replies: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelInvoker for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &ModelPrompt) -> Result<ModelReply, InvokeError> {
            let mut prompts = self.prompts.lock().unwrap();
            let idx = prompts.len().min(self.replies.len() - 1);
            prompts.push(prompt.clone());
            Ok(ModelReply {
                content: self.replies[idx].to_string(),
                prompt_tokens: 10,
                completion_tokens: 20,
            })
        }
    }

    /// Replies once, then the provider is down.
    struct ThenFails {
        first: &'static str,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ModelInvoker for ThenFails {
        fn name(&self) -> &str {
            "then-fails"
        }

        async fn complete(&self, _prompt: &ModelPrompt) -> Result<ModelReply, InvokeError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok(ModelReply {
                    content: self.first.to_string(),
                    prompt_tokens: 10,
                    completion_tokens: 20,
                })
            } else {
                Err(InvokeError::Provider("503 overloaded".into()))
            }
        }
    }

    /// Accepts reads, fails every write.
    struct BrokenNotes;

    #[async_trait]
    impl NoteStore for BrokenNotes {
        async fn put(&self, _note: &Note) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        async fn get(&self, _user_id: &str, _note_id: &str) -> Result<Option<Note>, StoreError> {
            Ok(None)
        }
        async fn list(&self, _user_id: &str) -> Result<Vec<Note>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn service(model: Arc<Scripted>) -> (StudyService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = StudyConfig::builder().retry_backoff_ms(1).build().unwrap();
        (
            StudyService::new(config, model, store.clone(), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn valid_reply_is_stored_without_retry() {
        let model = Scripted::new(vec![r#"{"text":"Cells divide.","key_points":["Mitosis"]}"#]);
        let (svc, _) = service(model.clone());

        let out = svc
            .generate(GenerationRequest::text("alice", TaskKind::Summary, "Cell biology"))
            .await
            .unwrap();

        assert!(out.fallback.is_none());
        assert!(!out.note.fallback_used);
        assert_eq!(out.stats.extraction_attempts, 1);
        assert_eq!(out.stats.input_tokens, 10);
        assert_eq!(model.calls(), 1);
        assert_eq!(svc.note("alice", &out.note.id).await.unwrap(), out.note);
    }

    #[tokio::test]
    async fn fallback_triggers_one_more_model_call() {
        let model = Scripted::new(vec![
            "Sorry, I cannot process this.",
            r#"{"cards":[{"front":"ATP?","back":"Energy."}]}"#,
        ]);
        let (svc, _) = service(model.clone());

        let out = svc
            .generate(GenerationRequest::text("alice", TaskKind::Flashcard, "ATP"))
            .await
            .unwrap();

        assert_eq!(model.calls(), 2);
        assert!(out.fallback.is_none());
        assert_eq!(out.stats.extraction_attempts, 2);
        assert_eq!(out.stats.output_tokens, 40);
    }

    #[tokio::test]
    async fn persistent_fallback_is_stored_and_reported() {
        let model = Scripted::new(vec!["Sorry, I cannot process this."]);
        let (svc, _) = service(model.clone());

        let out = svc
            .generate(GenerationRequest::text("alice", TaskKind::Mcq, "Photosynthesis"))
            .await
            .unwrap();

        assert_eq!(model.calls(), 2);
        assert_eq!(out.fallback, Some(ExtractionFallback::NoJson));
        assert!(out.note.fallback_used);
        assert!(out.note.result.generation_failed());
        assert_eq!(svc.notes("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_extra_call_keeps_the_fallback() {
        let model = Arc::new(ThenFails {
            first: "Sorry, I cannot process this.",
            calls: Mutex::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let config = StudyConfig::builder()
            .max_retries(0)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let svc = StudyService::new(config, model.clone(), store.clone(), store);

        let out = svc
            .generate(GenerationRequest::text("alice", TaskKind::Mcq, "Photosynthesis"))
            .await
            .unwrap();

        assert_eq!(*model.calls.lock().unwrap(), 2);
        assert_eq!(out.fallback, Some(ExtractionFallback::NoJson));
        assert!(out.note.result.generation_failed());
        assert_eq!(out.stats.extraction_attempts, 1);
        assert_eq!(svc.notes("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_is_stored_and_attached() {
        let model = Scripted::new(vec![r#"{"text":"Scanned page.","key_points":[]}"#]);
        let (svc, _) = service(model.clone());
        let file = SourceFile {
            bytes: b"%PDF-1.4 scan".to_vec(),
            content_type: Some("application/pdf".into()),
            filename: Some("scan.pdf".into()),
        };

        let out = svc
            .generate(GenerationRequest::file("alice", TaskKind::OcrSummary, file))
            .await
            .unwrap();

        let SourceRef::Blob { ref reference, .. } = out.note.source else {
            panic!("expected blob source, got {:?}", out.note.source);
        };
        let blob = svc.blob("alice", &reference.blob_id).await.unwrap();
        assert_eq!(blob.content_type, "application/pdf");

        let prompts = model.prompts.lock().unwrap();
        let attachment = prompts[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(prompts[0].max_tokens, 2000);
    }

    #[tokio::test]
    async fn regenerate_uses_the_stored_summary() {
        let model = Scripted::new(vec![
            r#"{"text":"Mitochondria make ATP.","key_points":[]}"#,
            r#"{"cards":[{"front":"Who makes ATP?","back":"Mitochondria."}]}"#,
        ]);
        let (svc, _) = service(model.clone());
        let first = svc
            .generate(GenerationRequest::text("alice", TaskKind::Summary, "Biology notes"))
            .await
            .unwrap();

        let second = svc
            .regenerate("alice", &first.note.id, TaskKind::Flashcard, None)
            .await
            .unwrap();

        assert_eq!(
            second.note.source,
            SourceRef::Note {
                note_id: first.note.id.clone()
            }
        );
        assert_eq!(second.note.title, "Flashcards");
        assert!(model.prompts.lock().unwrap()[1].user.contains("Mitochondria make ATP."));
    }

    #[tokio::test]
    async fn storage_failure_returns_the_draft() {
        let model = Scripted::new(vec![r#"{"text":"A","key_points":["B"]}"#]);
        let store = Arc::new(MemoryStore::new());
        let svc = StudyService::new(
            StudyConfig::default(),
            model,
            Arc::new(BrokenNotes),
            store,
        );

        let err = svc
            .generate(GenerationRequest::text("alice", TaskKind::Summary, "x"))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        match err {
            StudyError::PersistenceFailure { draft: Some(draft), .. } => {
                assert_eq!(draft.task_kind, TaskKind::Summary);
                assert!(matches!(draft.result, StructuredResult::Summary(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_draft_rejects_mismatched_shape() {
        let (svc, _) = service(Scripted::new(vec!["{}"]));
        let draft = NoteDraft {
            title: " ".into(),
            task_kind: TaskKind::Mcq,
            source: SourceRef::Text { chars: 1 },
            result: StructuredResult::fallback(crate::task::OutputShape::Summary, "text"),
            fallback_used: false,
        };
        assert!(matches!(
            svc.save_draft("alice", draft.clone()).await,
            Err(StudyError::InvalidInput(_))
        ));

        let ok = NoteDraft {
            task_kind: TaskKind::Summary,
            ..draft
        };
        let note = svc.save_draft("alice", ok).await.unwrap();
        assert_eq!(note.title, "Summary");
    }

    fn mcq_draft(questions: Vec<McqQuestion>, fallback_used: bool) -> NoteDraft {
        NoteDraft {
            title: "Quiz".into(),
            task_kind: TaskKind::Mcq,
            source: SourceRef::Text { chars: 10 },
            result: StructuredResult::McqSet(McqSet {
                questions,
                generation_failed: false,
            }),
            fallback_used,
        }
    }

    fn question(text: &str, options: &[&str], correct_index: usize) -> McqQuestion {
        McqQuestion {
            question: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
        }
    }

    #[tokio::test]
    async fn save_draft_rejects_content_behind_a_fallback_flag() {
        let (svc, store) = service(Scripted::new(vec!["{}"]));
        let draft = mcq_draft(vec![question("", &["only"], 9)], true);

        assert!(matches!(
            svc.save_draft("alice", draft).await,
            Err(StudyError::InvalidInput(_))
        ));
        assert!(store.list("alice").await.unwrap().is_empty());

        let genuine = NoteDraft {
            result: StructuredResult::fallback(crate::task::OutputShape::McqSet, ""),
            ..mcq_draft(vec![], true)
        };
        let note = svc.save_draft("alice", genuine).await.unwrap();
        assert!(note.fallback_used);
        assert!(note.result.generation_failed());
    }

    #[tokio::test]
    async fn save_draft_stores_only_valid_items() {
        let (svc, _) = service(Scripted::new(vec!["{}"]));
        let good = question("2+2?", &["3", "4", "5", "6"], 1);
        let draft = mcq_draft(vec![good.clone(), question("Broken", &["only"], 9)], false);

        let note = svc.save_draft("alice", draft).await.unwrap();

        assert_eq!(
            note.result,
            StructuredResult::McqSet(McqSet {
                questions: vec![good],
                generation_failed: false,
            })
        );
        assert_eq!(svc.note("alice", &note.id).await.unwrap().result, note.result);
    }

    #[tokio::test]
    async fn save_draft_rejects_a_set_with_no_valid_items() {
        let (svc, _) = service(Scripted::new(vec!["{}"]));
        let draft = mcq_draft(vec![question("Broken", &["only"], 9)], false);
        assert!(matches!(
            svc.save_draft("alice", draft).await,
            Err(StudyError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn unknown_note_is_not_found() {
        let (svc, _) = service(Scripted::new(vec!["{}"]));
        assert!(matches!(
            svc.note("alice", "missing").await,
            Err(StudyError::NotFound { what: "note", .. })
        ));
        assert!(matches!(
            svc.blob("alice", "../x").await,
            Err(StudyError::NotFound { what: "blob", .. })
        ));
    }
}
