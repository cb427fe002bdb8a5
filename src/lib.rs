//! # smartstudy-ai
//!
//! Turn study material into summaries, flashcards and multiple-choice
//! questions with a generative model, and keep the results per user.
//!
//! ## Why this crate?
//!
//! Models asked for JSON answer with JSON *most* of the time. The rest of
//! the time they wrap it in fences, add a friendly sentence, leave a
//! trailing comma or apologise instead. The core of this crate is a
//! response extractor that recovers the structured result whenever it is
//! there and otherwise returns a defined fallback, so a bad reply never
//! becomes a failed request.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request (text or upload)
//!  │
//!  ├─ 1. Input    validate ids, limits and sniff the upload's real type
//!  ├─ 2. Store    keep the upload as a blob
//!  ├─ 3. Prompt   task-specific instructions + the exact JSON shape
//!  ├─ 4. Model    bounded timeout, retry with backoff
//!  ├─ 5. Extract  fences / prose / repair → validated result or fallback
//!  └─ 6. Store    save the note; a failed save returns the draft
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smartstudy_ai::{GenerationRequest, StudyConfig, StudyService, TaskKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let service = StudyService::from_config(StudyConfig::default())?;
//!     let request = GenerationRequest::text("alice", TaskKind::Flashcard, "Mitochondria make ATP.");
//!     let outcome = service.generate(request).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome.note.result)?);
//!     Ok(())
//! }
//! ```
//!
//! The extractor is usable on its own:
//!
//! ```rust
//! use smartstudy_ai::{extract, StructuredResult, TaskKind};
//!
//! let raw = "Here is your summary:\n```json\n{\"text\":\"A\",\"key_points\":[\"B\"]}\n```";
//! let extraction = extract(raw, TaskKind::Summary);
//! assert!(!extraction.is_fallback());
//! assert!(matches!(extraction.result(), StructuredResult::Summary(s) if s.text == "A"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `smartstudy` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod store;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{StorageBackend, StudyConfig, StudyConfigBuilder};
pub use error::{ExtractionFallback, StudyError};
pub use generate::StudyService;
pub use http::{router, run_server};
pub use output::{
    Extraction, Flashcard, FlashcardSet, GenerationOutcome, GenerationStats, McqQuestion, McqSet,
    Note, NoteDraft, NoteSummary, SourceRef, StructuredResult, Summary,
};
pub use pipeline::extract::extract;
pub use pipeline::input::{GenerationRequest, SourceFile};
pub use pipeline::llm::{EdgequakeModel, ModelInvoker, ModelPrompt, ModelReply};
pub use pipeline::render::render_plain;
pub use task::{OutputShape, TaskKind};
