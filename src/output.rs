//! Output types: validated study material, extraction outcomes and notes.

use crate::error::ExtractionFallback;
use crate::store::BlobRef;
use crate::task::{OutputShape, TaskKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Study material ───────────────────────────────────────────────────────

/// A summary with its key points, in the order the model gave them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// One multiple-choice question. `options` always holds exactly
/// [`McqQuestion::OPTION_COUNT`] entries once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl McqQuestion {
    pub const OPTION_COUNT: usize = 4;

    /// The text of the correct option.
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqSet {
    pub questions: Vec<McqQuestion>,
    #[serde(default)]
    pub generation_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub cards: Vec<Flashcard>,
    #[serde(default)]
    pub generation_failed: bool,
}

/// Typed, validated study material derived from model text.
///
/// Serialised untagged: a summary is `{text, key_points}`, a question set
/// `{questions, generation_failed}`, a card deck `{cards, generation_failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredResult {
    Summary(Summary),
    McqSet(McqSet),
    FlashcardSet(FlashcardSet),
}

impl StructuredResult {
    pub fn shape(&self) -> OutputShape {
        match self {
            StructuredResult::Summary(_) => OutputShape::Summary,
            StructuredResult::McqSet(_) => OutputShape::McqSet,
            StructuredResult::FlashcardSet(_) => OutputShape::FlashcardSet,
        }
    }

    /// The placeholder returned when nothing could be recovered.
    ///
    /// Summaries keep the reply, trimmed of surrounding whitespace, as their
    /// text with no key points. Question sets are empty with
    /// `generation_failed` set.
    pub fn fallback(shape: OutputShape, raw: &str) -> Self {
        match shape {
            OutputShape::Summary => StructuredResult::Summary(Summary {
                text: raw.trim().to_string(),
                key_points: Vec::new(),
            }),
            OutputShape::McqSet => StructuredResult::McqSet(McqSet {
                questions: Vec::new(),
                generation_failed: true,
            }),
            OutputShape::FlashcardSet => StructuredResult::FlashcardSet(FlashcardSet {
                cards: Vec::new(),
                generation_failed: true,
            }),
        }
    }

    pub fn generation_failed(&self) -> bool {
        match self {
            StructuredResult::Summary(_) => false,
            StructuredResult::McqSet(set) => set.generation_failed,
            StructuredResult::FlashcardSet(set) => set.generation_failed,
        }
    }
}

// ── Extraction outcome ───────────────────────────────────────────────────

/// Result of coercing a model reply into a [`StructuredResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The reply contained JSON of the expected shape.
    Validated(StructuredResult),
    /// Nothing usable was recovered; `result` is the defined placeholder.
    Fallback {
        result: StructuredResult,
        reason: ExtractionFallback,
    },
}

impl Extraction {
    pub fn result(&self) -> &StructuredResult {
        match self {
            Extraction::Validated(result) | Extraction::Fallback { result, .. } => result,
        }
    }

    pub fn into_result(self) -> StructuredResult {
        match self {
            Extraction::Validated(result) | Extraction::Fallback { result, .. } => result,
        }
    }

    pub fn fallback_reason(&self) -> Option<&ExtractionFallback> {
        match self {
            Extraction::Validated(_) => None,
            Extraction::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback { .. })
    }
}

// ── Notes ────────────────────────────────────────────────────────────────

/// Where a note's material came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRef {
    /// Inline text submitted with the request.
    Text { chars: usize },
    /// An uploaded file kept in the blob store.
    Blob {
        reference: BlobRef,
        content_type: String,
        size: usize,
    },
    /// Regenerated from an earlier note.
    Note { note_id: String },
}

/// A persisted study note. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub task_kind: TaskKind,
    pub created_at: DateTime<Utc>,
    pub source: SourceRef,
    pub result: StructuredResult,
    #[serde(default)]
    pub fallback_used: bool,
}

/// Everything a note needs except its identity.
///
/// Returned to the caller inside [`crate::error::StudyError::PersistenceFailure`]
/// and accepted back by the save endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub task_kind: TaskKind,
    pub source: SourceRef,
    pub result: StructuredResult,
    #[serde(default)]
    pub fallback_used: bool,
}

impl Note {
    /// Stamp a draft with a fresh id and creation time.
    pub fn from_draft(user_id: impl Into<String>, draft: NoteDraft) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: draft.title,
            task_kind: draft.task_kind,
            created_at: Utc::now(),
            source: draft.source,
            result: draft.result,
            fallback_used: draft.fallback_used,
        }
    }

    pub fn to_draft(&self) -> NoteDraft {
        NoteDraft {
            title: self.title.clone(),
            task_kind: self.task_kind,
            source: self.source.clone(),
            result: self.result.clone(),
            fallback_used: self.fallback_used,
        }
    }
}

/// Listing entry: a note without its material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    pub task_kind: TaskKind,
    pub created_at: DateTime<Utc>,
    pub fallback_used: bool,
}

impl From<&Note> for NoteSummary {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            task_kind: note.task_kind,
            created_at: note.created_at,
            fallback_used: note.fallback_used,
        }
    }
}

// ── Generation outcome ───────────────────────────────────────────────────

/// Per-request accounting, reported back to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Model calls including transport retries.
    pub model_attempts: u32,
    /// Model replies run through the extractor.
    pub extraction_attempts: u32,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A stored note plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub note: Note,
    pub fallback: Option<ExtractionFallback>,
    pub stats: GenerationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_serialisation_matches_wire_shapes() {
        let summary = StructuredResult::Summary(Summary {
            text: "A".into(),
            key_points: vec!["B".into()],
        });
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            serde_json::json!({"text": "A", "key_points": ["B"]})
        );

        let failed = StructuredResult::fallback(OutputShape::McqSet, "Sorry");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"questions": [], "generation_failed": true})
        );
    }

    #[test]
    fn untagged_deserialisation_picks_the_right_variant() {
        let v: StructuredResult =
            serde_json::from_str(r#"{"cards":[{"front":"f","back":"b"}]}"#).unwrap();
        assert_eq!(v.shape(), OutputShape::FlashcardSet);
        assert!(!v.generation_failed());

        let v: StructuredResult = serde_json::from_str(
            r#"{"questions":[{"question":"q","options":["a","b","c","d"],"correct_index":2}]}"#,
        )
        .unwrap();
        match v {
            StructuredResult::McqSet(set) => {
                assert_eq!(set.questions[0].correct_option(), Some("c"))
            }
            other => panic!("expected MCQ set, got {other:?}"),
        }
    }

    #[test]
    fn summary_fallback_keeps_raw_text() {
        let r = StructuredResult::fallback(OutputShape::Summary, "  plain prose \n");
        assert_eq!(
            r,
            StructuredResult::Summary(Summary {
                text: "plain prose".into(),
                key_points: vec![],
            })
        );
        assert!(!r.generation_failed());
    }

    #[test]
    fn note_round_trips_through_json() {
        let note = Note::from_draft(
            "alice",
            NoteDraft {
                title: "Cells".into(),
                task_kind: TaskKind::Flashcard,
                source: SourceRef::Text { chars: 42 },
                result: StructuredResult::fallback(OutputShape::FlashcardSet, ""),
                fallback_used: true,
            },
        );
        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
        assert_eq!(back.to_draft().title, "Cells");
    }
}
