//! Task kinds: which study material to generate.
//!
//! The task kind selects both the prompt template ([`crate::prompts`]) and
//! the shape the extractor validates against ([`OutputShape`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The requested generation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Summary with key points.
    Summary,
    /// Multiple-choice questions, four options each.
    #[serde(alias = "mcqs")]
    Mcq,
    /// Question/answer flashcards.
    #[serde(alias = "flashcards")]
    Flashcard,
    /// Read an uploaded PDF or image, then summarise it.
    #[serde(alias = "ocr")]
    OcrSummary,
}

/// Structure the model is asked to return for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Summary,
    McqSet,
    FlashcardSet,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Summary,
        TaskKind::Mcq,
        TaskKind::Flashcard,
        TaskKind::OcrSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Summary => "summary",
            TaskKind::Mcq => "mcq",
            TaskKind::Flashcard => "flashcard",
            TaskKind::OcrSummary => "ocr_summary",
        }
    }

    pub fn shape(self) -> OutputShape {
        match self {
            TaskKind::Summary | TaskKind::OcrSummary => OutputShape::Summary,
            TaskKind::Mcq => OutputShape::McqSet,
            TaskKind::Flashcard => OutputShape::FlashcardSet,
        }
    }

    /// Whether the task cannot run without an uploaded file.
    pub fn requires_file(self) -> bool {
        matches!(self, TaskKind::OcrSummary)
    }

    /// Default output-token budget for one model call.
    ///
    /// Reading a document and summarising it needs the most room; question
    /// sets are short.
    pub fn default_max_tokens(self) -> usize {
        match self {
            TaskKind::Summary => 1500,
            TaskKind::Mcq | TaskKind::Flashcard => 1200,
            TaskKind::OcrSummary => 2000,
        }
    }

    /// Title used when the caller does not provide one.
    pub fn default_title(self) -> &'static str {
        match self {
            TaskKind::Summary => "Summary",
            TaskKind::Mcq => "Multiple-choice questions",
            TaskKind::Flashcard => "Flashcards",
            TaskKind::OcrSummary => "Document summary",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known task kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task kind '{0}' (expected summary, mcq, flashcard or ocr_summary)")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "summary" => Ok(TaskKind::Summary),
            "mcq" | "mcqs" => Ok(TaskKind::Mcq),
            "flashcard" | "flashcards" => Ok(TaskKind::Flashcard),
            "ocr_summary" | "ocr" => Ok(TaskKind::OcrSummary),
            _ => Err(UnknownTaskKind(s.to_string())),
        }
    }
}
