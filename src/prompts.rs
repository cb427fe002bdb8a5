//! Prompt templates for study-material generation.
//!
//! Every template is keyed by [`TaskKind`] and spells out the exact JSON
//! shape the extractor will validate against. Keeping them here means a
//! prompt change and its shape change are reviewed together, and tests can
//! inspect the prompts without calling a model.
//!
//! Callers can override [`DEFAULT_SYSTEM_PROMPT`] via
//! [`crate::config::StudyConfig::system_prompt`].

use crate::task::TaskKind;

/// System prompt sent with every request unless overridden.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an AI study assistant. You turn study material into summaries, flashcards and multiple-choice questions.

Follow these rules precisely:
- Respond with ONE JSON value and nothing else
- Do NOT wrap the JSON in markdown fences
- Do NOT add explanations before or after the JSON
- Use plain double quotes for every key and string
- Base everything STRICTLY on the provided material"#;

const SUMMARY_SHAPE: &str = r#"{
  "text": "a concise summary in a few paragraphs",
  "key_points": ["first key point", "second key point"]
}"#;

const MCQ_SHAPE: &str = r#"{
  "questions": [
    {
      "question": "the question",
      "options": ["option A", "option B", "option C", "option D"],
      "correct_index": 0
    }
  ]
}"#;

const FLASHCARD_SHAPE: &str = r#"{
  "cards": [
    {"front": "question or term", "back": "answer or definition"}
  ]
}"#;

fn shape_for(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Summary | TaskKind::OcrSummary => SUMMARY_SHAPE,
        TaskKind::Mcq => MCQ_SHAPE,
        TaskKind::Flashcard => FLASHCARD_SHAPE,
    }
}

fn instruction_for(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Summary => {
            "Summarise the study material below. List the most important facts as key points."
        }
        TaskKind::OcrSummary => {
            "Read all text in the material. Then summarise it and list the most important facts as key points."
        }
        TaskKind::Mcq => {
            "Write 5 multiple-choice questions about the study material below. Each question has exactly 4 options; correct_index is the 0-based index of the right option."
        }
        TaskKind::Flashcard => {
            "Write 5 flashcards about the study material below. The front asks one question; the back answers it in one or two sentences."
        }
    }
}

/// Build the user prompt for a text request.
pub fn build_prompt(task: TaskKind, source_text: &str) -> String {
    format!(
        "{}\n\nRespond with JSON only, shape:\n{}\n\nStudy material:\n\"\"\"\n{}\n\"\"\"",
        instruction_for(task),
        shape_for(task),
        source_text.trim()
    )
}

/// Build the user prompt for a request whose material is an attached file.
///
/// `note` carries any text the user typed alongside the upload.
pub fn build_file_prompt(task: TaskKind, note: &str) -> String {
    let mut prompt = format!(
        "The study material is the attached document. Extract its readable text first.\n{}\n\nRespond with JSON only, shape:\n{}",
        instruction_for(task),
        shape_for(task)
    );
    let note = note.trim();
    if !note.is_empty() {
        prompt.push_str(&format!("\n\nAdditional instructions from the student:\n\"\"\"\n{note}\n\"\"\""));
    }
    prompt
}
