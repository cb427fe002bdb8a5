//! Plain-text study sheets from structured results.
//!
//! The JSON result is what clients render; this is the printable form
//! served at `/notes/:id/text` and used as source material when a note is
//! regenerated into another task kind.

use crate::output::{FlashcardSet, McqSet, StructuredResult, Summary};
use std::fmt::Write as _;

const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Render a result as a plain-text study sheet.
///
/// ```text
/// Q1: What is ATP?
/// A: The cell's energy currency.
/// ```
pub fn render_plain(result: &StructuredResult) -> String {
    match result {
        StructuredResult::Summary(summary) => render_summary(summary),
        StructuredResult::McqSet(set) => render_mcqs(set),
        StructuredResult::FlashcardSet(set) => render_flashcards(set),
    }
}

/// Source text for generating new material from an existing result.
///
/// A summary contributes its prose and key points; question sets their
/// rendered sheet. Empty when the result holds nothing usable.
pub fn study_text(result: &StructuredResult) -> String {
    if result.generation_failed() {
        return String::new();
    }
    render_plain(result).trim().to_string()
}

fn render_summary(summary: &Summary) -> String {
    let mut out = summary.text.trim().to_string();
    if !summary.key_points.is_empty() {
        out.push_str("\n\nKey points:\n");
        for point in &summary.key_points {
            let _ = writeln!(out, "- {}", point.trim());
        }
    }
    out.trim_end().to_string()
}

fn render_mcqs(set: &McqSet) -> String {
    if set.generation_failed {
        return "No questions could be generated.".to_string();
    }
    let mut out = String::new();
    for (i, q) in set.questions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Q{}: {}", i + 1, q.question.trim());
        for (letter, option) in LETTERS.iter().zip(&q.options) {
            let _ = writeln!(out, "  {letter}) {}", option.trim());
        }
        if let (Some(letter), Some(option)) = (LETTERS.get(q.correct_index), q.correct_option()) {
            let _ = writeln!(out, "Answer: {letter}) {}", option.trim());
        }
    }
    out.trim_end().to_string()
}

fn render_flashcards(set: &FlashcardSet) -> String {
    if set.generation_failed {
        return "No flashcards could be generated.".to_string();
    }
    let mut out = String::new();
    for (i, card) in set.cards.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Q{}: {}", i + 1, card.front.trim());
        let _ = writeln!(out, "A: {}", card.back.trim());
    }
    out.trim_end().to_string()
}
