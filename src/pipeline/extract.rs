//! Response extraction: model text → [`Extraction`].
//!
//! The model is asked for JSON but answers in free text. This stage recovers
//! a typed [`StructuredResult`] when one is there and otherwise returns the
//! defined fallback. It never fails and never panics: a reply that cannot be
//! used is a value ([`Extraction::Fallback`]), not an error.
//!
//! ## Recovery order
//!
//! 1. The whole reply, trimmed, parsed as JSON.
//! 2. The body of the first fenced code block, then the slice from the first
//!    `{`/`[` to the last matching `}`/`]` (drops surrounding prose).
//! 3. Every candidate above again, after [`repair`] (trailing commas, bare
//!    keys, single quotes, smart quotes).
//!
//! Each parsed value is decoded against the task's [`OutputShape`]; the first
//! one that decodes wins. Decoding accepts common key spellings (`q`/`a`,
//! `mcqs`, `flashcards`, `summary`) so replies in the older prompt formats
//! still validate.
//!
//! The function is pure: the same reply always yields the same extraction.

use crate::error::ExtractionFallback;
use crate::output::{
    Extraction, Flashcard, FlashcardSet, McqQuestion, McqSet, StructuredResult, Summary,
};
use crate::pipeline::repair;
use crate::task::{OutputShape, TaskKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Extract the structured result for `task` from a raw model reply.
pub fn extract(raw: &str, task: TaskKind) -> Extraction {
    extract_shape(raw, task.shape())
}

/// Extract a value of the given shape from a raw model reply.
pub fn extract_shape(raw: &str, shape: OutputShape) -> Extraction {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback(shape, raw, ExtractionFallback::EmptyResponse);
    }

    let candidates = candidates(trimmed);
    let mut first_mismatch: Option<String> = None;

    let raw_pass = candidates.iter().cloned();
    let repaired_pass = candidates.iter().flat_map(|c| repair::repair_candidates(c));

    for text in raw_pass.chain(repaired_pass) {
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        match decode(value, shape) {
            Ok(result) => return Extraction::Validated(result),
            Err(detail) => {
                first_mismatch.get_or_insert(detail);
            }
        }
    }

    let reason = match first_mismatch {
        Some(detail) => ExtractionFallback::ShapeMismatch { detail },
        None => ExtractionFallback::NoJson,
    };
    fallback(shape, raw, reason)
}

fn fallback(shape: OutputShape, raw: &str, reason: ExtractionFallback) -> Extraction {
    Extraction::Fallback {
        result: StructuredResult::fallback(shape, raw),
        reason,
    }
}

// ── Candidate recovery ───────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Substrings of the reply that may hold the JSON value, in trial order.
fn candidates(trimmed: &str) -> Vec<String> {
    let mut out: Vec<String> = vec![trimmed.to_string()];
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|c| c == s) {
            out.push(s.to_string());
        }
    };

    if let Some(caps) = RE_FENCE.captures(trimmed) {
        push(&caps[1]);
    }

    let first_brace = trimmed.find('{');
    let first_bracket = trimmed.find('[');
    let (primary, secondary) = match (first_brace, first_bracket) {
        (Some(b), Some(k)) if k < b => (('[', ']'), Some(('{', '}'))),
        (Some(_), Some(_)) => (('{', '}'), Some(('[', ']'))),
        (None, Some(_)) => (('[', ']'), None),
        _ => (('{', '}'), None),
    };
    for (open, close) in std::iter::once(primary).chain(secondary) {
        if let Some(slice) = delimited_slice(trimmed, open, close) {
            push(slice);
        }
    }

    out
}

/// The text from the first `open` to the last `close`, inclusive.
fn delimited_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..end + close.len_utf8()])
}

// ── Shape decoding ───────────────────────────────────────────────────────────

fn decode(value: Value, shape: OutputShape) -> Result<StructuredResult, String> {
    match shape {
        OutputShape::Summary => decode_summary(value).map(StructuredResult::Summary),
        OutputShape::McqSet => decode_mcq(value).map(StructuredResult::McqSet),
        OutputShape::FlashcardSet => decode_flashcards(value).map(StructuredResult::FlashcardSet),
    }
}

#[derive(Deserialize)]
struct SummaryWire {
    #[serde(alias = "summary")]
    text: String,
    #[serde(default, alias = "keyPoints", alias = "points")]
    key_points: Vec<String>,
}

fn decode_summary(value: Value) -> Result<Summary, String> {
    let wire: SummaryWire = match value {
        // A bare JSON string is a summary without key points.
        Value::String(text) => SummaryWire {
            text,
            key_points: Vec::new(),
        },
        other => serde_json::from_value(other).map_err(|e| e.to_string())?,
    };
    if wire.text.trim().is_empty() {
        return Err("summary text is empty".into());
    }
    Ok(Summary {
        text: wire.text,
        key_points: wire.key_points,
    })
}

/// A list of items, either bare or under one of the accepted keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsWire {
    Questions {
        #[serde(alias = "mcqs")]
        questions: Vec<Value>,
    },
    Cards {
        #[serde(alias = "flashcards")]
        cards: Vec<Value>,
    },
    Bare(Vec<Value>),
}

fn items(value: Value, shape: OutputShape) -> Result<Vec<Value>, String> {
    let wire: ItemsWire = serde_json::from_value(value).map_err(|_| match shape {
        OutputShape::McqSet => "expected an object with `questions` or a JSON array".to_string(),
        _ => "expected an object with `cards` or a JSON array".to_string(),
    })?;
    match (wire, shape) {
        (ItemsWire::Questions { questions }, OutputShape::McqSet) => Ok(questions),
        (ItemsWire::Cards { cards }, OutputShape::FlashcardSet) => Ok(cards),
        (ItemsWire::Bare(list), _) => Ok(list),
        (ItemsWire::Questions { .. }, _) => Err("got `questions`, expected `cards`".into()),
        (ItemsWire::Cards { .. }, _) => Err("got `cards`, expected `questions`".into()),
    }
}

/// Decode each item; keep the valid ones. Fails only when items were present
/// and none survived.
fn decode_items<T>(
    items: Vec<Value>,
    decode_item: impl Fn(Value) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    let total = items.len();
    let mut first_err: Option<String> = None;
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match decode_item(item) {
            Ok(v) => Some(v),
            Err(e) => {
                first_err.get_or_insert(format!("item {}: {e}", i + 1));
                None
            }
        })
        .collect();
    if total > 0 && decoded.is_empty() {
        return Err(first_err.unwrap_or_else(|| "no valid items".into()));
    }
    Ok(decoded)
}

#[derive(Deserialize)]
struct McqWire {
    #[serde(alias = "q")]
    question: String,
    #[serde(default, alias = "choices")]
    options: Vec<String>,
    #[serde(default, alias = "answer_index", alias = "correctIndex")]
    correct_index: Option<usize>,
    #[serde(default)]
    answer: Option<Value>,
}

fn decode_mcq(value: Value) -> Result<McqSet, String> {
    let questions = decode_items(items(value, OutputShape::McqSet)?, decode_mcq_item)?;
    Ok(McqSet {
        questions,
        generation_failed: false,
    })
}

fn decode_mcq_item(item: Value) -> Result<McqQuestion, String> {
    let wire: McqWire = serde_json::from_value(item).map_err(|e| e.to_string())?;
    if wire.question.trim().is_empty() {
        return Err("question is empty".into());
    }
    if wire.options.len() != McqQuestion::OPTION_COUNT {
        return Err(format!(
            "expected {} options, got {}",
            McqQuestion::OPTION_COUNT,
            wire.options.len()
        ));
    }
    if wire.options.iter().any(|o| o.trim().is_empty()) {
        return Err("an option is empty".into());
    }
    let correct_index = wire
        .correct_index
        .or_else(|| wire.answer.as_ref().and_then(|a| answer_index(a, &wire.options)))
        .ok_or("no correct answer given")?;
    if correct_index >= wire.options.len() {
        return Err(format!("correct_index {correct_index} is out of range"));
    }
    Ok(McqQuestion {
        question: wire.question,
        options: wire.options,
        correct_index,
    })
}

/// Resolve an `answer` field: an index, a letter (`"B"`, `"b)"`), or the
/// text of one of the options.
fn answer_index(answer: &Value, options: &[String]) -> Option<usize> {
    match answer {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => {
            let s = s.trim();
            if let Some(i) = options.iter().position(|o| o.trim().eq_ignore_ascii_case(s)) {
                return Some(i);
            }
            let letter = s.trim_end_matches([')', '.', ':']);
            let mut chars = letter.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    Some((c.to_ascii_uppercase() as u8 - b'A') as usize)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

#[derive(Deserialize)]
struct FlashcardWire {
    #[serde(alias = "q", alias = "question", alias = "term")]
    front: String,
    #[serde(alias = "a", alias = "answer", alias = "definition")]
    back: String,
}

fn decode_flashcards(value: Value) -> Result<FlashcardSet, String> {
    let cards = decode_items(items(value, OutputShape::FlashcardSet)?, |item| {
        let wire: FlashcardWire = serde_json::from_value(item).map_err(|e| e.to_string())?;
        if wire.front.trim().is_empty() || wire.back.trim().is_empty() {
            return Err("card side is empty".into());
        }
        Ok(Flashcard {
            front: wire.front,
            back: wire.back,
        })
    })?;
    Ok(FlashcardSet {
        cards,
        generation_failed: false,
    })
}
