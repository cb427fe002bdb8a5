//! Behaviour of the response extractor on realistic model replies.
//!
//! No model and no network: every case is a literal reply string.

use smartstudy_ai::pipeline::extract::extract_shape;
use smartstudy_ai::{
    extract, Extraction, ExtractionFallback, Flashcard, FlashcardSet, McqQuestion, McqSet,
    OutputShape, StructuredResult, Summary, TaskKind,
};

fn summary(text: &str, points: &[&str]) -> StructuredResult {
    StructuredResult::Summary(Summary {
        text: text.into(),
        key_points: points.iter().map(|p| p.to_string()).collect(),
    })
}

fn validated(raw: &str, task: TaskKind) -> StructuredResult {
    match extract(raw, task) {
        Extraction::Validated(result) => result,
        other => panic!("expected a validated result for {raw:?}, got {other:?}"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn fenced_json_after_prose() {
    let raw = "Here is your summary:\n```json\n{\"text\":\"A\",\"key_points\":[\"B\"]}\n```";
    assert_eq!(validated(raw, TaskKind::Summary), summary("A", &["B"]));
}

#[test]
fn apology_for_mcq_is_a_failed_set() {
    let extraction = extract("Sorry, I cannot process this.", TaskKind::Mcq);
    assert_eq!(extraction.fallback_reason(), Some(&ExtractionFallback::NoJson));
    assert_eq!(
        extraction.into_result(),
        StructuredResult::McqSet(McqSet {
            questions: vec![],
            generation_failed: true,
        })
    );
}

#[test]
fn bare_key_and_trailing_comma_are_repaired() {
    let raw = r#"{"text":"A", key_points:["B",]}"#;
    assert_eq!(validated(raw, TaskKind::Summary), summary("A", &["B"]));
}

#[test]
fn apology_for_summary_keeps_the_prose() {
    let extraction = extract("Sorry, I cannot process this.", TaskKind::Summary);
    assert!(extraction.is_fallback());
    assert_eq!(
        extraction.into_result(),
        summary("Sorry, I cannot process this.", &[])
    );
}

#[test]
fn empty_reply_is_reported_as_empty() {
    for raw in ["", "   \n\t"] {
        let extraction = extract(raw, TaskKind::Flashcard);
        assert_eq!(extraction.fallback_reason(), Some(&ExtractionFallback::EmptyResponse));
        assert!(extraction.result().generation_failed());
    }
}

#[test]
fn legacy_flashcard_keys_are_accepted() {
    let raw = r#"{"flashcards":[{"q":"What is ATP?","a":"Energy currency."}]}"#;
    assert_eq!(
        validated(raw, TaskKind::Flashcard),
        StructuredResult::FlashcardSet(FlashcardSet {
            cards: vec![Flashcard {
                front: "What is ATP?".into(),
                back: "Energy currency.".into(),
            }],
            generation_failed: false,
        })
    );
}

#[test]
fn legacy_mcq_answer_text_resolves_to_an_index() {
    let raw = r#"```
{"mcqs":[{"q":"Powerhouse of the cell?","options":["Nucleus","Mitochondria","Ribosome","Golgi"],"answer":"Mitochondria"}]}
```"#;
    let StructuredResult::McqSet(set) = validated(raw, TaskKind::Mcq) else {
        panic!("expected MCQ set");
    };
    assert_eq!(set.questions[0].correct_index, 1);
    assert_eq!(set.questions[0].correct_option(), Some("Mitochondria"));
}

#[test]
fn smart_quotes_are_normalised() {
    let raw = "{\u{201C}cards\u{201D}: [{\u{201C}front\u{201D}: \u{201C}Q\u{201D}, \u{201C}back\u{201D}: \u{201C}A\u{201D}}]}";
    let StructuredResult::FlashcardSet(set) = validated(raw, TaskKind::Flashcard) else {
        panic!("expected flashcards");
    };
    assert_eq!(set.cards.len(), 1);
}

#[test]
fn invalid_items_are_dropped_but_valid_ones_kept() {
    let raw = r#"{"questions":[
        {"question":"Good?","options":["a","b","c","d"],"correct_index":0},
        {"question":"Three options","options":["a","b","c"],"correct_index":0},
        {"question":"Out of range","options":["a","b","c","d"],"correct_index":7}
    ]}"#;
    let StructuredResult::McqSet(set) = validated(raw, TaskKind::Mcq) else {
        panic!("expected MCQ set");
    };
    assert_eq!(set.questions.len(), 1);
    assert_eq!(set.questions[0].question, "Good?");
}

#[test]
fn wrong_shape_is_a_shape_mismatch() {
    let extraction = extract(r#"{"text":"A summary"}"#, TaskKind::Flashcard);
    assert!(matches!(
        extraction.fallback_reason(),
        Some(ExtractionFallback::ShapeMismatch { .. })
    ));
}

// ── Properties ───────────────────────────────────────────────────────────────

#[test]
fn identity_on_well_formed_json() {
    let mcq = StructuredResult::McqSet(McqSet {
        questions: vec![McqQuestion {
            question: "2+2?".into(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_index: 1,
        }],
        generation_failed: false,
    });
    let cards = StructuredResult::FlashcardSet(FlashcardSet {
        cards: vec![
            Flashcard {
                front: "What is ATP?".into(),
                back: "Energy currency.".into(),
            },
            Flashcard {
                front: "Where is it made?".into(),
                back: "Mitochondria.".into(),
            },
        ],
        generation_failed: false,
    });
    let cases = [
        (summary("Cells divide.", &["Mitosis", "Meiosis"]), OutputShape::Summary),
        (summary("A", &["", "B"]), OutputShape::Summary),
        (mcq, OutputShape::McqSet),
        (cards, OutputShape::FlashcardSet),
    ];
    for (value, shape) in cases {
        let raw = serde_json::to_string(&value).unwrap();
        assert_eq!(extract_shape(&raw, shape), Extraction::Validated(value));
    }
}

#[test]
fn surrounding_noise_does_not_change_the_result() {
    let core = r#"{"cards":[{"front":"F","back":"B"}]}"#;
    let expected = validated(core, TaskKind::Flashcard);
    for raw in [
        format!("Sure! {core} Hope this helps."),
        format!("```json\n{core}\n```"),
        format!("Here you go:\n\n```\n{core}\n```\nGood luck with your exams!"),
    ] {
        assert_eq!(validated(&raw, TaskKind::Flashcard), expected, "reply: {raw}");
    }
}

#[test]
fn extraction_is_idempotent() {
    let raw = "Result:\n```json\n{text: 'Photosynthesis makes sugar.', key_points: ['Light', 'CO2',],}\n```";
    let first = validated(raw, TaskKind::Summary);
    let again = validated(&serde_json::to_string(&first).unwrap(), TaskKind::Summary);
    assert_eq!(first, again);
}

#[test]
fn hostile_inputs_never_panic() {
    let inputs = [
        "{",
        "}",
        "[[[[",
        "```",
        "```json\n```",
        "{\"questions\": [",
        "'unterminated",
        "{\"text\": \"\\",
        "null",
        "42",
        "\u{FEFF}\u{200B}",
        "{a:}",
        "[,]",
    ];
    for raw in inputs {
        for task in TaskKind::ALL {
            let extraction = extract(raw, task);
            assert_eq!(extraction.result().shape(), task.shape(), "input {raw:?}");
        }
    }
}
