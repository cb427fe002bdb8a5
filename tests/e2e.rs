//! End-to-end tests against a live model provider.
//!
//! They make real LLM API calls and are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly
//! requested. The provider is resolved the same way as in production
//! (`GEMINI_API_KEY`, `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, …).
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use smartstudy_ai::{
    GenerationRequest, StructuredResult, StudyConfig, StudyService, TaskKind,
};

const MATERIAL: &str = "Photosynthesis converts light energy into chemical energy. \
In the light-dependent reactions, chlorophyll in the thylakoid membranes absorbs light \
and splits water, releasing oxygen. The Calvin cycle in the stroma then uses ATP and \
NADPH to fix carbon dioxide into glucose.";

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

fn live_service() -> StudyService {
    let config = StudyConfig::builder()
        .api_timeout_secs(120)
        .build()
        .expect("valid config");
    StudyService::from_config(config).expect("a configured LLM provider")
}

#[tokio::test]
async fn test_live_summary() {
    e2e_skip_unless_ready!();
    let service = live_service();

    let outcome = service
        .generate(GenerationRequest::text("e2e", TaskKind::Summary, MATERIAL))
        .await
        .expect("generation succeeds");

    println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
    match outcome.note.result {
        StructuredResult::Summary(ref s) => assert!(!s.text.trim().is_empty()),
        ref other => panic!("expected a summary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_live_mcq_is_well_formed() {
    e2e_skip_unless_ready!();
    let service = live_service();

    let outcome = service
        .generate(GenerationRequest::text("e2e", TaskKind::Mcq, MATERIAL))
        .await
        .expect("generation succeeds");

    if let Some(ref reason) = outcome.fallback {
        println!("fallback: {reason}");
        return;
    }
    let StructuredResult::McqSet(ref set) = outcome.note.result else {
        panic!("expected an MCQ set");
    };
    assert!(!set.questions.is_empty());
    for q in &set.questions {
        assert_eq!(q.options.len(), 4);
        assert!(q.correct_option().is_some());
    }
}

#[tokio::test]
async fn test_live_flashcards_then_regenerate() {
    e2e_skip_unless_ready!();
    let service = live_service();

    let summary = service
        .generate(GenerationRequest::text("e2e", TaskKind::Summary, MATERIAL))
        .await
        .expect("generation succeeds");
    let cards = service
        .regenerate("e2e", &summary.note.id, TaskKind::Flashcard, None)
        .await
        .expect("regeneration succeeds");

    println!("{}", smartstudy_ai::render_plain(&cards.note.result));
    assert_eq!(service.notes("e2e").await.unwrap().len(), 2);
}
