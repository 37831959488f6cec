//! End-to-end validation scenarios: strict and prefer enforcement.

mod common;

use common::{fragment, test_engine};
use veridex::{
    AuditRecord, CandidateStep, Confidence, Method, Mode, PriorityTag, REFUSAL_MESSAGE,
};

/// A fully grounded linear-equation answer is accepted in strict mode.
#[test]
fn grounded_answer_is_accepted_in_strict_mode() {
    let (engine, _) = test_engine();
    engine
        .index_fragments(&[fragment(
            "alg_p12_c3",
            "algebra.pdf",
            12,
            "To solve 2x + 5 = 13, subtract 5 from both sides to get 2x = 8, \
             then divide by 2 to get x = 4.",
            PriorityTag::Textbook,
            true,
        )])
        .unwrap();

    let steps = vec![
        CandidateStep::new("Subtract 5 from both sides: 2x = 8"),
        CandidateStep::new("Divide both sides by 2: x = 4"),
    ];
    let decision = engine
        .validate_answer("solve 2x + 5 = 13", &steps, Mode::Strict, None)
        .unwrap();

    assert!(decision.accepted);
    assert!(decision.refusal_reason.is_none());
    assert_eq!(decision.supported_count(), 2);
    for result in &decision.results {
        assert!(result.supported);
        assert_eq!(result.method, Method::Symbolic);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.matched_fragment_id.is_some());
    }
}

/// An answer with one ungrounded step is refused in strict mode but
/// returned (flagged) in prefer mode.
#[test]
fn strict_and_prefer_diverge_on_an_ungrounded_step() {
    let (engine, _) = test_engine();
    engine
        .index_fragments(&[fragment(
            "alg_p14_c1",
            "algebra.pdf",
            14,
            "The equation x^2 = 9 has two solutions because squaring \
             discards the sign.",
            PriorityTag::Slides,
            true,
        )])
        .unwrap();

    // x = 3 drops the negative root, so the algebra does not follow
    let steps = vec![CandidateStep::new("Take square roots: x = 3")];

    let strict = engine
        .validate_answer("solve x^2 = 9", &steps, Mode::Strict, None)
        .unwrap();
    assert!(!strict.accepted);
    assert_eq!(strict.refusal_reason.as_deref(), Some(REFUSAL_MESSAGE));
    assert!(!strict.results[0].supported);

    let prefer = engine
        .validate_answer("solve x^2 = 9", &steps, Mode::Prefer, None)
        .unwrap();
    assert!(prefer.accepted);
    assert!(prefer.refusal_reason.is_none());
    assert!(!prefer.results[0].supported, "flag survives in prefer mode");
}

/// A step that restates fragment prose verbatim is supported textually.
#[test]
fn verbatim_prose_step_is_supported_textually() {
    let (engine, _) = test_engine();
    engine
        .index_fragments(&[fragment(
            "alg_p15_c0",
            "algebra.pdf",
            15,
            "remember to always check the answer by substituting back into \
             the original equation",
            PriorityTag::Normal,
            true,
        )])
        .unwrap();

    let steps = vec![CandidateStep::new(
        "always check the answer by substituting back into the original equation",
    )];
    let decision = engine
        .validate_answer("how do I verify a solution", &steps, Mode::Strict, None)
        .unwrap();

    assert!(decision.accepted);
    let result = &decision.results[0];
    assert_eq!(result.method, Method::Textual);
    assert!(result.similarity >= 0.85);
    assert_eq!(result.confidence, Confidence::High);
}

/// A paraphrase with high lexical overlap but no shared contiguous run is
/// rejected even when cosine similarity clears the threshold.
#[test]
fn scattered_overlap_without_a_shared_run_is_unsupported() {
    let (engine, _) = test_engine();
    engine
        .index_fragments(&[fragment(
            "alg_p16_c0",
            "algebra.pdf",
            16,
            "check the answer by substituting into the original equation",
            PriorityTag::Normal,
            true,
        )])
        .unwrap();

    // Same words, reordered: cosine is 1.0 for a bag-of-words embedder
    let steps = vec![CandidateStep::new(
        "substituting the original answer by into check equation the",
    )];
    let decision = engine
        .validate_answer("verify a solution", &steps, Mode::Strict, None)
        .unwrap();

    assert!(!decision.accepted);
    let result = &decision.results[0];
    assert!(!result.supported);
    assert!(result.similarity > 0.9, "cosine alone would have accepted this");
}

#[test]
fn empty_index_refuses_in_strict_mode() {
    let (engine, _) = test_engine();
    let steps = vec![CandidateStep::new("x = 4")];
    let decision = engine
        .validate_answer("solve 2x + 5 = 13", &steps, Mode::Strict, None)
        .unwrap();

    assert!(!decision.accepted);
    assert_eq!(decision.refusal_reason.as_deref(), Some(REFUSAL_MESSAGE));
    assert_eq!(decision.results[0].similarity, 0.0);
    assert!(decision.results[0].matched_fragment_id.is_none());
}

#[test]
fn validation_appends_an_audit_record_after_the_retrieval_record() {
    let (engine, audit) = test_engine();
    engine
        .index_fragments(&[fragment(
            "f1",
            "doc.pdf",
            1,
            "we know that 2x = 8 here",
            PriorityTag::Normal,
            true,
        )])
        .unwrap();

    let steps = vec![CandidateStep::new("x = 4")];
    engine
        .validate_answer("solve for x", &steps, Mode::Strict, None)
        .unwrap();

    let records = audit.records();
    assert_eq!(records.len(), 2);
    assert!(matches!(records[0], AuditRecord::Retrieval(_)));
    match &records[1] {
        AuditRecord::Validation(v) => {
            assert_eq!(v.total_steps, 1);
            assert_eq!(v.supported_steps, 1);
            assert!(v.accepted);
            assert_eq!(v.mode, Mode::Strict);
        }
        other => panic!("expected validation record, got {other:?}"),
    }
}
