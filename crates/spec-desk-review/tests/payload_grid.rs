// crates/spec-desk-review/tests/payload_grid.rs
// ============================================================================
// Module: Grid Payload Tests
// Description: Tests for the pure grid payload builder.
// Purpose: Pin color mapping, candidate ordering, and selection synthesis.
// Dependencies: spec-desk-core, spec-desk-review
// ============================================================================
//! ## Overview
//! Exercises the grid payload builder over in-memory rows: the confidence
//! color bands, the `below_pass_target` override, the top-ordered candidate
//! deciding source/method/tier, and synthesis of a backing candidate when a
//! recorded selection lost its row.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::Evidence;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemFieldStateId;
use spec_desk_core::ItemFieldStateRow;
use spec_desk_core::KeyReviewStateId;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::LaneSlot;
use spec_desk_core::ProductId;
use spec_desk_core::SlotRef;
use spec_desk_core::SourceRef;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_review::ConfidenceColor;
use spec_desk_review::GridFieldInputs;
use spec_desk_review::REASON_BELOW_PASS_TARGET;
use spec_desk_review::build_field_state;
use spec_desk_review::confidence_color;

fn state(confidence: f64) -> ItemFieldStateRow {
    ItemFieldStateRow {
        id: ItemFieldStateId::from_raw(1).expect("nonzero id"),
        category: Category::new("mice"),
        product_id: ProductId::new("prod-a"),
        field_key: FieldKey::new("weight"),
        value: Some("59".to_string()),
        confidence,
        source: ValueSource::Pipeline,
        overridden: false,
        needs_ai_review: false,
        ai_review_complete: false,
        accepted_candidate_id: None,
        constraint_conflict: false,
    }
}

fn candidate(id: &str, host: &str, method: &str, tier: u8, score: f64) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(id),
        value: "59".to_string(),
        normalized_value: "59".to_string(),
        score,
        rank: 1,
        source: SourceRef {
            host: host.to_string(),
            root_domain: host.to_string(),
            method: method.to_string(),
            tier,
        },
        evidence: Evidence {
            snippet_id: format!("snip-{id}"),
            quote: "weighs 59 grams".to_string(),
            url: format!("https://{host}/page"),
            retrieved_at: Timestamp::from_unix_millis(1_700_000_000_000),
        },
        is_component_field: false,
        is_list_field: false,
        component_type: None,
    }
}

fn review(selected_candidate: Option<&str>) -> KeyReviewStateRow {
    KeyReviewStateRow {
        id: KeyReviewStateId::from_raw(1).expect("nonzero id"),
        category: Category::new("mice"),
        slot: SlotRef::GridKey {
            item_field_state_id: ItemFieldStateId::from_raw(1).expect("nonzero id"),
        },
        selected_value: Some("59".to_string()),
        selected_candidate_id: selected_candidate.map(CandidateId::new),
        primary: LaneSlot::pending_baseline(),
        shared: LaneSlot::pending_baseline(),
    }
}

/// Verifies the confidence color bands.
#[test]
fn color_bands_match_contract() {
    assert_eq!(confidence_color(0.0), ConfidenceColor::Gray);
    assert_eq!(confidence_color(0.3), ConfidenceColor::Red);
    assert_eq!(confidence_color(0.59), ConfidenceColor::Red);
    assert_eq!(confidence_color(0.6), ConfidenceColor::Yellow);
    assert_eq!(confidence_color(0.84), ConfidenceColor::Yellow);
    assert_eq!(confidence_color(0.85), ConfidenceColor::Green);
    assert_eq!(confidence_color(1.0), ConfidenceColor::Green);
}

/// Verifies the summary's below-target flag forces red with its reason.
#[test]
fn below_pass_target_forces_red() {
    let state = state(0.95);
    let field = build_field_state(&GridFieldInputs {
        state: &state,
        candidates: &[],
        review: None,
        below_pass_target: true,
    });
    assert_eq!(field.selected.color, ConfidenceColor::Red);
    assert!(field.reason_codes.iter().any(|code| code == REASON_BELOW_PASS_TARGET));
}

/// Verifies the top entry by `(tier asc, score desc)` decides the header.
#[test]
fn top_candidate_decides_source_method_tier() {
    let state = state(0.9);
    let candidates = vec![
        candidate("cand_low_tier_low_score", "b.example.com", "template", 1, 0.5),
        candidate("cand_low_tier_high_score", "a.example.com", "dom", 1, 0.9),
        candidate("cand_high_tier", "c.example.com", "llm", 3, 0.99),
    ];
    let field = build_field_state(&GridFieldInputs {
        state: &state,
        candidates: &candidates,
        review: None,
        below_pass_target: false,
    });

    assert_eq!(field.source.as_deref(), Some("a.example.com"));
    assert_eq!(field.method.as_deref(), Some("dom"));
    assert_eq!(field.tier, Some(1));
    assert_eq!(field.candidate_count, field.candidates.len());
    assert_eq!(field.candidates[0].candidate_id.as_str(), "cand_low_tier_high_score");
}

/// Verifies a lost selection synthesizes a backing candidate.
#[test]
fn lost_selection_synthesizes_backing_row() {
    let state = state(0.9);
    let candidates = vec![candidate("cand_present", "a.example.com", "dom", 1, 0.9)];
    let review = review(Some("cand_vanished"));
    let field = build_field_state(&GridFieldInputs {
        state: &state,
        candidates: &candidates,
        review: Some(&review),
        below_pass_target: false,
    });

    assert_eq!(field.candidate_count, 2);
    let synthesized = field
        .candidates
        .iter()
        .find(|candidate| candidate.candidate_id.as_str() == "cand_vanished")
        .expect("synthesized row present");
    assert!(synthesized.synthesized);
    assert_eq!(synthesized.value, "59");
    // The synthesized row backs the UI without displacing real evidence.
    assert_eq!(field.candidates[0].candidate_id.as_str(), "cand_present");
}

/// Verifies a selection matching a stored candidate synthesizes nothing.
#[test]
fn matching_selection_synthesizes_nothing() {
    let state = state(0.9);
    let candidates = vec![candidate("cand_present", "a.example.com", "dom", 1, 0.9)];
    let review = review(Some("cand_present"));
    let field = build_field_state(&GridFieldInputs {
        state: &state,
        candidates: &candidates,
        review: Some(&review),
        below_pass_target: false,
    });
    assert_eq!(field.candidate_count, 1);
    assert!(field.candidates.iter().all(|candidate| !candidate.synthesized));
}
