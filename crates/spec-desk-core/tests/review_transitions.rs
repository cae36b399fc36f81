// crates/spec-desk-core/tests/review_transitions.rs
// ============================================================================
// Module: Review Transition Tests
// Description: Tests for the pure dual-lane transition function.
// Purpose: Pin guard order, lane independence, and selection regression.
// Dependencies: spec-desk-core
// ============================================================================
//! ## Overview
//! Exercises the pure lane transition: guards fire in contract order, each
//! lane action touches only its own fields, and a selection change regresses
//! every lane field to its pending baseline.

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

use spec_desk_core::AiConfirmStatus;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::ItemFieldStateId;
use spec_desk_core::KeyReviewStateId;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::Lane;
use spec_desk_core::LaneAction;
use spec_desk_core::LaneActionKind;
use spec_desk_core::LaneSlot;
use spec_desk_core::ReviewErrorKind;
use spec_desk_core::SlotRef;
use spec_desk_core::Timestamp;
use spec_desk_core::UserAcceptStatus;
use spec_desk_core::lane_transition;

fn sample_row() -> KeyReviewStateRow {
    KeyReviewStateRow {
        id: KeyReviewStateId::from_raw(1).expect("nonzero review id"),
        category: Category::new("mice"),
        slot: SlotRef::GridKey {
            item_field_state_id: ItemFieldStateId::from_raw(10).expect("nonzero ifs id"),
        },
        selected_value: Some("59".to_string()),
        selected_candidate_id: Some(CandidateId::new("cand_a")),
        primary: LaneSlot::pending_baseline(),
        shared: LaneSlot::pending_baseline(),
    }
}

fn accept_action(value: &str, candidate: &str) -> LaneAction {
    LaneAction {
        lane: Lane::Primary,
        kind: LaneActionKind::Accept,
        selected_value: value.to_string(),
        candidate_id: Some(CandidateId::new(candidate)),
        confidence: None,
        candidate_id_required: true,
        advance_ai_lane: false,
        at: Timestamp::from_unix_millis(1_000),
    }
}

/// Verifies accept mutates only the user-accept fields of its lane.
#[test]
fn accept_touches_only_its_lane() {
    let pre = sample_row();
    let post = lane_transition(&pre, &accept_action("59", "cand_a")).expect("accept applies");

    assert_eq!(post.primary.user_accept_status, UserAcceptStatus::Accepted);
    assert_eq!(post.primary.user_accept_at, Some(Timestamp::from_unix_millis(1_000)));
    assert_eq!(post.primary.ai_confirm_status, AiConfirmStatus::Pending);
    assert_eq!(post.primary.ai_confirm_at, None);
    assert_eq!(post.shared, LaneSlot::pending_baseline());
}

/// Verifies confirm mutates only the AI-confirm fields of its lane.
#[test]
fn confirm_touches_only_its_lane() {
    let pre = sample_row();
    let action = LaneAction {
        lane: Lane::Shared,
        kind: LaneActionKind::Confirm,
        selected_value: "59".to_string(),
        candidate_id: Some(CandidateId::new("cand_a")),
        confidence: Some(0.92),
        candidate_id_required: true,
        advance_ai_lane: true,
        at: Timestamp::from_unix_millis(2_000),
    };
    let post = lane_transition(&pre, &action).expect("confirm applies");

    assert_eq!(post.shared.ai_confirm_status, AiConfirmStatus::Confirmed);
    assert_eq!(post.shared.ai_confirm_confidence, Some(0.92));
    assert_eq!(post.shared.user_accept_status, UserAcceptStatus::Pending);
    assert_eq!(post.primary, LaneSlot::pending_baseline());
}

/// Verifies the candidate-id guard fires before the unknown-value guard.
#[test]
fn candidate_guard_precedes_unknown_guard() {
    let pre = sample_row();
    let mut action = accept_action("unk", "cand_a");
    action.candidate_id = None;
    assert_eq!(lane_transition(&pre, &action), Err(ReviewErrorKind::CandidateIdRequired));

    let action = accept_action("unk", "cand_a");
    assert_eq!(lane_transition(&pre, &action), Err(ReviewErrorKind::UnknownValueNotActionable));
}

/// Verifies the unknown guard is case-insensitive over the normalized form.
#[test]
fn unknown_guard_is_case_insensitive() {
    let pre = sample_row();
    let action = accept_action(" UNK ", "cand_a");
    assert_eq!(lane_transition(&pre, &action), Err(ReviewErrorKind::UnknownValueNotActionable));
}

/// Verifies a changed selection regresses all four lane fields.
#[test]
fn selection_change_regresses_both_lanes() {
    let mut pre = sample_row();
    pre.primary.user_accept_status = UserAcceptStatus::Accepted;
    pre.primary.user_accept_at = Some(Timestamp::from_unix_millis(500));
    pre.shared.ai_confirm_status = AiConfirmStatus::Confirmed;
    pre.shared.ai_confirm_confidence = Some(0.9);
    pre.shared.ai_confirm_at = Some(Timestamp::from_unix_millis(600));

    let post =
        lane_transition(&pre, &accept_action("62", "cand_b")).expect("changed selection applies");

    assert_eq!(post.selected_value.as_deref(), Some("62"));
    assert_eq!(post.selected_candidate_id, Some(CandidateId::new("cand_b")));
    assert_eq!(post.shared, LaneSlot::pending_baseline());
    assert_eq!(post.primary.user_accept_status, UserAcceptStatus::Accepted);
    assert_eq!(post.primary.ai_confirm_confidence, None);
    assert_eq!(post.primary.ai_confirm_at, None);
}

/// Verifies a stable selection does not regress recorded lane state.
#[test]
fn stable_selection_keeps_lane_state() {
    let mut pre = sample_row();
    pre.shared.ai_confirm_status = AiConfirmStatus::Confirmed;
    pre.shared.ai_confirm_confidence = Some(0.88);

    let post = lane_transition(&pre, &accept_action("59", "cand_a")).expect("accept applies");
    assert_eq!(post.shared.ai_confirm_status, AiConfirmStatus::Confirmed);
    assert_eq!(post.shared.ai_confirm_confidence, Some(0.88));
}

/// Verifies accepting twice with the same pair yields the same row.
#[test]
fn accept_is_idempotent() {
    let pre = sample_row();
    let action = accept_action("59", "cand_a");
    let once = lane_transition(&pre, &action).expect("first accept applies");
    let twice = lane_transition(&once, &action).expect("second accept applies");
    assert_eq!(once, twice);
}

/// Verifies a row with no recorded selection adopts one without regression.
#[test]
fn fresh_row_adopts_selection() {
    let mut pre = sample_row();
    pre.selected_value = None;
    pre.selected_candidate_id = None;
    pre.shared.ai_confirm_confidence = Some(0.7);

    let post = lane_transition(&pre, &accept_action("59", "cand_a")).expect("accept applies");
    assert_eq!(post.selected_value.as_deref(), Some("59"));
    assert_eq!(post.shared.ai_confirm_confidence, Some(0.7));
}

/// Verifies confirm without the advance flag leaves the lane pending.
#[test]
fn confirm_without_advance_stays_pending() {
    let pre = sample_row();
    let action = LaneAction {
        lane: Lane::Primary,
        kind: LaneActionKind::Confirm,
        selected_value: "59".to_string(),
        candidate_id: Some(CandidateId::new("cand_a")),
        confidence: Some(0.8),
        candidate_id_required: true,
        advance_ai_lane: false,
        at: Timestamp::from_unix_millis(3_000),
    };
    let post = lane_transition(&pre, &action).expect("confirm applies");
    assert_eq!(post.primary.ai_confirm_status, AiConfirmStatus::Pending);
    assert_eq!(post.primary.ai_confirm_at, Some(Timestamp::from_unix_millis(3_000)));
}
