// crates/spec-desk-store-sqlite/tests/lane_actions.rs
// ============================================================================
// Module: Lane Action Tests
// Description: Tests for transactional lane applies on review rows.
// Purpose: Pin slot isolation, guards, regression, and audit recording.
// Dependencies: spec-desk-core, spec-desk-store-sqlite, tempfile
// ============================================================================
//! ## Overview
//! Exercises `apply_lane_state` end-to-end on a real `SQLite` file: two rows
//! sharing a selected candidate stay isolated, guards reject in contract
//! order, the returned row equals the persisted row, and every transition
//! lands in the audit log.

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
use spec_desk_core::FieldKey;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ItemRecord;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::Lane;
use spec_desk_core::LaneAction;
use spec_desk_core::LaneActionKind;
use spec_desk_core::ProductId;
use spec_desk_core::ReviewErrorKind;
use spec_desk_core::SlotRef;
use spec_desk_core::Timestamp;
use spec_desk_core::UserAcceptStatus;
use spec_desk_core::ValueSource;
use spec_desk_store_sqlite::ItemFieldStateSeed;
use spec_desk_store_sqlite::KeyReviewSeed;
use spec_desk_store_sqlite::Propagation;
use spec_desk_store_sqlite::SlotLocator;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreConfig;
use spec_desk_store_sqlite::SqliteSpecStoreError;

fn open_store() -> (SqliteSpecStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteSpecStoreConfig::for_path(dir.path().join("mice.sqlite"));
    let store = SqliteSpecStore::open(&config).expect("store opens");
    (store, dir)
}

fn category() -> Category {
    Category::new("mice")
}

/// Seeds a grid slot with a selected value and candidate, returning its
/// review row.
fn seed_grid_slot(
    store: &SqliteSpecStore,
    product_id: &str,
    field_key: &str,
    value: &str,
    candidate: Option<&str>,
) -> KeyReviewStateRow {
    store
        .upsert_item(&ItemRecord {
            category: category(),
            product_id: ProductId::new(product_id),
            identity: ItemIdentity {
                brand: "Logi".to_string(),
                model: product_id.to_string(),
                variant: None,
            },
            lifecycle: ItemLifecycle::Active,
        })
        .expect("item upserts");
    store
        .upsert_item_field_state(&ItemFieldStateSeed {
            category: category(),
            product_id: ProductId::new(product_id),
            field_key: FieldKey::new(field_key),
            value: Some(value.to_string()),
            confidence: 0.9,
            source: ValueSource::Pipeline,
            overridden: false,
            needs_ai_review: false,
            ai_review_complete: false,
            accepted_candidate_id: None,
            constraint_conflict: false,
        })
        .expect("field state upserts");
    store
        .upsert_key_review_state(&KeyReviewSeed {
            category: category(),
            locator: SlotLocator::Grid {
                product_id: ProductId::new(product_id),
                field_key: FieldKey::new(field_key),
            },
            selected_value: Some(value.to_string()),
            selected_candidate_id: candidate.map(CandidateId::new),
        })
        .expect("review row seeds")
}

fn accept(lane: Lane, value: &str, candidate: &str) -> LaneAction {
    LaneAction {
        lane,
        kind: LaneActionKind::Accept,
        selected_value: value.to_string(),
        candidate_id: Some(CandidateId::new(candidate)),
        confidence: None,
        candidate_id_required: true,
        advance_ai_lane: false,
        at: Timestamp::from_unix_millis(1_000),
    }
}

/// Verifies two rows sharing a selected candidate id stay isolated.
#[test]
fn grid_primary_accept_is_slot_isolated() {
    let (store, _dir) = open_store();
    let weight = seed_grid_slot(&store, "prod-a", "weight", "59", Some("cand_collide"));
    let dpi = seed_grid_slot(&store, "prod-a", "dpi", "26000", Some("cand_collide"));

    let post = store
        .apply_lane_state(
            &category(),
            &weight.slot,
            &accept(Lane::Primary, "59", "cand_collide"),
            &Propagation::GridSelection,
        )
        .expect("accept applies");
    assert_eq!(post.primary.user_accept_status, UserAcceptStatus::Accepted);

    let untouched = store
        .get_key_review_state(&category(), &dpi.slot)
        .expect("dpi row loads")
        .expect("dpi row present");
    assert_eq!(untouched, dpi);
}

/// Verifies the unknown guards fire in contract order against a stored row.
#[test]
fn unknown_selection_rejects_in_guard_order() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "sensor", "unk", None);

    let mut missing_candidate = accept(Lane::Primary, "unk", "ignored");
    missing_candidate.candidate_id = None;
    let error = store
        .apply_lane_state(&category(), &row.slot, &missing_candidate, &Propagation::None)
        .expect_err("missing candidate rejected");
    assert!(matches!(
        error,
        SqliteSpecStoreError::Rejected(ReviewErrorKind::CandidateIdRequired)
    ));

    let error = store
        .apply_lane_state(
            &category(),
            &row.slot,
            &accept(Lane::Primary, "unk", "cand_u"),
            &Propagation::None,
        )
        .expect_err("unknown value rejected");
    assert!(matches!(
        error,
        SqliteSpecStoreError::Rejected(ReviewErrorKind::UnknownValueNotActionable)
    ));

    let untouched = store
        .get_key_review_state(&category(), &row.slot)
        .expect("row loads")
        .expect("row present");
    assert_eq!(untouched, row);
}

/// Verifies the returned row equals the persisted row field-for-field.
#[test]
fn returned_row_equals_persisted_row() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "weight", "59", Some("cand_a"));
    let returned = store
        .apply_lane_state(
            &category(),
            &row.slot,
            &accept(Lane::Shared, "59", "cand_a"),
            &Propagation::None,
        )
        .expect("accept applies");
    let persisted = store
        .get_key_review_state(&category(), &row.slot)
        .expect("row loads")
        .expect("row present");
    assert_eq!(returned, persisted);
}

/// Verifies accepting twice with the same pair yields the same row.
#[test]
fn accept_is_idempotent_through_the_store() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "weight", "59", Some("cand_a"));
    let action = accept(Lane::Primary, "59", "cand_a");
    let once = store
        .apply_lane_state(&category(), &row.slot, &action, &Propagation::GridSelection)
        .expect("first accept");
    let twice = store
        .apply_lane_state(&category(), &row.slot, &action, &Propagation::GridSelection)
        .expect("second accept");
    assert_eq!(once, twice);
}

/// Verifies a selection change regresses confirmed state before applying.
#[test]
fn selection_change_regresses_persisted_lanes() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "weight", "59", Some("cand_a"));

    let confirm = LaneAction {
        lane: Lane::Primary,
        kind: LaneActionKind::Confirm,
        selected_value: "59".to_string(),
        candidate_id: Some(CandidateId::new("cand_a")),
        confidence: Some(0.93),
        candidate_id_required: true,
        advance_ai_lane: true,
        at: Timestamp::from_unix_millis(2_000),
    };
    let confirmed = store
        .apply_lane_state(&category(), &row.slot, &confirm, &Propagation::None)
        .expect("confirm applies");
    assert_eq!(confirmed.primary.ai_confirm_status, AiConfirmStatus::Confirmed);

    let switched = store
        .apply_lane_state(
            &category(),
            &row.slot,
            &accept(Lane::Primary, "62", "cand_b"),
            &Propagation::None,
        )
        .expect("changed accept applies");
    assert_eq!(switched.primary.ai_confirm_status, AiConfirmStatus::Pending);
    assert_eq!(switched.primary.ai_confirm_confidence, None);
    assert_eq!(switched.primary.ai_confirm_at, None);
    assert_eq!(switched.primary.user_accept_status, UserAcceptStatus::Accepted);
    assert_eq!(switched.selected_candidate_id, Some(CandidateId::new("cand_b")));
}

/// Verifies grid accepts record the selection onto the field state row.
#[test]
fn grid_accept_records_selection_on_field_state() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "weight", "59", None);
    store
        .apply_lane_state(
            &category(),
            &row.slot,
            &accept(Lane::Primary, "62", "cand_b"),
            &Propagation::GridSelection,
        )
        .expect("accept applies");

    let state = store
        .get_item_field_state(&category(), &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("field state loads")
        .expect("field state present");
    assert_eq!(state.value.as_deref(), Some("62"));
    assert_eq!(state.accepted_candidate_id, Some(CandidateId::new("cand_b")));
    assert_eq!(state.source, ValueSource::User);
}

/// Verifies every transition lands in the audit log.
#[test]
fn transitions_append_to_audit() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "weight", "59", Some("cand_a"));
    store
        .apply_lane_state(
            &category(),
            &row.slot,
            &accept(Lane::Primary, "59", "cand_a"),
            &Propagation::None,
        )
        .expect("accept applies");
    store
        .apply_lane_state(
            &category(),
            &row.slot,
            &accept(Lane::Shared, "59", "cand_a"),
            &Propagation::None,
        )
        .expect("shared accept applies");

    let audits = store.audits_for_slot(&category(), &row.slot).expect("audits load");
    assert_eq!(audits.len(), 2);
    assert_eq!(audits[0].lane, Lane::Primary);
    assert_eq!(audits[1].lane, Lane::Shared);
    assert_eq!(audits[0].action, LaneActionKind::Accept);
}

/// Verifies confirm records a candidate review row for the slot.
#[test]
fn confirm_records_candidate_review() {
    let (store, _dir) = open_store();
    let row = seed_grid_slot(&store, "prod-a", "weight", "59", Some("cand_a"));
    let confirm = LaneAction {
        lane: Lane::Shared,
        kind: LaneActionKind::Confirm,
        selected_value: "59".to_string(),
        candidate_id: Some(CandidateId::new("cand_a")),
        confidence: Some(0.9),
        candidate_id_required: true,
        advance_ai_lane: false,
        at: Timestamp::from_unix_millis(5_000),
    };
    store
        .apply_lane_state(&category(), &row.slot, &confirm, &Propagation::None)
        .expect("confirm applies");

    let reviews = store
        .candidate_reviews_for_slot(
            &category(),
            row.slot.target_kind(),
            &row.slot.slot_key(),
        )
        .expect("reviews load");
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].candidate_id, CandidateId::new("cand_a"));
    assert!(reviews[0].decision.is_terminal());
}

/// Verifies applying against an unseeded slot fails with not-found.
#[test]
fn missing_slot_is_not_found() {
    let (store, _dir) = open_store();
    seed_grid_slot(&store, "prod-a", "weight", "59", None);
    let bogus = SlotRef::GridKey {
        item_field_state_id: spec_desk_core::ItemFieldStateId::from_raw(999).expect("nonzero"),
    };
    let error = store
        .apply_lane_state(
            &category(),
            &bogus,
            &accept(Lane::Primary, "59", "cand_a"),
            &Propagation::None,
        )
        .expect_err("missing slot rejected");
    assert!(matches!(error, SqliteSpecStoreError::NotFound(_)));
}
