// crates/spec-desk-review/tests/grid_lane.rs
// ============================================================================
// Module: Grid Lane Endpoint Tests
// Description: Tests for grid accept/confirm through the review service.
// Purpose: Pin target-kind validation, lane advancement, and refresh slices.
// Dependencies: spec-desk-core, spec-desk-review, spec-desk-store-sqlite, tempfile
// ============================================================================
//! ## Overview
//! Exercises the grid endpoint: a non-grid slot rejects with
//! `lane_context_mismatch`, accepts leave the AI lane pending (and the
//! refreshed slice reports `needs_review`), and confirming the last
//! unreviewed candidate advances the lane.

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
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::EnumListId;
use spec_desk_core::Evidence;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ItemRecord;
use spec_desk_core::Lane;
use spec_desk_core::LaneActionKind;
use spec_desk_core::ListValueId;
use spec_desk_core::ProductId;
use spec_desk_core::SlotRef;
use spec_desk_core::SourceRef;
use spec_desk_core::Timestamp;
use spec_desk_core::UserAcceptStatus;
use spec_desk_core::ValueSource;
use spec_desk_review::GridReviewRequest;
use spec_desk_review::PayloadSlice;
use spec_desk_review::REASON_PENDING_AI;
use spec_desk_review::ReviewApiError;
use spec_desk_review::ReviewService;
use spec_desk_rules::RulesBundle;
use spec_desk_store_sqlite::ItemFieldStateSeed;
use spec_desk_store_sqlite::KeyReviewSeed;
use spec_desk_store_sqlite::SlotLocator;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreConfig;

fn open_store() -> (SqliteSpecStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteSpecStoreConfig::for_path(dir.path().join("mice.sqlite"));
    let store = SqliteSpecStore::open(&config).expect("store opens");
    (store, dir)
}

fn category() -> Category {
    Category::new("mice")
}

fn candidate(id: &str, value: &str, tier: u8, score: f64) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(id),
        value: value.to_string(),
        normalized_value: value.to_lowercase(),
        score,
        rank: 1,
        source: SourceRef {
            host: "reviews.example.com".to_string(),
            root_domain: "example.com".to_string(),
            method: "dom".to_string(),
            tier,
        },
        evidence: Evidence {
            snippet_id: format!("snip-{id}"),
            quote: format!("spec says {value}"),
            url: "https://reviews.example.com/page".to_string(),
            retrieved_at: Timestamp::from_unix_millis(1_700_000_000_000),
        },
        is_component_field: false,
        is_list_field: false,
        component_type: None,
    }
}

fn seed_grid(store: &SqliteSpecStore, field_key: &str, value: &str, candidates: Vec<Candidate>) {
    store
        .upsert_item(&ItemRecord {
            category: category(),
            product_id: ProductId::new("prod-a"),
            identity: ItemIdentity {
                brand: "Logi".to_string(),
                model: "A".to_string(),
                variant: None,
            },
            lifecycle: ItemLifecycle::Active,
        })
        .expect("item upserts");
    store
        .upsert_item_field_state(&ItemFieldStateSeed {
            category: category(),
            product_id: ProductId::new("prod-a"),
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
    if !candidates.is_empty() {
        store
            .upsert_product_candidates(
                &category(),
                &ProductId::new("prod-a"),
                &[(FieldKey::new(field_key), candidates)],
            )
            .expect("candidates upsert");
    }
    store
        .upsert_key_review_state(&KeyReviewSeed {
            category: category(),
            locator: SlotLocator::Grid {
                product_id: ProductId::new("prod-a"),
                field_key: FieldKey::new(field_key),
            },
            selected_value: Some(value.to_string()),
            selected_candidate_id: None,
        })
        .expect("review row seeds");
}

fn request(action: LaneActionKind, lane: Lane, value: &str, candidate: &str) -> GridReviewRequest {
    GridReviewRequest {
        lane,
        action,
        selected_value: value.to_string(),
        candidate_id: Some(CandidateId::new(candidate)),
        confidence: Some(0.9),
        at: Timestamp::from_unix_millis(1_000),
    }
}

/// Verifies a non-grid slot rejects with the mismatch code.
#[test]
fn non_grid_slot_rejects_with_mismatch() {
    let (store, _dir) = open_store();
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = SlotRef::EnumKey {
        list_value_id: ListValueId::from_raw(1).expect("nonzero"),
        enum_list_id: EnumListId::from_raw(1).expect("nonzero"),
        enum_value_norm: "wireless".to_string(),
    };
    let error = service
        .grid_key_review(
            &category(),
            &slot,
            &request(LaneActionKind::Accept, Lane::Primary, "Wireless", "cand_a"),
        )
        .expect_err("mismatch rejected");
    match error {
        ReviewApiError::Validation {
            code, ..
        } => assert_eq!(code, "lane_context_mismatch"),
        other => panic!("unexpected error: {other}"),
    }
}

/// Verifies accept leaves the AI lane pending and the slice flags review.
#[test]
fn accept_keeps_ai_lane_pending() {
    let (store, _dir) = open_store();
    seed_grid(&store, "weight", "59", vec![candidate("cand_a", "59", 2, 0.8)]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = service
        .grid_slot(&category(), &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("slot resolves");

    let response = service
        .grid_key_review(
            &category(),
            &slot,
            &request(LaneActionKind::Accept, Lane::Primary, "59", "cand_a"),
        )
        .expect("accept applies");

    assert_eq!(response.row.primary.user_accept_status, UserAcceptStatus::Accepted);
    assert_eq!(response.row.primary.ai_confirm_status, AiConfirmStatus::Pending);
    let PayloadSlice::Grid {
        field,
    } = response.slice
    else {
        panic!("expected a grid slice");
    };
    assert!(field.needs_review);
    assert!(field.reason_codes.iter().any(|code| code == REASON_PENDING_AI));
}

/// Verifies confirming the only candidate advances the AI lane.
#[test]
fn confirming_last_candidate_advances_lane() {
    let (store, _dir) = open_store();
    seed_grid(&store, "weight", "59", vec![candidate("cand_a", "59", 2, 0.8)]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = service
        .grid_slot(&category(), &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("slot resolves");

    let response = service
        .grid_key_review(
            &category(),
            &slot,
            &request(LaneActionKind::Confirm, Lane::Primary, "59", "cand_a"),
        )
        .expect("confirm applies");
    assert_eq!(response.row.primary.ai_confirm_status, AiConfirmStatus::Confirmed);
    assert_eq!(response.row.primary.user_accept_status, UserAcceptStatus::Pending);
}

/// Verifies confirming one of two candidates leaves the lane pending.
#[test]
fn confirming_one_of_two_candidates_stays_pending() {
    let (store, _dir) = open_store();
    seed_grid(
        &store,
        "weight",
        "59",
        vec![candidate("cand_a", "59", 2, 0.8), candidate("cand_b", "60", 3, 0.6)],
    );
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = service
        .grid_slot(&category(), &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("slot resolves");

    let first = service
        .grid_key_review(
            &category(),
            &slot,
            &request(LaneActionKind::Confirm, Lane::Primary, "59", "cand_a"),
        )
        .expect("first confirm applies");
    assert_eq!(first.row.primary.ai_confirm_status, AiConfirmStatus::Pending);

    let second = service
        .grid_key_review(
            &category(),
            &slot,
            &request(LaneActionKind::Confirm, Lane::Primary, "59", "cand_a"),
        )
        .expect("second confirm applies");
    // cand_b remains unreviewed; the lane stays pending.
    assert_eq!(second.row.primary.ai_confirm_status, AiConfirmStatus::Pending);
}

/// Verifies accept without a candidate id rejects when candidates exist.
#[test]
fn accept_requires_candidate_id() {
    let (store, _dir) = open_store();
    seed_grid(&store, "weight", "59", vec![candidate("cand_a", "59", 2, 0.8)]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = service
        .grid_slot(&category(), &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("slot resolves");

    let mut bare = request(LaneActionKind::Accept, Lane::Primary, "59", "ignored");
    bare.candidate_id = None;
    let error =
        service.grid_key_review(&category(), &slot, &bare).expect_err("missing id rejected");
    match error {
        ReviewApiError::Validation {
            code, ..
        } => assert_eq!(code, "candidate_id_required"),
        other => panic!("unexpected error: {other}"),
    }
}
