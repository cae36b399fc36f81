// crates/spec-desk-store-sqlite/tests/store_roundtrip.rs
// ============================================================================
// Module: Store Roundtrip Tests
// Description: Tests for typed CRUD, upsert idempotence, and counts.
// Purpose: Validate that persisted rows equal returned rows field-for-field.
// Dependencies: spec-desk-core, spec-desk-store-sqlite, tempfile
// ============================================================================
//! ## Overview
//! Exercises the named store operations on a real `SQLite` file: upserts are
//! keyed on natural keys, reloads equal the returned rows, and `counts()`
//! reports every domain table.

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
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ItemRecord;
use spec_desk_core::ProductId;
use spec_desk_core::SourceRef;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_store_sqlite::ItemFieldStateSeed;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreConfig;

fn open_store() -> (SqliteSpecStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteSpecStoreConfig::for_path(dir.path().join("mice.sqlite"));
    let store = SqliteSpecStore::open(&config).expect("store opens");
    (store, dir)
}

fn sample_item(product_id: &str) -> ItemRecord {
    ItemRecord {
        category: Category::new("mice"),
        product_id: ProductId::new(product_id),
        identity: ItemIdentity {
            brand: "Logi".to_string(),
            model: "GX Light".to_string(),
            variant: None,
        },
        lifecycle: ItemLifecycle::Active,
    }
}

fn sample_candidate(id: &str, value: &str, score: f64, rank: u32) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(id),
        value: value.to_string(),
        normalized_value: value.to_lowercase(),
        score,
        rank,
        source: SourceRef {
            host: "reviews.example.com".to_string(),
            root_domain: "example.com".to_string(),
            method: "dom".to_string(),
            tier: 2,
        },
        evidence: Evidence {
            snippet_id: format!("snip-{id}"),
            quote: format!("weighs {value} grams"),
            url: "https://reviews.example.com/gx-light".to_string(),
            retrieved_at: Timestamp::from_unix_millis(1_700_000_000_000),
        },
        is_component_field: false,
        is_list_field: false,
        component_type: None,
    }
}

fn field_state_seed(product_id: &str, field_key: &str, value: &str) -> ItemFieldStateSeed {
    ItemFieldStateSeed {
        category: Category::new("mice"),
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
    }
}

/// Verifies item upsert and reload equality.
#[test]
fn item_roundtrip() {
    let (store, _dir) = open_store();
    let item = sample_item("gx-light");
    store.upsert_item(&item).expect("item upserts");
    let loaded = store
        .get_item(&Category::new("mice"), &ProductId::new("gx-light"))
        .expect("item loads");
    assert_eq!(loaded, Some(item));
}

/// Verifies field state upsert returns the persisted row.
#[test]
fn field_state_returned_equals_persisted() {
    let (store, _dir) = open_store();
    store.upsert_item(&sample_item("gx-light")).expect("item upserts");
    let returned = store
        .upsert_item_field_state(&field_state_seed("gx-light", "weight", "59"))
        .expect("field state upserts");
    let loaded = store
        .get_item_field_state(
            &Category::new("mice"),
            &ProductId::new("gx-light"),
            &FieldKey::new("weight"),
        )
        .expect("field state loads")
        .expect("field state present");
    assert_eq!(returned, loaded);
}

/// Verifies upserting the same natural key twice keeps one row.
#[test]
fn upserts_are_idempotent() {
    let (store, _dir) = open_store();
    store.upsert_item(&sample_item("gx-light")).expect("item upserts");
    store
        .upsert_item_field_state(&field_state_seed("gx-light", "weight", "59"))
        .expect("first upsert");
    store
        .upsert_item_field_state(&field_state_seed("gx-light", "weight", "59"))
        .expect("second upsert");
    let counts = store.counts().expect("counts");
    assert_eq!(counts["item_field_state"], 1);
    assert_eq!(counts["items"], 1);
}

/// Verifies candidates return ordered by rank then score.
#[test]
fn candidates_order_by_rank_then_score() {
    let (store, _dir) = open_store();
    let category = Category::new("mice");
    let product_id = ProductId::new("gx-light");
    let batches = vec![(
        FieldKey::new("weight"),
        vec![
            sample_candidate("cand_low", "61", 0.4, 2),
            sample_candidate("cand_mid", "60", 0.7, 1),
            sample_candidate("cand_top", "59", 0.5, 1),
        ],
    )];
    store
        .upsert_product_candidates(&category, &product_id, &batches)
        .expect("candidates upsert");

    let ordered = store
        .candidates_for_field(&category, &product_id, &FieldKey::new("weight"))
        .expect("candidates load");
    let ids: Vec<&str> =
        ordered.iter().map(|candidate| candidate.candidate_id.as_str()).collect();
    assert_eq!(ids, vec!["cand_mid", "cand_top", "cand_low"]);
}

/// Verifies counts lists every domain table.
#[test]
fn counts_lists_all_domain_tables() {
    let (store, _dir) = open_store();
    let counts = store.counts().expect("counts");
    for table in [
        "items",
        "candidates",
        "item_field_state",
        "component_identity",
        "component_value",
        "enum_list",
        "list_value",
        "item_component_link",
        "item_list_link",
        "key_review_state",
        "key_review_audit",
        "candidate_review",
        "source_registry",
        "source_assertion",
        "source_evidence_ref",
    ] {
        assert_eq!(counts.get(table), Some(&0), "missing table {table}");
    }
}

/// Verifies an oversize value is rejected with an integrity error.
#[test]
fn oversize_value_is_rejected() {
    let (store, _dir) = open_store();
    store.upsert_item(&sample_item("gx-light")).expect("item upserts");
    let mut seed = field_state_seed("gx-light", "weight", "59");
    seed.value = Some("x".repeat(spec_desk_store_sqlite::MAX_VALUE_BYTES + 1));
    let error = store.upsert_item_field_state(&seed).expect_err("oversize rejected");
    assert!(error.to_string().starts_with("storage_integrity"));
}
