// crates/spec-desk-ingest/tests/candidate_disambiguation.rs
// ============================================================================
// Module: Candidate Disambiguation Tests
// Description: Tests for store-boundary candidate id discriminators.
// Purpose: Pin cross-field and within-field id collision handling.
// Dependencies: spec-desk-core, spec-desk-ingest, spec-desk-rules,
// spec-desk-store-sqlite, tempfile
// ============================================================================
//! ## Overview
//! Seeds colliding incoming candidate ids and asserts the persisted rows
//! carry field discriminators (`::{field}::{seq}`) across fields and dup
//! discriminators (`::dup_{seq}`) within one field, deterministically across
//! re-seeds.

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

use std::collections::BTreeMap;

use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::Evidence;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ProductId;
use spec_desk_core::SourceRef;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_ingest::CandidatesRecord;
use spec_desk_ingest::NormalizedField;
use spec_desk_ingest::NormalizedRecord;
use spec_desk_ingest::ProductArtifacts;
use spec_desk_ingest::ProvenanceRecord;
use spec_desk_ingest::Seeder;
use spec_desk_ingest::SummaryRecord;
use spec_desk_rules::RulesBundle;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreConfig;

fn open_store() -> (SqliteSpecStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteSpecStoreConfig::for_path(dir.path().join("mice.sqlite"));
    let store = SqliteSpecStore::open(&config).expect("store opens");
    (store, dir)
}

fn candidate(id: &str, value: &str, host: &str) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(id),
        value: value.to_string(),
        normalized_value: value.to_lowercase(),
        score: 0.8,
        rank: 1,
        source: SourceRef {
            host: host.to_string(),
            root_domain: host.to_string(),
            method: "dom".to_string(),
            tier: 2,
        },
        evidence: Evidence {
            snippet_id: format!("snip-{id}-{host}"),
            quote: format!("spec says {value}"),
            url: format!("https://{host}/page"),
            retrieved_at: Timestamp::from_unix_millis(1_700_000_000_000),
        },
        is_component_field: false,
        is_list_field: false,
        component_type: None,
    }
}

fn artifacts_with(candidates: BTreeMap<FieldKey, Vec<Candidate>>) -> ProductArtifacts {
    let mut fields = BTreeMap::new();
    for field_key in candidates.keys() {
        fields.insert(
            field_key.clone(),
            NormalizedField {
                value: Some("x".to_string()),
                confidence: 0.9,
                source: ValueSource::Pipeline,
                overridden: false,
            },
        );
    }
    ProductArtifacts {
        normalized: NormalizedRecord {
            product_id: ProductId::new("prod-a"),
            identity: ItemIdentity {
                brand: "Logi".to_string(),
                model: "A".to_string(),
                variant: None,
            },
            lifecycle: ItemLifecycle::Active,
            fields,
        },
        provenance: ProvenanceRecord::default(),
        summary: SummaryRecord::default(),
        candidates: CandidatesRecord {
            fields: candidates,
        },
    }
}

/// Verifies a cross-field id collision suffixes every colliding row.
#[test]
fn cross_field_collision_gets_field_discriminators() {
    let (store, _dir) = open_store();
    let bundle = RulesBundle::default();
    let seeder = Seeder::new(&store, &bundle);
    let category = Category::new("mice");

    let mut candidates = BTreeMap::new();
    candidates.insert(
        FieldKey::new("weight"),
        vec![candidate("shared-candidate", "59", "a.example.com")],
    );
    candidates.insert(
        FieldKey::new("dpi"),
        vec![candidate("shared-candidate", "26000", "a.example.com")],
    );
    seeder.seed_product(&category, &artifacts_with(candidates)).expect("seed");

    let weight = store
        .candidates_for_field(&category, &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("weight candidates");
    let dpi = store
        .candidates_for_field(&category, &ProductId::new("prod-a"), &FieldKey::new("dpi"))
        .expect("dpi candidates");

    assert_eq!(weight.len(), 1);
    assert_eq!(dpi.len(), 1);
    assert!(weight[0].candidate_id.as_str().contains("::weight::"));
    assert!(dpi[0].candidate_id.as_str().contains("::dpi::"));
}

/// Verifies a within-field duplicate id gets a dup discriminator.
#[test]
fn within_field_duplicate_gets_dup_discriminator() {
    let (store, _dir) = open_store();
    let bundle = RulesBundle::default();
    let seeder = Seeder::new(&store, &bundle);
    let category = Category::new("mice");

    let mut candidates = BTreeMap::new();
    candidates.insert(
        FieldKey::new("weight"),
        vec![
            candidate("same-field-dup", "59", "a.example.com"),
            candidate("same-field-dup", "59", "b.example.com"),
        ],
    );
    seeder.seed_product(&category, &artifacts_with(candidates)).expect("seed");

    let rows = store
        .candidates_for_field(&category, &ProductId::new("prod-a"), &FieldKey::new("weight"))
        .expect("weight candidates");
    assert_eq!(rows.len(), 2);
    let ids: Vec<&str> = rows.iter().map(|row| row.candidate_id.as_str()).collect();
    assert!(ids.contains(&"same-field-dup"));
    assert!(ids.iter().any(|id| id.contains("::dup_")));
}

/// Verifies disambiguation is deterministic across re-seeds.
#[test]
fn disambiguation_is_stable_across_reseeds() {
    let (store, _dir) = open_store();
    let bundle = RulesBundle::default();
    let seeder = Seeder::new(&store, &bundle);
    let category = Category::new("mice");

    let mut candidates = BTreeMap::new();
    candidates.insert(
        FieldKey::new("weight"),
        vec![
            candidate("shared-candidate", "59", "a.example.com"),
            candidate("shared-candidate", "60", "b.example.com"),
        ],
    );
    candidates.insert(
        FieldKey::new("dpi"),
        vec![candidate("shared-candidate", "26000", "a.example.com")],
    );
    let artifacts = artifacts_with(candidates);

    seeder.seed_product(&category, &artifacts).expect("first seed");
    let first = store.counts().expect("first counts");
    seeder.seed_product(&category, &artifacts).expect("second seed");
    let second = store.counts().expect("second counts");

    assert_eq!(first, second);
    assert_eq!(first["candidates"], 3);
}
