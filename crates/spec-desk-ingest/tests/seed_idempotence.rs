// crates/spec-desk-ingest/tests/seed_idempotence.rs
// ============================================================================
// Module: Seed Idempotence Tests
// Description: Tests for bit-identical table counts across re-seeds.
// Purpose: Pin the natural-key upsert discipline of the seeder.
// Dependencies: spec-desk-core, spec-desk-ingest, spec-desk-rules,
// spec-desk-store-sqlite, tempfile
// ============================================================================
//! ## Overview
//! Seeds one product's artifact set twice and asserts `counts()` is
//! bit-identical, including component, enum, review, and source tables.

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
use spec_desk_core::ComponentType;
use spec_desk_core::EnumPolicy;
use spec_desk_core::Evidence;
use spec_desk_core::FieldContract;
use spec_desk_core::FieldKey;
use spec_desk_core::FieldRule;
use spec_desk_core::FieldRules;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::KnownValues;
use spec_desk_core::ProductId;
use spec_desk_core::PropertyKey;
use spec_desk_core::RequiredLevel;
use spec_desk_core::SourceRef;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueShape;
use spec_desk_core::ValueSource;
use spec_desk_ingest::CandidatesRecord;
use spec_desk_ingest::NormalizedField;
use spec_desk_ingest::NormalizedRecord;
use spec_desk_ingest::ProductArtifacts;
use spec_desk_ingest::ProvenanceRecord;
use spec_desk_ingest::Seeder;
use spec_desk_ingest::SummaryRecord;
use spec_desk_rules::ComponentDb;
use spec_desk_rules::ComponentDbEntry;
use spec_desk_rules::ComponentDbProperty;
use spec_desk_rules::RulesBundle;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreConfig;

fn open_store() -> (SqliteSpecStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteSpecStoreConfig::for_path(dir.path().join("mice.sqlite"));
    let store = SqliteSpecStore::open(&config).expect("store opens");
    (store, dir)
}

fn rule(
    required_level: RequiredLevel,
    component: Option<&str>,
    enum_policy: Option<EnumPolicy>,
) -> FieldRule {
    FieldRule {
        required_level,
        contract: FieldContract {
            value_type: "string".to_string(),
            unit: None,
            shape: ValueShape::Scalar,
        },
        component: component.map(ComponentType::new),
        enum_binding: enum_policy,
        variance_policy: None,
        constraints: Vec::new(),
        pass_target: None,
        min_evidence_refs: None,
        tier_preference: Vec::new(),
    }
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
            root_domain: host.trim_start_matches("www.").to_string(),
            method: "dom".to_string(),
            tier: 2,
        },
        evidence: Evidence {
            snippet_id: format!("snip-{id}"),
            quote: format!("spec says {value}"),
            url: format!("https://{host}/page"),
            retrieved_at: Timestamp::from_unix_millis(1_700_000_000_000),
        },
        is_component_field: false,
        is_list_field: false,
        component_type: None,
    }
}

fn sample_bundle() -> RulesBundle {
    let mut fields = BTreeMap::new();
    fields.insert(FieldKey::new("weight"), rule(RequiredLevel::Critical, None, None));
    fields.insert(FieldKey::new("sensor"), rule(RequiredLevel::Required, Some("sensor"), None));
    fields.insert(
        FieldKey::new("connection"),
        rule(RequiredLevel::Expected, None, Some(EnumPolicy::OpenPreferKnown)),
    );

    let mut properties = BTreeMap::new();
    properties.insert(
        PropertyKey::new("dpi_max"),
        ComponentDbProperty {
            value: "30000".to_string(),
            confidence: Some(0.95),
            variance_policy: None,
        },
    );
    let sensor_db = ComponentDb::from_entries(vec![ComponentDbEntry {
        name: "PAW3950".to_string(),
        maker: "PixArt".to_string(),
        aliases: vec!["PAW 3950".to_string()],
        links: Vec::new(),
        properties,
    }]);

    let mut component_dbs = BTreeMap::new();
    component_dbs.insert(ComponentType::new("sensor"), sensor_db);

    let mut known_values = BTreeMap::new();
    known_values.insert(
        FieldKey::new("connection"),
        KnownValues {
            policy: EnumPolicy::OpenPreferKnown,
            values: vec!["Wired".to_string(), "Wireless".to_string()],
        },
    );

    RulesBundle {
        rules: FieldRules {
            fields,
        },
        component_dbs,
        known_values,
        ..RulesBundle::default()
    }
}

fn sample_artifacts() -> ProductArtifacts {
    let mut fields = BTreeMap::new();
    fields.insert(
        FieldKey::new("weight"),
        NormalizedField {
            value: Some("59".to_string()),
            confidence: 0.9,
            source: ValueSource::Pipeline,
            overridden: false,
        },
    );
    fields.insert(
        FieldKey::new("sensor"),
        NormalizedField {
            value: Some("PAW 3950".to_string()),
            confidence: 0.7,
            source: ValueSource::Pipeline,
            overridden: false,
        },
    );
    fields.insert(
        FieldKey::new("connection"),
        NormalizedField {
            value: Some("Wireless".to_string()),
            confidence: 0.85,
            source: ValueSource::Pipeline,
            overridden: false,
        },
    );

    let mut candidates = BTreeMap::new();
    candidates.insert(
        FieldKey::new("weight"),
        vec![
            candidate("cand_w1", "59", "reviews.example.com"),
            candidate("cand_w2", "60", "specs.example.org"),
        ],
    );
    candidates.insert(
        FieldKey::new("connection"),
        vec![candidate("cand_c1", "Wireless", "reviews.example.com")],
    );

    ProductArtifacts {
        normalized: NormalizedRecord {
            product_id: ProductId::new("gx-light"),
            identity: ItemIdentity {
                brand: " Logi ".to_string(),
                model: "GX Light".to_string(),
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

/// Verifies re-seeding identical artifacts yields bit-identical counts.
#[test]
fn reseed_keeps_counts_bit_identical() {
    let (store, _dir) = open_store();
    let bundle = sample_bundle();
    let seeder = Seeder::new(&store, &bundle);
    let category = Category::new("mice");
    let artifacts = sample_artifacts();

    seeder.seed_known_values(&category).expect("known values seed");
    seeder.seed_product(&category, &artifacts).expect("first seed");
    let first = store.counts().expect("first counts");
    assert!(first.values().any(|count| *count > 0));

    seeder.seed_known_values(&category).expect("known values re-seed");
    seeder.seed_product(&category, &artifacts).expect("second seed");
    let second = store.counts().expect("second counts");

    assert_eq!(first, second);
}

/// Verifies seeding populates component, enum, and review tables.
#[test]
fn seed_populates_bindings_and_review_rows() {
    let (store, _dir) = open_store();
    let bundle = sample_bundle();
    let seeder = Seeder::new(&store, &bundle);
    let category = Category::new("mice");

    seeder.seed_known_values(&category).expect("known values seed");
    let report = seeder.seed_product(&category, &sample_artifacts()).expect("seed");
    assert_eq!(report.fields_seeded, 3);
    assert_eq!(report.candidates_seeded, 3);
    assert_eq!(report.components_linked, 1);
    assert_eq!(report.enum_values_linked, 1);

    let counts = store.counts().expect("counts");
    assert_eq!(counts["items"], 1);
    assert_eq!(counts["item_field_state"], 3);
    assert_eq!(counts["component_identity"], 1);
    assert_eq!(counts["component_value"], 1);
    assert_eq!(counts["item_component_link"], 1);
    assert_eq!(counts["enum_list"], 1);
    // Known values Wired + Wireless; the pipeline match deduplicates.
    assert_eq!(counts["list_value"], 2);
    assert_eq!(counts["item_list_link"], 1);
    // One grid row per field, one component property row, one enum row.
    assert_eq!(counts["key_review_state"], 5);
    assert_eq!(counts["source_registry"], 2);
    assert_eq!(counts["source_assertion"], 3);
    assert_eq!(counts["source_evidence_ref"], 3);
}

/// Verifies low-confidence fields flag for AI review and identity trims.
#[test]
fn seed_flags_low_confidence_fields() {
    let (store, _dir) = open_store();
    let bundle = sample_bundle();
    let seeder = Seeder::new(&store, &bundle);
    let category = Category::new("mice");
    seeder.seed_product(&category, &sample_artifacts()).expect("seed");

    let item = store
        .get_item(&category, &ProductId::new("gx-light"))
        .expect("item loads")
        .expect("item present");
    assert_eq!(item.identity.brand, "Logi");

    let sensor = store
        .get_item_field_state(&category, &ProductId::new("gx-light"), &FieldKey::new("sensor"))
        .expect("sensor loads")
        .expect("sensor present");
    assert!(sensor.needs_ai_review);

    let weight = store
        .get_item_field_state(&category, &ProductId::new("gx-light"), &FieldKey::new("weight"))
        .expect("weight loads")
        .expect("weight present");
    assert!(!weight.needs_ai_review);
}
