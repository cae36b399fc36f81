// crates/spec-desk-review/tests/component_lane.rs
// ============================================================================
// Module: Component Lane Endpoint Tests
// Description: Tests for component override/confirm and the component payload.
// Purpose: Pin pending-AI retention, cascades, aggregation, and maker isolation.
// Dependencies: spec-desk-core, spec-desk-review, spec-desk-store-sqlite, tempfile
// ============================================================================
//! ## Overview
//! Exercises the component endpoint and payload: a user accept never clears
//! the pending AI lane (the payload keeps `needs_review` with `pending_ai`),
//! authoritative properties cascade through the endpoint, every slot's
//! `candidate_count` equals its candidate list length, and candidate
//! aggregation never crosses maker boundaries.

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
use spec_desk_core::ComponentIdentityRow;
use spec_desk_core::ComponentType;
use spec_desk_core::ComponentValueRow;
use spec_desk_core::Evidence;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemComponentLinkRow;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ItemRecord;
use spec_desk_core::LaneActionKind;
use spec_desk_core::MatchType;
use spec_desk_core::ProductId;
use spec_desk_core::PropertyKey;
use spec_desk_core::SourceRef;
use spec_desk_core::Timestamp;
use spec_desk_core::UserAcceptStatus;
use spec_desk_core::ValueSource;
use spec_desk_core::VariancePolicy;
use spec_desk_review::ComponentReviewRequest;
use spec_desk_review::PayloadSlice;
use spec_desk_review::REASON_PENDING_AI;
use spec_desk_review::ReviewService;
use spec_desk_rules::RulesBundle;
use spec_desk_store_sqlite::ComponentIdentitySeed;
use spec_desk_store_sqlite::ComponentValueSeed;
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

fn candidate(id: &str, value: &str) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(id),
        value: value.to_string(),
        normalized_value: value.to_lowercase(),
        score: 0.8,
        rank: 1,
        source: SourceRef {
            host: "reviews.example.com".to_string(),
            root_domain: "example.com".to_string(),
            method: "dom".to_string(),
            tier: 2,
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

fn seed_product(store: &SqliteSpecStore, product_id: &str, dpi_value: &str) {
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
    for (field, value) in [("sensor", "PAW3950"), ("dpi_max", dpi_value)] {
        store
            .upsert_item_field_state(&ItemFieldStateSeed {
                category: category(),
                product_id: ProductId::new(product_id),
                field_key: FieldKey::new(field),
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
    }
    store
        .upsert_product_candidates(
            &category(),
            &ProductId::new(product_id),
            &[(FieldKey::new("dpi_max"), vec![candidate(&format!("cand_{product_id}"), dpi_value)])],
        )
        .expect("candidates upsert");
}

fn seed_component(
    store: &SqliteSpecStore,
    name: &str,
    maker: &str,
    products: &[&str],
) -> (ComponentIdentityRow, ComponentValueRow) {
    let identity = store
        .upsert_component_identity(&ComponentIdentitySeed {
            category: category(),
            component_type: ComponentType::new("sensor"),
            canonical_name: name.to_string(),
            maker: maker.to_string(),
            aliases: Vec::new(),
            links: Vec::new(),
            source: ValueSource::ComponentDb,
        })
        .expect("identity upserts");
    let value = store
        .upsert_component_value(&ComponentValueSeed {
            component_identity_id: identity.id,
            property_key: PropertyKey::new("dpi_max"),
            value: Some("26000".to_string()),
            confidence: 0.95,
            variance_policy: Some(VariancePolicy::Authoritative),
            constraints: Vec::new(),
            accepted_candidate_id: None,
            needs_review: false,
            overridden: false,
        })
        .expect("value upserts");
    for product in products {
        store
            .upsert_item_component_link(&ItemComponentLinkRow {
                category: category(),
                product_id: ProductId::new(*product),
                field_key: FieldKey::new("sensor"),
                component_identity_id: identity.id,
                match_type: MatchType::Exact,
                score: 0.95,
            })
            .expect("link upserts");
    }
    store
        .upsert_key_review_state(&KeyReviewSeed {
            category: category(),
            locator: SlotLocator::Component {
                component_type: ComponentType::new("sensor"),
                canonical_name: name.to_string(),
                maker: maker.to_string(),
                property_key: PropertyKey::new("dpi_max"),
            },
            selected_value: Some("26000".to_string()),
            selected_candidate_id: None,
        })
        .expect("review row seeds");
    (identity, value)
}

/// Verifies a user accept keeps the pending AI lane and review flag.
#[test]
fn pending_ai_persists_through_accept() {
    let (store, _dir) = open_store();
    seed_product(&store, "p1", "26000");
    let (identity, value) = seed_component(&store, "PAW3950", "PixArt", &["p1"]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = service.component_slot(identity.id, value.id).expect("slot resolves");

    let response = service
        .component_review(
            &category(),
            &slot,
            &ComponentReviewRequest {
                action: LaneActionKind::Accept,
                selected_value: "26000".to_string(),
                candidate_id: Some(CandidateId::new("cand_p1")),
                confidence: None,
                at: Timestamp::from_unix_millis(1_000),
            },
        )
        .expect("accept applies");

    assert_eq!(response.row.shared.user_accept_status, UserAcceptStatus::Accepted);
    assert_eq!(response.row.shared.ai_confirm_status, AiConfirmStatus::Pending);
    let PayloadSlice::Component {
        component,
    } = response.slice
    else {
        panic!("expected a component slice");
    };
    let slot_payload =
        component.properties.get(&PropertyKey::new("dpi_max")).expect("property slot");
    assert!(slot_payload.needs_review);
    assert!(slot_payload.reason_codes.iter().any(|code| code == REASON_PENDING_AI));
}

/// Verifies the authoritative cascade runs through the endpoint.
#[test]
fn authoritative_accept_cascades_to_items() {
    let (store, _dir) = open_store();
    seed_product(&store, "p1", "26000");
    seed_product(&store, "p2", "26000");
    let (identity, value) = seed_component(&store, "PAW3950", "PixArt", &["p1", "p2"]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);
    let slot = service.component_slot(identity.id, value.id).expect("slot resolves");

    service
        .component_review(
            &category(),
            &slot,
            &ComponentReviewRequest {
                action: LaneActionKind::Accept,
                selected_value: "25000".to_string(),
                candidate_id: Some(CandidateId::new("cand_p1")),
                confidence: None,
                at: Timestamp::from_unix_millis(2_000),
            },
        )
        .expect("accept applies");

    for product in ["p1", "p2"] {
        let state = store
            .get_item_field_state(
                &category(),
                &ProductId::new(product),
                &FieldKey::new("dpi_max"),
            )
            .expect("field state loads")
            .expect("field state present");
        assert_eq!(state.value.as_deref(), Some("25000"));
        assert!(state.needs_ai_review);
    }
}

/// Verifies every payload slot reports a consistent candidate count.
#[test]
fn candidate_counts_match_candidate_lists() {
    let (store, _dir) = open_store();
    seed_product(&store, "p1", "26000");
    seed_product(&store, "p2", "25600");
    let (_identity, _value) = seed_component(&store, "PAW3950", "PixArt", &["p1", "p2"]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);

    let payload = service
        .component_payload(&category(), &ComponentType::new("sensor"))
        .expect("payload builds");
    assert_eq!(payload.components.len(), 1);
    let component = &payload.components[0];

    assert_eq!(component.name_tracked.candidate_count, component.name_tracked.candidates.len());
    assert_eq!(
        component.maker_tracked.candidate_count,
        component.maker_tracked.candidates.len()
    );
    for slot_payload in component.properties.values() {
        assert_eq!(slot_payload.candidate_count, slot_payload.candidates.len());
    }
    // Two linked products contribute one dpi candidate each, plus the
    // workbook row backing the curated value.
    let dpi = component.properties.get(&PropertyKey::new("dpi_max")).expect("property slot");
    assert_eq!(dpi.candidate_count, 3);
}

/// Verifies aggregation never crosses maker boundaries.
#[test]
fn maker_isolation_splits_aggregation() {
    let (store, _dir) = open_store();
    seed_product(&store, "p1", "26000");
    seed_product(&store, "p2", "25600");
    seed_component(&store, "PAW3950", "PixArt", &["p1"]);
    seed_component(&store, "PAW3950", "CloneWorks", &["p2"]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);

    let payload = service
        .component_payload(&category(), &ComponentType::new("sensor"))
        .expect("payload builds");
    assert_eq!(payload.components.len(), 2);
    for component in &payload.components {
        assert_eq!(component.linked_products.len(), 1);
        let dpi =
            component.properties.get(&PropertyKey::new("dpi_max")).expect("property slot");
        // One item candidate plus the workbook backing row; never the
        // sibling maker's candidates.
        assert_eq!(dpi.candidate_count, 2);
    }
}

/// Verifies override-allowed properties compute no variance violations.
#[test]
fn override_allowed_skips_variance() {
    let (store, _dir) = open_store();
    seed_product(&store, "p1", "99999");
    let (identity, _value) = seed_component(&store, "PAW3950", "PixArt", &["p1"]);
    store
        .upsert_component_value(&ComponentValueSeed {
            component_identity_id: identity.id,
            property_key: PropertyKey::new("dpi_max"),
            value: Some("26000".to_string()),
            confidence: 0.95,
            variance_policy: Some(VariancePolicy::OverrideAllowed),
            constraints: Vec::new(),
            accepted_candidate_id: None,
            needs_review: false,
            overridden: false,
        })
        .expect("policy update");
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);

    let payload = service
        .component_payload(&category(), &ComponentType::new("sensor"))
        .expect("payload builds");
    let dpi = payload.components[0]
        .properties
        .get(&PropertyKey::new("dpi_max"))
        .expect("property slot");
    assert!(dpi.variance_violations.is_empty());
}

/// Verifies an authoritative property reports divergent items.
#[test]
fn authoritative_variance_reports_divergence() {
    let (store, _dir) = open_store();
    seed_product(&store, "p1", "25000");
    seed_component(&store, "PAW3950", "PixArt", &["p1"]);
    let bundle = RulesBundle::default();
    let service = ReviewService::new(&store, &bundle);

    let payload = service
        .component_payload(&category(), &ComponentType::new("sensor"))
        .expect("payload builds");
    let dpi = payload.components[0]
        .properties
        .get(&PropertyKey::new("dpi_max"))
        .expect("property slot");
    assert_eq!(dpi.variance_violations.len(), 1);
    assert_eq!(dpi.variance_violations[0].item_value, "25000");
    assert_eq!(dpi.variance_violations[0].shared_value, "26000");
}
