// crates/spec-desk-core/tests/identifiers.rs
// ============================================================================
// Module: Identifier Tests
// Description: Tests for identifier wire forms and candidate discriminators.
// Purpose: Pin non-zero row ids and disambiguation suffix shapes.
// Dependencies: spec-desk-core, serde_json
// ============================================================================
//! ## Overview
//! Exercises identifier construction, transparent serialization, and the
//! candidate-id discriminator suffixes applied at the store boundary.

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

use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemFieldStateId;
use spec_desk_core::SlotRef;

/// Verifies row identifiers reject zero.
#[test]
fn row_ids_reject_zero() {
    assert!(ItemFieldStateId::from_raw(0).is_none());
    assert_eq!(ItemFieldStateId::from_raw(7).expect("nonzero id").get(), 7);
}

/// Verifies logical identifiers serialize transparently.
#[test]
fn logical_ids_serialize_transparently() {
    let category = Category::new("mice");
    let json = serde_json::to_string(&category).expect("category serializes");
    assert_eq!(json, "\"mice\"");
    let parsed: Category = serde_json::from_str(&json).expect("category parses");
    assert_eq!(parsed, category);
}

/// Verifies the cross-field discriminator embeds the field key.
#[test]
fn field_discriminator_embeds_field_key() {
    let id = CandidateId::new("shared-candidate");
    let weight = id.with_field_discriminator(&FieldKey::new("weight"), 0);
    let dpi = id.with_field_discriminator(&FieldKey::new("dpi"), 0);
    assert_eq!(weight.as_str(), "shared-candidate::weight::0");
    assert_eq!(dpi.as_str(), "shared-candidate::dpi::0");
    assert_ne!(weight, dpi);
}

/// Verifies the duplicate discriminator shape.
#[test]
fn dup_discriminator_shape() {
    let id = CandidateId::new("same-field-dup");
    assert_eq!(id.with_dup_discriminator(1).as_str(), "same-field-dup::dup_1");
}

/// Verifies slot keys are distinct per target kind even over equal raw ids.
#[test]
fn slot_keys_are_kind_scoped() {
    let grid = SlotRef::GridKey {
        item_field_state_id: ItemFieldStateId::from_raw(5).expect("nonzero id"),
    };
    assert_eq!(grid.slot_key(), "ifs::5");
    assert_eq!(grid.target_kind().as_str(), "grid_key");
}
