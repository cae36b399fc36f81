// crates/spec-desk-core/src/core/mod.rs
// ============================================================================
// Module: Spec Desk Core Types
// Description: Canonical Spec Desk data model and review-state structures.
// Purpose: Provide stable, serializable types for candidates, rules, and review rows.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types define the curation data model: identifiers, field rules,
//! candidates with evidence, relational record rows, and the dual-lane review
//! state machine. These types are the canonical source of truth for the
//! relational schema and every derived payload surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod candidate;
pub mod identifiers;
pub mod records;
pub mod review;
pub mod rules;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use candidate::Candidate;
pub use candidate::Evidence;
pub use candidate::SourceRef;
pub use candidate::sort_by_field_order;
pub use candidate::sort_by_payload_order;
pub use identifiers::CandidateId;
pub use identifiers::Category;
pub use identifiers::ComponentIdentityId;
pub use identifiers::ComponentType;
pub use identifiers::ComponentValueId;
pub use identifiers::EnumListId;
pub use identifiers::FieldKey;
pub use identifiers::ItemFieldStateId;
pub use identifiers::KeyReviewStateId;
pub use identifiers::ListValueId;
pub use identifiers::ProductId;
pub use identifiers::PropertyKey;
pub use identifiers::RunId;
pub use records::ComponentIdentityRow;
pub use records::ComponentValueRow;
pub use records::EnumListRow;
pub use records::ItemComponentLinkRow;
pub use records::ItemFieldStateRow;
pub use records::ItemIdentity;
pub use records::ItemLifecycle;
pub use records::ItemListLinkRow;
pub use records::ItemRecord;
pub use records::ListValueRow;
pub use records::MatchType;
pub use records::SourceAssertionRow;
pub use records::SourceEvidenceRefRow;
pub use records::SourceRegistryRow;
pub use records::ValueSource;
pub use review::AiConfirmStatus;
pub use review::CandidateReviewRow;
pub use review::KeyReviewAuditRecord;
pub use review::KeyReviewStateRow;
pub use review::Lane;
pub use review::LaneAction;
pub use review::LaneActionKind;
pub use review::LaneSlot;
pub use review::ReviewDecision;
pub use review::ReviewErrorKind;
pub use review::SlotRef;
pub use review::TargetKind;
pub use review::UserAcceptStatus;
pub use review::lane_transition;
pub use rules::Constraint;
pub use rules::CrossRelation;
pub use rules::CrossValidationRule;
pub use rules::DEFAULT_PASS_TARGET;
pub use rules::EnumPolicy;
pub use rules::FieldContract;
pub use rules::FieldRule;
pub use rules::FieldRules;
pub use rules::KnownValues;
pub use rules::RequiredLevel;
pub use rules::UNKNOWN_VALUE;
pub use rules::ValueShape;
pub use rules::VariancePolicy;
pub use rules::is_unknown_value;
pub use rules::normalize_value;
pub use time::Timestamp;
