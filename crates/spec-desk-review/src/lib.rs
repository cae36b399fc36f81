// crates/spec-desk-review/src/lib.rs
// ============================================================================
// Module: Spec Desk Review Library
// Description: Public API surface for review endpoints and payload projection.
// Purpose: Expose the review service, request shapes, and payload builders.
// Dependencies: crate::{endpoints, payload}
// ============================================================================

//! ## Overview
//! This crate implements the endpoint layer of the dual-lane review state
//! machine (grid, component, and enum scopes) and the pure payload
//! projection serving the review UI. Write endpoints return the post-write
//! review row plus a refreshed payload slice; read endpoints never mutate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod endpoints;
pub mod payload;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use endpoints::CODE_MISSING_REQUIRED_ID;
pub use endpoints::ComponentReviewRequest;
pub use endpoints::EnumReviewRequest;
pub use endpoints::GridReviewRequest;
pub use endpoints::PayloadSlice;
pub use endpoints::ReviewApiError;
pub use endpoints::ReviewResponse;
pub use endpoints::ReviewService;
pub use payload::CandidatePayload;
pub use payload::ConfidenceColor;
pub use payload::REASON_BELOW_PASS_TARGET;
pub use payload::REASON_CONSTRAINT_CONFLICT;
pub use payload::REASON_PENDING_AI;
pub use payload::component::ComponentInputs;
pub use payload::component::ComponentPayload;
pub use payload::component::ComponentRowPayload;
pub use payload::component::SlotPayload;
pub use payload::component::VarianceViolation;
pub use payload::component::build_component_payload;
pub use payload::component::build_component_row;
pub use payload::confidence_color;
pub use payload::enum_list::EnumMetrics;
pub use payload::enum_list::EnumPayload;
pub use payload::enum_list::EnumValueInputs;
pub use payload::enum_list::EnumValuePayload;
pub use payload::enum_list::build_enum_payload;
pub use payload::grid::FieldState;
pub use payload::grid::GridFieldInputs;
pub use payload::grid::GridPayload;
pub use payload::grid::SelectedValue;
pub use payload::grid::build_field_state;
pub use payload::grid::build_grid_payload;
