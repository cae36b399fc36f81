// crates/spec-desk-review/src/payload/grid.rs
// ============================================================================
// Module: Spec Desk Grid Payload
// Description: Per-item field grid projection for the review UI.
// Purpose: Derive field states with colors, evidence, and ordered candidates.
// Dependencies: spec-desk-core, crate::payload, serde
// ============================================================================

//! ## Overview
//! The grid payload maps every field of one item to a field state: the
//! selected value with its confidence color, the evidence of the top-ordered
//! candidate, the ordered candidate list, and review flags. The top entry by
//! `(tier asc, score desc)` decides the field's source, method, and tier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::AiConfirmStatus;
use spec_desk_core::Candidate;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemFieldStateRow;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::ProductId;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_core::normalize_value;

use crate::payload::CandidatePayload;
use crate::payload::ConfidenceColor;
use crate::payload::REASON_BELOW_PASS_TARGET;
use crate::payload::REASON_CONSTRAINT_CONFLICT;
use crate::payload::REASON_PENDING_AI;
use crate::payload::confidence_color;
use crate::payload::sort_candidate_payloads;
use crate::payload::synthesize_missing_selection;

// ============================================================================
// SECTION: Payload Shapes
// ============================================================================

/// Selected value rendering for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedValue {
    /// Selected value, when any.
    pub value: Option<String>,
    /// Selection confidence.
    pub confidence: f64,
    /// Confidence display color.
    pub color: ConfidenceColor,
}

/// One field's projected state in the grid payload.
///
/// # Invariants
/// - `candidate_count == candidates.len()`.
/// - `candidates` is ordered by `(tier asc, score desc)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    /// Selected value rendering.
    pub selected: SelectedValue,
    /// Source host of the top-ordered candidate, when any.
    pub source: Option<String>,
    /// Origin of the resolved value.
    pub value_source: ValueSource,
    /// Extraction method of the top-ordered candidate, when any.
    pub method: Option<String>,
    /// Source tier of the top-ordered candidate, when any.
    pub tier: Option<u8>,
    /// Evidence URL of the top-ordered candidate, when any.
    pub evidence_url: Option<String>,
    /// Evidence quote of the top-ordered candidate, when any.
    pub evidence_quote: Option<String>,
    /// Retrieval timestamp of the top-ordered candidate, when any.
    pub source_timestamp: Option<Timestamp>,
    /// Number of candidate rows.
    pub candidate_count: usize,
    /// Ordered candidate rows.
    pub candidates: Vec<CandidatePayload>,
    /// Whether the slot still needs review.
    pub needs_review: bool,
    /// Stable reason codes explaining the review flag and color.
    pub reason_codes: Vec<String>,
    /// Whether a reviewer overrode the pipeline value.
    pub overridden: bool,
}

/// Grid payload for one `(category, product_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPayload {
    /// Product identifier.
    pub product_id: ProductId,
    /// Field states keyed by field.
    pub fields: BTreeMap<FieldKey, FieldState>,
}

// ============================================================================
// SECTION: Builder Inputs
// ============================================================================

/// Prefetched inputs for one field's projection.
#[derive(Debug, Clone)]
pub struct GridFieldInputs<'a> {
    /// Resolved field state row.
    pub state: &'a ItemFieldStateRow,
    /// Stored candidates for the field.
    pub candidates: &'a [Candidate],
    /// Grid review row for the slot, when seeded.
    pub review: Option<&'a KeyReviewStateRow>,
    /// Whether the extraction summary lists the field below its pass target.
    pub below_pass_target: bool,
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds one field state from prefetched rows.
#[must_use]
pub fn build_field_state(inputs: &GridFieldInputs<'_>) -> FieldState {
    let mut candidates: Vec<CandidatePayload> =
        inputs.candidates.iter().map(CandidatePayload::from_candidate).collect();
    synthesize_missing_selection(
        &mut candidates,
        inputs.review.and_then(|review| review.selected_candidate_id.as_ref()),
        inputs
            .review
            .and_then(|review| review.selected_value.as_deref())
            .or(inputs.state.value.as_deref()),
        |value| normalize_value(value),
        inputs.state.confidence,
    );
    sort_candidate_payloads(&mut candidates);

    let top = candidates.first();
    let mut color = confidence_color(inputs.state.confidence);
    let mut reason_codes = Vec::new();

    if inputs.below_pass_target {
        color = ConfidenceColor::Red;
        reason_codes.push(REASON_BELOW_PASS_TARGET.to_string());
    }
    let ai_pending = inputs
        .review
        .is_none_or(|review| review.primary.ai_confirm_status == AiConfirmStatus::Pending);
    let needs_review = ai_pending || inputs.state.needs_ai_review;
    if ai_pending {
        reason_codes.push(REASON_PENDING_AI.to_string());
    }
    if inputs.state.constraint_conflict {
        reason_codes.push(REASON_CONSTRAINT_CONFLICT.to_string());
    }

    FieldState {
        selected: SelectedValue {
            value: inputs.state.value.clone(),
            confidence: inputs.state.confidence,
            color,
        },
        source: top.map(|candidate| candidate.host.clone()),
        value_source: inputs.state.source,
        method: top.map(|candidate| candidate.method.clone()),
        tier: top.map(|candidate| candidate.tier),
        evidence_url: top.map(|candidate| candidate.evidence_url.clone()),
        evidence_quote: top.map(|candidate| candidate.evidence_quote.clone()),
        source_timestamp: top.map(|candidate| candidate.retrieved_at),
        candidate_count: candidates.len(),
        candidates,
        needs_review,
        reason_codes,
        overridden: inputs.state.overridden,
    }
}

/// Builds the grid payload for one product from prefetched field inputs.
#[must_use]
pub fn build_grid_payload(
    product_id: ProductId,
    fields: &[GridFieldInputs<'_>],
) -> GridPayload {
    let mut map = BTreeMap::new();
    for inputs in fields {
        map.insert(inputs.state.field_key.clone(), build_field_state(inputs));
    }
    GridPayload {
        product_id,
        fields: map,
    }
}
