// crates/spec-desk-review/src/payload/enum_list.rs
// ============================================================================
// Module: Spec Desk Enum Payload
// Description: Enum member projection for the review UI.
// Purpose: Derive visible enum values with sources, links, and review flags.
// Dependencies: spec-desk-core, crate::payload, serde
// ============================================================================

//! ## Overview
//! The enum payload lists each enum field of a category with its visible
//! members. Pipeline-sourced members with zero linked products are hidden;
//! members are already deduplicated case-insensitively at the store level.
//! Closed-policy violations never reach the member list; they stay at the
//! candidate level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::AiConfirmStatus;
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemListLinkRow;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::ListValueRow;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_core::normalize_value;

use crate::payload::CandidatePayload;
use crate::payload::ConfidenceColor;
use crate::payload::confidence_color;
use crate::payload::sort_candidate_payloads;
use crate::payload::synthesize_missing_selection;

// ============================================================================
// SECTION: Payload Shapes
// ============================================================================

/// Aggregate metrics for one enum field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnumMetrics {
    /// Number of visible members.
    pub total_values: usize,
    /// Number of visible members still needing review.
    pub pending_review: usize,
    /// Number of distinct products linked across visible members.
    pub linked_products: usize,
}

/// One visible enum member in the payload.
///
/// # Invariants
/// - `candidate_count == candidates.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValuePayload {
    /// Member value.
    pub value: String,
    /// Member origin.
    pub source: ValueSource,
    /// Confidence display color.
    pub color: ConfidenceColor,
    /// Member confidence.
    pub confidence: f64,
    /// Whether the member still needs review.
    pub needs_review: bool,
    /// Number of aggregated candidate rows.
    pub candidate_count: usize,
    /// Aggregated candidate rows in payload order.
    pub candidates: Vec<CandidatePayload>,
    /// Source timestamp, when known.
    pub source_timestamp: Option<Timestamp>,
    /// Candidate accepted for the member, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Number of products linked to the member.
    pub linked_product_count: usize,
}

/// Enum payload for one field of a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumPayload {
    /// Enum field key.
    pub field: FieldKey,
    /// Aggregate metrics over visible members.
    pub metrics: EnumMetrics,
    /// Visible members ordered by normalized value.
    pub values: Vec<EnumValuePayload>,
}

// ============================================================================
// SECTION: Builder Inputs
// ============================================================================

/// Prefetched inputs for one enum member's projection.
#[derive(Debug, Clone)]
pub struct EnumValueInputs<'a> {
    /// Enum member row.
    pub row: &'a ListValueRow,
    /// Item links for the member.
    pub links: &'a [ItemListLinkRow],
    /// Aggregated candidates matching the member's normalized value.
    pub candidates: Vec<Candidate>,
    /// Review row for the member slot, when seeded.
    pub review: Option<&'a KeyReviewStateRow>,
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the payload for one enum field from prefetched member inputs.
#[must_use]
pub fn build_enum_payload(field: FieldKey, members: &[EnumValueInputs<'_>]) -> EnumPayload {
    let mut values = Vec::new();
    let mut linked: BTreeSet<&str> = BTreeSet::new();
    let mut pending_review = 0;

    for inputs in members {
        // Pipeline members nothing links to are invisible.
        if inputs.row.source == ValueSource::Pipeline && inputs.links.is_empty() {
            continue;
        }
        let value = build_enum_value(inputs);
        if value.needs_review {
            pending_review += 1;
        }
        for link in inputs.links {
            linked.insert(link.product_id.as_str());
        }
        values.push(value);
    }

    EnumPayload {
        field,
        metrics: EnumMetrics {
            total_values: values.len(),
            pending_review,
            linked_products: linked.len(),
        },
        values,
    }
}

/// Builds one visible enum member.
fn build_enum_value(inputs: &EnumValueInputs<'_>) -> EnumValuePayload {
    let mut candidates: Vec<CandidatePayload> =
        inputs.candidates.iter().map(CandidatePayload::from_candidate).collect();
    synthesize_missing_selection(
        &mut candidates,
        inputs
            .review
            .and_then(|review| review.selected_candidate_id.as_ref())
            .or(inputs.row.accepted_candidate_id.as_ref()),
        inputs
            .review
            .and_then(|review| review.selected_value.as_deref())
            .or(Some(inputs.row.value.as_str())),
        |value| normalize_value(value),
        link_confidence(inputs),
    );
    sort_candidate_payloads(&mut candidates);

    let ai_pending = inputs
        .review
        .is_none_or(|review| review.shared.ai_confirm_status == AiConfirmStatus::Pending);
    let confidence = link_confidence(inputs);

    EnumValuePayload {
        value: inputs.row.value.clone(),
        source: inputs.row.source,
        color: confidence_color(confidence),
        confidence,
        needs_review: ai_pending || inputs.row.needs_review,
        candidate_count: candidates.len(),
        candidates,
        source_timestamp: inputs.row.source_timestamp,
        accepted_candidate_id: inputs.row.accepted_candidate_id.clone(),
        linked_product_count: inputs.links.len(),
    }
}

/// Returns the member confidence: the best link score, or full confidence
/// for curated members with no links.
fn link_confidence(inputs: &EnumValueInputs<'_>) -> f64 {
    if inputs.links.is_empty() {
        if inputs.row.source == ValueSource::Pipeline { 0.0 } else { 1.0 }
    } else {
        inputs.links.iter().map(|link| link.score).fold(0.0, f64::max)
    }
}
