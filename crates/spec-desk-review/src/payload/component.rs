// crates/spec-desk-review/src/payload/component.rs
// ============================================================================
// Module: Spec Desk Component Payload
// Description: Component catalog projection for the review UI.
// Purpose: Aggregate per-slot candidates across linked items with maker isolation.
// Dependencies: spec-desk-core, crate::payload, serde
// ============================================================================

//! ## Overview
//! The component payload lists every catalog entry of one component type.
//! Each slot (name, maker, each property) aggregates candidates from all
//! linked products plus workbook sources; `candidate_count` always equals the
//! candidate list length. Two components sharing a name but differing in
//! maker are distinct rows, and aggregation never crosses maker boundaries
//! because links target identity rows. Properties with an
//! `override_allowed` variance policy never compute violations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::AiConfirmStatus;
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::ComponentIdentityRow;
use spec_desk_core::ComponentType;
use spec_desk_core::ComponentValueRow;
use spec_desk_core::Constraint;
use spec_desk_core::EnumPolicy;
use spec_desk_core::FieldKey;
use spec_desk_core::FieldRules;
use spec_desk_core::ItemComponentLinkRow;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::KnownValues;
use spec_desk_core::ProductId;
use spec_desk_core::PropertyKey;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_core::VariancePolicy;
use spec_desk_core::normalize_value;

use crate::payload::CandidatePayload;
use crate::payload::ConfidenceColor;
use crate::payload::REASON_PENDING_AI;
use crate::payload::confidence_color;
use crate::payload::sort_candidate_payloads;
use crate::payload::synthesize_missing_selection;

// ============================================================================
// SECTION: Payload Shapes
// ============================================================================

/// One variance violation between a linked item and the shared value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceViolation {
    /// Product carrying the divergent value.
    pub product_id: ProductId,
    /// The item's value.
    pub item_value: String,
    /// The shared component value.
    pub shared_value: String,
}

/// One tracked slot in a component row: the name, the maker, or a property.
///
/// # Invariants
/// - `candidate_count == candidates.len()`.
/// - `variance_violations` is empty when the effective policy is
///   `override_allowed` or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotPayload {
    /// Slot value, when any.
    pub value: Option<String>,
    /// Slot confidence.
    pub confidence: f64,
    /// Confidence display color.
    pub color: ConfidenceColor,
    /// Number of aggregated candidate rows.
    pub candidate_count: usize,
    /// Aggregated candidate rows in payload order.
    pub candidates: Vec<CandidatePayload>,
    /// Whether the slot still needs review.
    pub needs_review: bool,
    /// Stable reason codes explaining the review flag.
    pub reason_codes: Vec<String>,
    /// Candidate accepted for the slot, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Whether a reviewer overrode the slot.
    pub overridden: bool,
    /// Effective variance policy for the slot.
    pub variance_policy: Option<VariancePolicy>,
    /// Constraints inherited from the global field rules.
    pub constraints: Vec<Constraint>,
    /// Enum policy inherited from the global field rules, when any.
    pub enum_policy: Option<EnumPolicy>,
    /// Known enum values inherited from the global field rules.
    pub enum_values: Vec<String>,
    /// Variance violations across linked items.
    pub variance_violations: Vec<VarianceViolation>,
}

/// One component catalog row in the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRowPayload {
    /// Canonical component name.
    pub name: String,
    /// Component maker.
    pub maker: String,
    /// Known aliases.
    pub aliases: Vec<String>,
    /// External links.
    pub links: Vec<String>,
    /// Products linked to this component.
    pub linked_products: Vec<ProductId>,
    /// Tracked name slot.
    pub name_tracked: SlotPayload,
    /// Tracked maker slot.
    pub maker_tracked: SlotPayload,
    /// Tracked property slots keyed by property key.
    pub properties: BTreeMap<PropertyKey, SlotPayload>,
}

/// Component payload for one `(category, component_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPayload {
    /// Component type.
    pub component_type: ComponentType,
    /// Catalog rows.
    pub components: Vec<ComponentRowPayload>,
}

// ============================================================================
// SECTION: Builder Inputs
// ============================================================================

/// Prefetched inputs for one component row's projection.
#[derive(Debug, Clone)]
pub struct ComponentInputs<'a> {
    /// Catalog identity row.
    pub identity: &'a ComponentIdentityRow,
    /// Shared property value rows.
    pub values: &'a [ComponentValueRow],
    /// Item links for this identity.
    pub links: &'a [ItemComponentLinkRow],
    /// Aggregated name candidates from linked items.
    pub name_candidates: Vec<Candidate>,
    /// Aggregated property candidates from linked items, keyed by property.
    pub property_candidates: BTreeMap<PropertyKey, Vec<Candidate>>,
    /// Linked item values per property, for variance computation.
    pub item_property_values: BTreeMap<PropertyKey, Vec<(ProductId, String)>>,
    /// Review rows per property slot.
    pub reviews: BTreeMap<PropertyKey, KeyReviewStateRow>,
    /// Global field rules.
    pub rules: &'a FieldRules,
    /// Known enum values keyed by field.
    pub known_values: &'a BTreeMap<FieldKey, KnownValues>,
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds one component catalog row from prefetched inputs.
#[must_use]
pub fn build_component_row(inputs: &ComponentInputs<'_>) -> ComponentRowPayload {
    let linked_products: Vec<ProductId> =
        inputs.links.iter().map(|link| link.product_id.clone()).collect();
    let identity_confidence = if inputs.identity.source == ValueSource::Pipeline {
        inputs.links.iter().map(|link| link.score).fold(0.0, f64::max)
    } else {
        1.0
    };

    let name_tracked = build_identity_slot(
        &inputs.identity.canonical_name,
        identity_confidence,
        inputs.identity.source,
        &inputs.name_candidates,
    );
    let maker_tracked = build_identity_slot(
        &inputs.identity.maker,
        identity_confidence,
        inputs.identity.source,
        &[],
    );

    let mut properties = BTreeMap::new();
    for value_row in inputs.values {
        let slot = build_property_slot(inputs, value_row);
        properties.insert(value_row.property_key.clone(), slot);
    }

    ComponentRowPayload {
        name: inputs.identity.canonical_name.clone(),
        maker: inputs.identity.maker.clone(),
        aliases: inputs.identity.aliases.clone(),
        links: inputs.identity.links.clone(),
        linked_products,
        name_tracked,
        maker_tracked,
        properties,
    }
}

/// Builds the payload for one component type from prefetched rows.
#[must_use]
pub fn build_component_payload(
    component_type: ComponentType,
    components: &[ComponentInputs<'_>],
) -> ComponentPayload {
    ComponentPayload {
        component_type,
        components: components.iter().map(build_component_row).collect(),
    }
}

/// Builds the tracked slot for the component name or maker.
fn build_identity_slot(
    value: &str,
    confidence: f64,
    source: ValueSource,
    aggregated: &[Candidate],
) -> SlotPayload {
    let mut candidates: Vec<CandidatePayload> =
        aggregated.iter().map(CandidatePayload::from_candidate).collect();
    if source != ValueSource::Pipeline && !value.is_empty() {
        candidates.push(workbook_candidate(value));
    }
    sort_candidate_payloads(&mut candidates);
    SlotPayload {
        value: if value.is_empty() { None } else { Some(value.to_string()) },
        confidence,
        color: confidence_color(confidence),
        candidate_count: candidates.len(),
        candidates,
        needs_review: false,
        reason_codes: Vec::new(),
        accepted_candidate_id: None,
        overridden: false,
        variance_policy: None,
        constraints: Vec::new(),
        enum_policy: None,
        enum_values: Vec::new(),
        variance_violations: Vec::new(),
    }
}

/// Builds one tracked property slot.
fn build_property_slot(
    inputs: &ComponentInputs<'_>,
    value_row: &ComponentValueRow,
) -> SlotPayload {
    let review = inputs.reviews.get(&value_row.property_key);
    let field_key = value_row.property_key.as_field_key();
    let rule = inputs.rules.get(&field_key);

    let mut candidates: Vec<CandidatePayload> = inputs
        .property_candidates
        .get(&value_row.property_key)
        .map(|aggregated| aggregated.iter().map(CandidatePayload::from_candidate).collect())
        .unwrap_or_default();
    if inputs.identity.source != ValueSource::Pipeline
        && let Some(value) = &value_row.value
    {
        candidates.push(workbook_candidate(value));
    }
    synthesize_missing_selection(
        &mut candidates,
        review.and_then(|review| review.selected_candidate_id.as_ref()),
        review
            .and_then(|review| review.selected_value.as_deref())
            .or(value_row.value.as_deref()),
        |value| normalize_value(value),
        value_row.confidence,
    );
    sort_candidate_payloads(&mut candidates);

    // Variance policy comes from the DB row; metadata comes from the rules.
    let variance_policy =
        value_row.variance_policy.or_else(|| rule.and_then(|rule| rule.variance_policy));
    let known = inputs.known_values.get(&field_key);

    let ai_pending = review
        .is_none_or(|review| review.shared.ai_confirm_status == AiConfirmStatus::Pending);
    let needs_review = ai_pending || value_row.needs_review;
    let mut reason_codes = Vec::new();
    if ai_pending {
        reason_codes.push(REASON_PENDING_AI.to_string());
    }

    let variance_violations = compute_variance_violations(
        variance_policy,
        value_row.value.as_deref(),
        inputs.item_property_values.get(&value_row.property_key).map_or(&[][..], Vec::as_slice),
    );

    SlotPayload {
        value: value_row.value.clone(),
        confidence: value_row.confidence,
        color: confidence_color(value_row.confidence),
        candidate_count: candidates.len(),
        candidates,
        needs_review,
        reason_codes,
        accepted_candidate_id: value_row.accepted_candidate_id.clone(),
        overridden: value_row.overridden,
        variance_policy,
        constraints: rule.map(|rule| rule.constraints.clone()).unwrap_or_default(),
        enum_policy: known.map(|known| known.policy),
        enum_values: known.map(|known| known.values.clone()).unwrap_or_default(),
        variance_violations,
    }
}

/// Computes variance violations for one property under its effective policy.
fn compute_variance_violations(
    policy: Option<VariancePolicy>,
    shared_value: Option<&str>,
    item_values: &[(ProductId, String)],
) -> Vec<VarianceViolation> {
    let (Some(policy), Some(shared)) = (policy, shared_value) else {
        return Vec::new();
    };
    match policy {
        // Override-allowed properties never compute violations.
        VariancePolicy::OverrideAllowed => Vec::new(),
        VariancePolicy::Authoritative => item_values
            .iter()
            .filter(|(_, item_value)| item_value.trim() != shared.trim())
            .map(|(product_id, item_value)| VarianceViolation {
                product_id: product_id.clone(),
                item_value: item_value.clone(),
                shared_value: shared.to_string(),
            })
            .collect(),
        VariancePolicy::UpperBound => item_values
            .iter()
            .filter(|(_, item_value)| {
                matches!(
                    (item_value.trim().parse::<f64>(), shared.trim().parse::<f64>()),
                    (Ok(item), Ok(bound)) if item > bound
                )
            })
            .map(|(product_id, item_value)| VarianceViolation {
                product_id: product_id.clone(),
                item_value: item_value.clone(),
                shared_value: shared.to_string(),
            })
            .collect(),
    }
}

/// Builds the workbook pseudo-candidate backing a curated slot value.
fn workbook_candidate(value: &str) -> CandidatePayload {
    CandidatePayload {
        candidate_id: CandidateId::new(format!("workbook::{}", normalize_value(value))),
        value: value.to_string(),
        normalized_value: normalize_value(value),
        score: 1.0,
        rank: 0,
        host: "workbook".to_string(),
        root_domain: "workbook".to_string(),
        method: "workbook".to_string(),
        tier: 0,
        evidence_url: String::new(),
        evidence_quote: String::new(),
        retrieved_at: Timestamp::from_unix_millis(0),
        synthesized: false,
    }
}
