// crates/spec-desk-core/src/core/review.rs
// ============================================================================
// Module: Spec Desk Review State
// Description: Dual-lane review rows, slot references, and pure lane transitions.
// Purpose: Govern accept/confirm semantics across grid, component, and enum scopes.
// Dependencies: crate::core::{identifiers, rules, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! Every review target is addressed by a slot: a target kind plus the
//! identifying row ids that kind requires. Each slot carries two independent
//! lanes (`primary`, `shared`), and each lane carries two independent fields:
//! an AI-confirm status and a user-accept status. Transitions are pure
//! functions over a row; the store composes them with a transactional write
//! and returns the persisted row so callers never guess at state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::Category;
use crate::core::identifiers::ComponentIdentityId;
use crate::core::identifiers::ComponentValueId;
use crate::core::identifiers::EnumListId;
use crate::core::identifiers::ItemFieldStateId;
use crate::core::identifiers::KeyReviewStateId;
use crate::core::identifiers::ListValueId;
use crate::core::identifiers::PropertyKey;
use crate::core::rules::is_unknown_value;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Target Kind and Lanes
// ============================================================================

/// Review target kind: the scope a review row addresses.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Per item-field slot.
    GridKey,
    /// Per component-property slot.
    ComponentKey,
    /// Per enum-value slot.
    EnumKey,
}

impl TargetKind {
    /// Returns a stable label for the target kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GridKey => "grid_key",
            Self::ComponentKey => "component_key",
            Self::EnumKey => "enum_key",
        }
    }
}

/// Review lane: primary (item-local) or shared (cross-item).
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Item-local lane.
    Primary,
    /// Cross-item shared lane.
    Shared,
}

impl Lane {
    /// Returns a stable label for the lane.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Shared => "shared",
        }
    }
}

/// User-accept lane status.
///
/// # Invariants
/// - Monotonic within a stable selection: `pending -> accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserAcceptStatus {
    /// No user acceptance recorded.
    #[default]
    Pending,
    /// A reviewer accepted the selection.
    Accepted,
}

impl UserAcceptStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

/// AI-confirm lane status.
///
/// # Invariants
/// - Monotonic within a stable selection: `pending -> confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiConfirmStatus {
    /// Candidates of the slot remain unreviewed.
    #[default]
    Pending,
    /// Every candidate of the slot carries a terminal review.
    Confirmed,
}

impl AiConfirmStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }
}

// ============================================================================
// SECTION: Slot References
// ============================================================================

/// Slot reference: the identifying ids a review row requires, dictated by its
/// target kind.
///
/// # Invariants
/// - The variant determines the target kind; endpoints dispatch on the
///   variant, so a kind mismatch is a typed rejection rather than a state bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target_kind", rename_all = "snake_case")]
pub enum SlotRef {
    /// Grid slot addressing one item-field state row.
    GridKey {
        /// Item field state row id.
        item_field_state_id: ItemFieldStateId,
    },
    /// Component slot addressing one shared property value.
    ComponentKey {
        /// Component identity row id.
        component_identity_id: ComponentIdentityId,
        /// Component value row id.
        component_value_id: ComponentValueId,
        /// Human-readable component identifier (name or name+maker).
        component_identifier: String,
        /// Property key the slot addresses.
        property_key: PropertyKey,
    },
    /// Enum slot addressing one list-value row.
    EnumKey {
        /// List value row id.
        list_value_id: ListValueId,
        /// Owning enum list row id.
        enum_list_id: EnumListId,
        /// Normalized enum member value.
        enum_value_norm: String,
    },
}

impl SlotRef {
    /// Returns the target kind dictated by the variant.
    #[must_use]
    pub const fn target_kind(&self) -> TargetKind {
        match self {
            Self::GridKey { .. } => TargetKind::GridKey,
            Self::ComponentKey { .. } => TargetKind::ComponentKey,
            Self::EnumKey { .. } => TargetKind::EnumKey,
        }
    }

    /// Returns the canonical slot key used for unique indexing and audit.
    #[must_use]
    pub fn slot_key(&self) -> String {
        match self {
            Self::GridKey {
                item_field_state_id,
            } => format!("ifs::{item_field_state_id}"),
            Self::ComponentKey {
                component_identity_id,
                component_value_id,
                property_key,
                ..
            } => format!("ci::{component_identity_id}::cv::{component_value_id}::{property_key}"),
            Self::EnumKey {
                list_value_id,
                enum_list_id,
                enum_value_norm,
            } => format!("el::{enum_list_id}::lv::{list_value_id}::{enum_value_norm}"),
        }
    }
}

// ============================================================================
// SECTION: Lane Slot State
// ============================================================================

/// One lane's state: independent AI-confirm and user-accept fields.
///
/// # Invariants
/// - Fields are mutated only by their owning lane action; accept never sets
///   AI-confirm and confirm never sets user-accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LaneSlot {
    /// AI-confirm status.
    pub ai_confirm_status: AiConfirmStatus,
    /// AI-confirm confidence, when a confirmation was recorded.
    pub ai_confirm_confidence: Option<f64>,
    /// AI-confirm timestamp, when a confirmation was recorded.
    pub ai_confirm_at: Option<Timestamp>,
    /// User-accept status.
    pub user_accept_status: UserAcceptStatus,
    /// User-accept timestamp, when an acceptance was recorded.
    pub user_accept_at: Option<Timestamp>,
}

impl LaneSlot {
    /// Returns the pending baseline a selection change regresses to.
    #[must_use]
    pub const fn pending_baseline() -> Self {
        Self {
            ai_confirm_status: AiConfirmStatus::Pending,
            ai_confirm_confidence: None,
            ai_confirm_at: None,
            user_accept_status: UserAcceptStatus::Pending,
            user_accept_at: None,
        }
    }
}

// ============================================================================
// SECTION: Review State Row
// ============================================================================

/// Review state row for one slot.
///
/// # Invariants
/// - Identity is `(category, target_kind, slot ids)`, never the candidate id;
///   two rows sharing a `selected_candidate_id` stay isolated.
/// - Rows are created on first observation of a slot and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyReviewStateRow {
    /// Row identifier.
    pub id: KeyReviewStateId,
    /// Category identifier.
    pub category: Category,
    /// Slot reference.
    pub slot: SlotRef,
    /// Currently recorded selection value, when any.
    pub selected_value: Option<String>,
    /// Currently recorded selection candidate, when any.
    pub selected_candidate_id: Option<CandidateId>,
    /// Primary lane state.
    pub primary: LaneSlot,
    /// Shared lane state.
    pub shared: LaneSlot,
}

impl KeyReviewStateRow {
    /// Returns the state for a lane.
    #[must_use]
    pub const fn lane(&self, lane: Lane) -> &LaneSlot {
        match lane {
            Lane::Primary => &self.primary,
            Lane::Shared => &self.shared,
        }
    }

    /// Returns the mutable state for a lane.
    #[must_use]
    pub const fn lane_mut(&mut self, lane: Lane) -> &mut LaneSlot {
        match lane {
            Lane::Primary => &mut self.primary,
            Lane::Shared => &mut self.shared,
        }
    }
}

// ============================================================================
// SECTION: Lane Actions
// ============================================================================

/// Lane action kind.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneActionKind {
    /// Reviewer acceptance (`user_accept`).
    Accept,
    /// AI confirmation (`ai_confirm`).
    Confirm,
}

impl LaneActionKind {
    /// Returns a stable label for the action kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Confirm => "confirm",
        }
    }
}

/// One lane action against a review row.
///
/// # Invariants
/// - `candidate_id_required` reflects the endpoint contract plus whether the
///   slot currently has candidates.
/// - `advance_ai_lane` is meaningful for confirms only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneAction {
    /// Lane the action targets.
    pub lane: Lane,
    /// Action kind.
    pub kind: LaneActionKind,
    /// Selected value the action asserts.
    pub selected_value: String,
    /// Candidate the action is scoped to.
    pub candidate_id: Option<CandidateId>,
    /// Confirmation confidence (confirm only).
    pub confidence: Option<f64>,
    /// Whether a missing candidate id rejects the action.
    pub candidate_id_required: bool,
    /// Whether this confirm terminalizes the lane status.
    pub advance_ai_lane: bool,
    /// Action timestamp.
    pub at: Timestamp,
}

/// Typed rejection from a lane transition.
///
/// # Invariants
/// - `code()` values are stable wire labels surfaced by the review endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReviewErrorKind {
    /// The slot's target kind does not match the endpoint contract.
    #[error("review target kind does not match the endpoint contract")]
    LaneContextMismatch,
    /// Candidates exist for the slot but no candidate id was supplied.
    #[error("candidate id required when the slot has candidates")]
    CandidateIdRequired,
    /// The selected value normalizes to the unknown sentinel.
    #[error("unknown values are not actionable")]
    UnknownValueNotActionable,
}

impl ReviewErrorKind {
    /// Returns the stable machine-readable code for the rejection.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::LaneContextMismatch => "lane_context_mismatch",
            Self::CandidateIdRequired => "candidate_id_required",
            Self::UnknownValueNotActionable => "unknown_value_not_actionable",
        }
    }
}

// ============================================================================
// SECTION: Lane Transition
// ============================================================================

/// Applies a lane action to a review row, returning the post-state.
///
/// Guard order is part of the contract: the candidate-id guard fires before
/// the unknown-value guard. A selection change regresses all four lane fields
/// to their pending baselines before the action applies.
///
/// # Errors
///
/// Returns [`ReviewErrorKind`] when a guard rejects the action; the input row
/// is untouched in that case.
pub fn lane_transition(
    pre: &KeyReviewStateRow,
    action: &LaneAction,
) -> Result<KeyReviewStateRow, ReviewErrorKind> {
    if action.candidate_id.is_none() && action.candidate_id_required {
        return Err(ReviewErrorKind::CandidateIdRequired);
    }
    if is_unknown_value(&action.selected_value) {
        return Err(ReviewErrorKind::UnknownValueNotActionable);
    }

    let mut post = pre.clone();
    if selection_changed(pre, action) {
        post.primary = LaneSlot::pending_baseline();
        post.shared = LaneSlot::pending_baseline();
    }
    post.selected_value = Some(action.selected_value.clone());
    post.selected_candidate_id = action.candidate_id.clone();

    let lane = post.lane_mut(action.lane);
    match action.kind {
        LaneActionKind::Accept => {
            lane.user_accept_status = UserAcceptStatus::Accepted;
            lane.user_accept_at = Some(action.at);
        }
        LaneActionKind::Confirm => {
            lane.ai_confirm_confidence = action.confidence;
            lane.ai_confirm_at = Some(action.at);
            if action.advance_ai_lane {
                lane.ai_confirm_status = AiConfirmStatus::Confirmed;
            }
        }
    }
    Ok(post)
}

/// Returns whether the action's selection differs from the recorded one.
///
/// A row with no recorded selection adopts the incoming one without a
/// regression; only a recorded, differing value or candidate regresses.
fn selection_changed(pre: &KeyReviewStateRow, action: &LaneAction) -> bool {
    let value_changed = pre
        .selected_value
        .as_deref()
        .is_some_and(|recorded| recorded != action.selected_value.as_str());
    let candidate_changed = pre
        .selected_candidate_id
        .as_ref()
        .is_some_and(|recorded| Some(recorded) != action.candidate_id.as_ref());
    value_changed || candidate_changed
}

// ============================================================================
// SECTION: Audit and Candidate Reviews
// ============================================================================

/// Append-only audit record for one lane transition.
///
/// # Invariants
/// - Records are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyReviewAuditRecord {
    /// Category identifier.
    pub category: Category,
    /// Target kind of the mutated row.
    pub target_kind: TargetKind,
    /// Canonical slot key of the mutated row.
    pub slot_key: String,
    /// Lane the action targeted.
    pub lane: Lane,
    /// Action kind.
    pub action: LaneActionKind,
    /// Candidate the action was scoped to, when any.
    pub candidate_id: Option<CandidateId>,
    /// Selection value the action asserted.
    pub selected_value: String,
    /// Action timestamp.
    pub at: Timestamp,
}

/// Candidate-level review decision.
///
/// # Invariants
/// - `Accepted` and `Rejected` are terminal; `Neutral` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// No decision recorded.
    #[default]
    Neutral,
    /// Candidate accepted for the slot.
    Accepted,
    /// Candidate rejected for the slot.
    Rejected,
}

impl ReviewDecision {
    /// Returns whether the decision is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Returns a stable label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Candidate review row linking a candidate to a slot with a decision.
///
/// # Invariants
/// - `(category, target_kind, slot_key, candidate_id)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReviewRow {
    /// Category identifier.
    pub category: Category,
    /// Target kind of the reviewed slot.
    pub target_kind: TargetKind,
    /// Canonical slot key of the reviewed slot.
    pub slot_key: String,
    /// Reviewed candidate identifier (store-disambiguated form).
    pub candidate_id: CandidateId,
    /// Review decision.
    pub decision: ReviewDecision,
    /// Value asserted by the review, when any.
    pub value: Option<String>,
    /// Review timestamp.
    pub reviewed_at: Timestamp,
}
