// crates/spec-desk-review/src/payload/mod.rs
// ============================================================================
// Module: Spec Desk Payload Projection
// Description: Pure builders deriving review UI payloads from store rows.
// Purpose: Project grid, component, and enum payloads without mutation.
// Dependencies: spec-desk-core, serde
// ============================================================================

//! ## Overview
//! Payload projection is pure over the relational tables: rows in, payloads
//! out, no writes. When a recorded selection references a candidate row that
//! no longer exists, the builders synthesize a backing pseudo-candidate as a
//! final step so the UI stays coherent; synthesis is never a store write.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod component;
pub mod enum_list;
pub mod grid;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reason code for a field forced red by the extraction summary.
pub const REASON_BELOW_PASS_TARGET: &str = "below_pass_target";
/// Reason code for a slot whose AI lane is still pending.
pub const REASON_PENDING_AI: &str = "pending_ai";
/// Reason code for a slot carrying a cross-validation conflict.
pub const REASON_CONSTRAINT_CONFLICT: &str = "constraint_conflict";
/// Method label attached to synthesized backing candidates.
pub const SYNTHESIZED_METHOD: &str = "synthesized";
/// Tier assigned to synthesized backing candidates (sorts last).
pub const SYNTHESIZED_TIER: u8 = 99;

/// Confidence threshold below which a slot renders red.
const RED_BELOW: f64 = 0.6;
/// Confidence threshold below which a slot renders yellow.
const YELLOW_BELOW: f64 = 0.85;

// ============================================================================
// SECTION: Colors
// ============================================================================

/// Confidence color rendered by the review UI.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceColor {
    /// Confidence at or above the green threshold.
    Green,
    /// Confidence between the red and green thresholds.
    Yellow,
    /// Confidence below the red threshold, or forced by the summary.
    Red,
    /// No confidence recorded.
    Gray,
}

/// Maps a confidence value to its display color.
#[must_use]
pub fn confidence_color(confidence: f64) -> ConfidenceColor {
    if confidence == 0.0 {
        ConfidenceColor::Gray
    } else if confidence < RED_BELOW {
        ConfidenceColor::Red
    } else if confidence < YELLOW_BELOW {
        ConfidenceColor::Yellow
    } else {
        ConfidenceColor::Green
    }
}

// ============================================================================
// SECTION: Candidate Payload
// ============================================================================

/// One candidate as rendered in a payload.
///
/// # Invariants
/// - `synthesized` rows exist only in payloads, never in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePayload {
    /// Candidate identifier.
    pub candidate_id: CandidateId,
    /// Raw candidate value.
    pub value: String,
    /// Normalized candidate value.
    pub normalized_value: String,
    /// Extraction confidence score.
    pub score: f64,
    /// Extraction rank.
    pub rank: u32,
    /// Source host.
    pub host: String,
    /// Source root domain.
    pub root_domain: String,
    /// Extraction method label.
    pub method: String,
    /// Source trust tier.
    pub tier: u8,
    /// Evidence URL.
    pub evidence_url: String,
    /// Evidence quote.
    pub evidence_quote: String,
    /// Evidence retrieval timestamp.
    pub retrieved_at: Timestamp,
    /// Whether the row was synthesized to back a lost selection.
    pub synthesized: bool,
}

impl CandidatePayload {
    /// Builds a payload row from a stored candidate.
    #[must_use]
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            candidate_id: candidate.candidate_id.clone(),
            value: candidate.value.clone(),
            normalized_value: candidate.normalized_value.clone(),
            score: candidate.score,
            rank: candidate.rank,
            host: candidate.source.host.clone(),
            root_domain: candidate.source.root_domain.clone(),
            method: candidate.source.method.clone(),
            tier: candidate.source.tier,
            evidence_url: candidate.evidence.url.clone(),
            evidence_quote: candidate.evidence.quote.clone(),
            retrieved_at: candidate.evidence.retrieved_at,
            synthesized: false,
        }
    }

    /// Synthesizes a backing row for a selection whose candidate is gone.
    #[must_use]
    pub fn synthesized(
        candidate_id: CandidateId,
        value: &str,
        normalized_value: String,
        score: f64,
    ) -> Self {
        Self {
            candidate_id,
            value: value.to_string(),
            normalized_value,
            score,
            rank: u32::MAX,
            host: String::new(),
            root_domain: String::new(),
            method: SYNTHESIZED_METHOD.to_string(),
            tier: SYNTHESIZED_TIER,
            evidence_url: String::new(),
            evidence_quote: String::new(),
            retrieved_at: Timestamp::from_unix_millis(0),
            synthesized: true,
        }
    }

    /// Compares payload rows by `(tier asc, score desc, candidate_id asc)`.
    #[must_use]
    pub fn payload_order(&self, other: &Self) -> std::cmp::Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| other.score.total_cmp(&self.score))
            .then_with(|| self.candidate_id.cmp(&other.candidate_id))
    }
}

/// Sorts payload candidates by the payload ordering.
pub fn sort_candidate_payloads(candidates: &mut [CandidatePayload]) {
    candidates.sort_by(CandidatePayload::payload_order);
}

/// Appends a synthesized backing candidate when the recorded selection lost
/// its candidate row.
pub fn synthesize_missing_selection(
    candidates: &mut Vec<CandidatePayload>,
    selected_candidate_id: Option<&CandidateId>,
    selected_value: Option<&str>,
    normalized_value: impl FnOnce(&str) -> String,
    score: f64,
) {
    let Some(candidate_id) = selected_candidate_id else {
        return;
    };
    if candidates.iter().any(|candidate| &candidate.candidate_id == candidate_id) {
        return;
    }
    let Some(value) = selected_value else {
        return;
    };
    candidates.push(CandidatePayload::synthesized(
        candidate_id.clone(),
        value,
        normalized_value(value),
        score,
    ));
}
