// crates/spec-desk-core/src/core/candidate.rs
// ============================================================================
// Module: Spec Desk Candidates
// Description: Per-source extracted assertions with evidence and provenance.
// Purpose: Capture every candidate value for an (item, field) slot.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A candidate is one extracted `(value, evidence, score)` triple for a
//! specific `(item, field)`. Candidates are inserted once per ingestion and
//! never mutated; higher-scoring candidates supersede by ordering, not by
//! rewriting. Ordering here is total and deterministic so payload projection
//! and tests agree byte-for-byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::ComponentType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Source Reference
// ============================================================================

/// Source triple describing where and how a candidate was extracted.
///
/// # Invariants
/// - `root_domain` is the registrable domain of `host`.
/// - `tier` is 1-based; lower tiers are more trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source host name.
    pub host: String,
    /// Registrable root domain of the host.
    pub root_domain: String,
    /// Extraction method label (e.g. `dom`, `llm`, `template`).
    pub method: String,
    /// Source trust tier (lower is better).
    pub tier: u8,
}

// ============================================================================
// SECTION: Evidence
// ============================================================================

/// Evidence citation backing a candidate.
///
/// # Invariants
/// - `quote` is verbatim source text; it is never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Snippet identifier within the source artifact.
    pub snippet_id: String,
    /// Verbatim quoted text.
    pub quote: String,
    /// Source URL the quote was retrieved from.
    pub url: String,
    /// Retrieval timestamp.
    pub retrieved_at: Timestamp,
}

// ============================================================================
// SECTION: Candidate
// ============================================================================

/// One extracted assertion for an `(item, field)` slot.
///
/// # Invariants
/// - `score` is within `[0, 1]`.
/// - `normalized_value` is the canonical normalized form of `value`.
/// - Rows are immutable after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate identifier (disambiguated at the store boundary).
    pub candidate_id: CandidateId,
    /// Raw extracted value.
    pub value: String,
    /// Canonical normalized form of `value`.
    pub normalized_value: String,
    /// Extraction confidence score in `[0, 1]`.
    pub score: f64,
    /// Extraction rank assigned by the pipeline (lower is better).
    pub rank: u32,
    /// Source triple.
    pub source: SourceRef,
    /// Evidence citation.
    pub evidence: Evidence,
    /// Whether the field is component-backed.
    pub is_component_field: bool,
    /// Whether the field is list-valued.
    pub is_list_field: bool,
    /// Component type for component-backed fields.
    pub component_type: Option<ComponentType>,
}

impl Candidate {
    /// Compares candidates by `(rank asc, score desc, candidate_id asc)`.
    ///
    /// This is the store ordering for `candidates_for_field`.
    #[must_use]
    pub fn field_order(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| other.score.total_cmp(&self.score))
            .then_with(|| self.candidate_id.cmp(&other.candidate_id))
    }

    /// Compares candidates by `(tier asc, score desc, candidate_id asc)`.
    ///
    /// This is the payload ordering; the top entry decides the enclosing
    /// field state's source, method, and tier.
    #[must_use]
    pub fn payload_order(&self, other: &Self) -> Ordering {
        self.source
            .tier
            .cmp(&other.source.tier)
            .then_with(|| other.score.total_cmp(&self.score))
            .then_with(|| self.candidate_id.cmp(&other.candidate_id))
    }
}

/// Sorts candidates in place by the store field ordering.
pub fn sort_by_field_order(candidates: &mut [Candidate]) {
    candidates.sort_by(Candidate::field_order);
}

/// Sorts candidates in place by the payload ordering.
pub fn sort_by_payload_order(candidates: &mut [Candidate]) {
    candidates.sort_by(Candidate::payload_order);
}
