// crates/spec-desk-ingest/src/artifacts.rs
// ============================================================================
// Module: Spec Desk Product Artifacts
// Description: Per-product extraction artifact shapes and loading.
// Purpose: Deserialize the latest normalized/provenance/summary/candidates set.
// Dependencies: spec-desk-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Extraction publishes four JSON artifacts per product under
//! `{output_root}/{category}/{product_id}/latest/`. The normalized record is
//! required; the remaining artifacts degrade to empty defaults when absent so
//! partially extracted products still seed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::ArtifactStore;
use spec_desk_core::ArtifactStoreError;
use spec_desk_core::Candidate;
use spec_desk_core::Category;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ProductId;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory holding the latest artifact set for a product.
const LATEST_DIR: &str = "latest";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact loading errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Storage access failed.
    #[error("artifact storage error: {0}")]
    Storage(#[from] ArtifactStoreError),
    /// An artifact exists but does not parse into its expected shape.
    #[error("malformed artifact {path}: {message}")]
    Malformed {
        /// Artifact key.
        path: String,
        /// Parse failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Artifact Shapes
// ============================================================================

/// One normalized field in the normalized record.
///
/// # Invariants
/// - `confidence` is within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedField {
    /// Resolved value, when any.
    pub value: Option<String>,
    /// Resolution confidence.
    pub confidence: f64,
    /// Origin of the resolved value.
    #[serde(default)]
    pub source: ValueSource,
    /// Whether a reviewer overrode the pipeline value.
    #[serde(default)]
    pub overridden: bool,
}

/// Normalized record artifact.
///
/// # Invariants
/// - `product_id` matches the artifact directory it was loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Product identifier.
    pub product_id: ProductId,
    /// Item identity.
    pub identity: ItemIdentity,
    /// Item lifecycle state.
    #[serde(default)]
    pub lifecycle: ItemLifecycle,
    /// Resolved fields keyed by field.
    pub fields: BTreeMap<FieldKey, NormalizedField>,
}

/// Per-field provenance summary artifact entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProvenanceEntry {
    /// Number of independent evidence references.
    #[serde(default)]
    pub evidence_count: u32,
    /// Best (lowest) evidence tier observed, when any.
    #[serde(default)]
    pub best_tier: Option<u8>,
    /// Freshest evidence timestamp, when known.
    #[serde(default)]
    pub observed_at: Option<Timestamp>,
}

/// Provenance artifact: per-field summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProvenanceRecord {
    /// Per-field provenance keyed by field.
    #[serde(default)]
    pub fields: BTreeMap<FieldKey, ProvenanceEntry>,
}

/// Summary artifact for one product extraction round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryRecord {
    /// Fields that finished below their pass target.
    #[serde(default)]
    pub fields_below_pass_target: Vec<FieldKey>,
    /// Whether item identity is locked.
    #[serde(default)]
    pub identity_locked: bool,
}

/// Candidate artifact: per-field candidate lists in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandidatesRecord {
    /// Candidates keyed by field.
    #[serde(default)]
    pub fields: BTreeMap<FieldKey, Vec<Candidate>>,
}

/// The complete artifact set for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductArtifacts {
    /// Normalized record.
    pub normalized: NormalizedRecord,
    /// Provenance summaries.
    pub provenance: ProvenanceRecord,
    /// Extraction summary.
    pub summary: SummaryRecord,
    /// Candidate lists.
    pub candidates: CandidatesRecord,
}

impl ProductArtifacts {
    /// Loads the latest artifact set for a product, returning `None` when the
    /// normalized record is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] on storage failure or malformed artifacts.
    pub fn load<S: ArtifactStore>(
        store: &S,
        output_root: &str,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Option<Self>, ArtifactError> {
        let Some(normalized) = read_artifact::<NormalizedRecord, S>(
            store,
            output_root,
            category,
            product_id,
            "normalized.json",
        )?
        else {
            return Ok(None);
        };
        let provenance = read_artifact::<ProvenanceRecord, S>(
            store,
            output_root,
            category,
            product_id,
            "provenance.json",
        )?
        .unwrap_or_default();
        let summary = read_artifact::<SummaryRecord, S>(
            store,
            output_root,
            category,
            product_id,
            "summary.json",
        )?
        .unwrap_or_default();
        let candidates = read_artifact::<CandidatesRecord, S>(
            store,
            output_root,
            category,
            product_id,
            "candidates.json",
        )?
        .unwrap_or_default();
        Ok(Some(Self {
            normalized,
            provenance,
            summary,
            candidates,
        }))
    }
}

/// Reads one artifact file into its typed shape.
fn read_artifact<T: for<'de> Deserialize<'de>, S: ArtifactStore>(
    store: &S,
    output_root: &str,
    category: &Category,
    product_id: &ProductId,
    file_name: &str,
) -> Result<Option<T>, ArtifactError> {
    let key = store.resolve_output_key(&[
        output_root,
        category.as_str(),
        product_id.as_str(),
        LATEST_DIR,
        file_name,
    ]);
    let Some(value) = store.read_json_or_null(&key)? else {
        return Ok(None);
    };
    serde_json::from_value(value).map(Some).map_err(|err| ArtifactError::Malformed {
        path: key.as_str().to_string(),
        message: err.to_string(),
    })
}
