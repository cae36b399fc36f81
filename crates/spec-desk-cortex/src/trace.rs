// crates/spec-desk-cortex/src/trace.rs
// ============================================================================
// Module: Spec Desk Trace Writer
// Description: Ring-buffered JSON trace files and JSONL field timelines.
// Purpose: Persist per-stage orchestration reports for replay and debugging.
// Dependencies: spec-desk-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Traces live under `_runtime/traces/runs/{run_id}/{product_id}/{section}/`.
//! Each section is a ring of JSON files; the ring size is a parameter of each
//! trace call, so hot sections can keep more history. Field timelines are
//! append-only JSONL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use spec_desk_core::ArtifactStore;
use spec_desk_core::ArtifactStoreError;
use spec_desk_core::ProductId;
use spec_desk_core::RunId;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Storage prefix for trace runs.
pub const TRACE_RUNS_DIR: &str = "_runtime/traces/runs";
/// File name of the per-product field timeline.
pub const FIELD_TIMELINE_FILE: &str = "field_timeline.jsonl";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Trace writer errors.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Storage access failed.
    #[error("trace storage error: {0}")]
    Storage(#[from] ArtifactStoreError),
    /// A trace payload could not serialize.
    #[error("trace serialization error: {0}")]
    Serialization(String),
    /// The ring size parameter was zero.
    #[error("trace ring size must be greater than zero")]
    ZeroRingSize,
}

// ============================================================================
// SECTION: Trace Writer
// ============================================================================

/// Ring-buffered trace writer for one run.
///
/// # Invariants
/// - Sequence counters are per `(product, section)` and monotonic within the
///   writer's lifetime.
pub struct TraceWriter<S> {
    /// Storage backend.
    store: S,
    /// Run identifier.
    run_id: RunId,
    /// Per-`(product, section)` sequence counters.
    sequences: Mutex<BTreeMap<String, u64>>,
}

impl<S: ArtifactStore> TraceWriter<S> {
    /// Creates a trace writer for one run.
    #[must_use]
    pub fn new(store: S, run_id: RunId) -> Self {
        Self {
            store,
            run_id,
            sequences: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Writes one section report into its ring.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] on storage failure or a zero ring size.
    pub fn write_section(
        &self,
        product_id: &ProductId,
        section: &str,
        ring_size: u64,
        payload: &serde_json::Value,
    ) -> Result<(), TraceError> {
        if ring_size == 0 {
            return Err(TraceError::ZeroRingSize);
        }
        let sequence = self.next_sequence(product_id, section)?;
        let slot = sequence % ring_size;
        let key = self.store.resolve_output_key(&[
            TRACE_RUNS_DIR,
            self.run_id.as_str(),
            product_id.as_str(),
            section,
            &format!("{slot}.json"),
        ]);
        self.store.write_object(&key, payload, Some("application/json"))?;
        Ok(())
    }

    /// Appends one event to the product's field timeline.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] on storage or serialization failure.
    pub fn append_timeline(
        &self,
        product_id: &ProductId,
        event: &serde_json::Value,
    ) -> Result<(), TraceError> {
        let key = self.store.resolve_output_key(&[
            TRACE_RUNS_DIR,
            self.run_id.as_str(),
            product_id.as_str(),
            FIELD_TIMELINE_FILE,
        ]);
        let line = serde_json::to_string(event)
            .map_err(|err| TraceError::Serialization(err.to_string()))?;
        self.store.append_text(&key, &format!("{line}\n"))?;
        Ok(())
    }

    /// Advances and returns the sequence for a `(product, section)` pair.
    fn next_sequence(&self, product_id: &ProductId, section: &str) -> Result<u64, TraceError> {
        let mut guard = self.sequences.lock().map_err(|_| {
            TraceError::Storage(ArtifactStoreError::Io("trace mutex poisoned".to_string()))
        })?;
        let counter = guard.entry(format!("{product_id}::{section}")).or_insert(0);
        let sequence = *counter;
        *counter += 1;
        Ok(sequence)
    }
}
