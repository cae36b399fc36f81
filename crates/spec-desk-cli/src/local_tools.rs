// crates/spec-desk-cli/src/local_tools.rs
// ============================================================================
// Module: Spec Desk Local Toolset
// Description: Deterministic, network-free tool implementations.
// Purpose: Back `--local` run passes without external services.
// Dependencies: spec-desk-cortex, async-trait
// ============================================================================

//! ## Overview
//! The local toolset backs offline run passes: the auditor accepts fields
//! already at their pass target and rejects the rest, rescue and reasoning
//! return empty reports, and the cortex client counts a dry dispatch. This
//! keeps `cortex-run-pass --local` deterministic and side-effect free.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use spec_desk_cortex::AuditReport;
use spec_desk_cortex::AuditVerdict;
use spec_desk_cortex::CortexClient;
use spec_desk_cortex::DeepDispatchReport;
use spec_desk_cortex::DeepTask;
use spec_desk_cortex::DomRescuer;
use spec_desk_cortex::EvidenceAuditor;
use spec_desk_cortex::ProductRecord;
use spec_desk_cortex::ReasoningResolver;
use spec_desk_cortex::RescueReport;
use spec_desk_cortex::ResolutionReport;
use spec_desk_cortex::ToolError;

// ============================================================================
// SECTION: Local Toolset
// ============================================================================

/// Deterministic tool implementations for offline passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalToolSet;

#[async_trait]
impl EvidenceAuditor for LocalToolSet {
    async fn audit(&self, record: &ProductRecord) -> Result<AuditReport, ToolError> {
        let verdicts = record
            .fields
            .iter()
            .map(|(field_key, snapshot)| AuditVerdict {
                field_key: field_key.clone(),
                accepted: snapshot.at_target(),
                value: snapshot.value.clone(),
                confidence: snapshot.confidence,
            })
            .collect();
        Ok(AuditReport {
            verdicts,
            queries_issued: 0,
            urls_visited: 0,
        })
    }
}

#[async_trait]
impl DomRescuer for LocalToolSet {
    async fn rescue(
        &self,
        _record: &ProductRecord,
        _fields: &[spec_desk_core::FieldKey],
    ) -> Result<RescueReport, ToolError> {
        Ok(RescueReport::default())
    }
}

#[async_trait]
impl ReasoningResolver for LocalToolSet {
    async fn resolve(
        &self,
        _record: &ProductRecord,
        _fields: &[spec_desk_core::FieldKey],
    ) -> Result<ResolutionReport, ToolError> {
        Ok(ResolutionReport::default())
    }
}

#[async_trait]
impl CortexClient for LocalToolSet {
    async fn dispatch_deep(&self, tasks: &[DeepTask]) -> Result<DeepDispatchReport, ToolError> {
        Ok(DeepDispatchReport {
            dispatched: u32::try_from(tasks.len()).unwrap_or(u32::MAX),
        })
    }
}
