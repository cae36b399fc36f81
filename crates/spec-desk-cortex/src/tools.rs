// crates/spec-desk-cortex/src/tools.rs
// ============================================================================
// Module: Spec Desk Cortex Tools
// Description: External tool interfaces for aggressive-mode orchestration.
// Purpose: Define auditor, rescuer, resolver, and cortex client seams.
// Dependencies: spec-desk-core, async-trait, serde, thiserror, tokio
// ============================================================================

//! ## Overview
//! External tools are asynchronous seams with per-call timeouts. A timeout
//! surfaces as a typed error and never mutates the store; retrying is the
//! caller's responsibility. Implementations live outside the core (LLM
//! prompting, DOM extraction, remote cortex dispatch).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::Candidate;
use spec_desk_core::Category;
use spec_desk_core::FieldKey;
use spec_desk_core::ProductId;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// External tool errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The tool exceeded its per-call timeout.
    #[error("tool {tool} timed out after {timeout_ms}ms")]
    Timeout {
        /// Tool label.
        tool: &'static str,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },
    /// The tool reported a fault.
    #[error("tool {tool} faulted: {message}")]
    Faulted {
        /// Tool label.
        tool: &'static str,
        /// Fault description.
        message: String,
    },
}

/// Awaits a tool call under a per-call timeout.
///
/// # Errors
///
/// Returns [`ToolError::Timeout`] when the deadline elapses; the inner error
/// passes through unchanged.
pub async fn with_timeout<T>(
    tool: &'static str,
    timeout_ms: u64,
    call: impl Future<Output = Result<T, ToolError>> + Send,
) -> Result<T, ToolError> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(ToolError::Timeout {
            tool,
            timeout_ms,
        }),
    }
}

// ============================================================================
// SECTION: Working Record
// ============================================================================

/// One field snapshot in the orchestrator's working record.
///
/// # Invariants
/// - `candidates` holds evidence awaiting audit; the rescue lane appends to
///   it so the re-audit sees what rescue found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// Current value, when any.
    pub value: Option<String>,
    /// Current confidence in `[0, 1]`.
    pub confidence: f64,
    /// Pass target for the field.
    pub pass_target: f64,
    /// Whether the field is critical.
    pub critical: bool,
    /// Pending candidates awaiting audit.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl FieldSnapshot {
    /// Returns whether the field already meets its pass target.
    #[must_use]
    pub fn at_target(&self) -> bool {
        self.value.is_some() && self.confidence >= self.pass_target
    }
}

/// The orchestrator's working record for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Category identifier.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Field snapshots keyed by field.
    pub fields: BTreeMap<FieldKey, FieldSnapshot>,
}

// ============================================================================
// SECTION: Evidence Auditor
// ============================================================================

/// One per-field audit verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditVerdict {
    /// Audited field.
    pub field_key: FieldKey,
    /// Whether the current evidence supports the value.
    pub accepted: bool,
    /// Value the auditor settled on, when accepted.
    pub value: Option<String>,
    /// Auditor confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Evidence audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AuditReport {
    /// Per-field verdicts.
    pub verdicts: Vec<AuditVerdict>,
    /// Search queries issued while auditing.
    #[serde(default)]
    pub queries_issued: u32,
    /// URLs visited while auditing.
    #[serde(default)]
    pub urls_visited: u32,
}

/// Evidence auditor seam.
#[async_trait]
pub trait EvidenceAuditor: Send + Sync {
    /// Audits the current candidates of one product record.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the audit cannot complete.
    async fn audit(&self, record: &ProductRecord) -> Result<AuditReport, ToolError>;
}

// ============================================================================
// SECTION: DOM Rescuer
// ============================================================================

/// DOM rescue report: fresh candidates per rescued field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RescueReport {
    /// Rescued candidates keyed by field.
    pub candidates: BTreeMap<FieldKey, Vec<Candidate>>,
    /// URLs visited while rescuing.
    #[serde(default)]
    pub urls_visited: u32,
}

/// DOM rescue seam for rejected critical fields.
#[async_trait]
pub trait DomRescuer: Send + Sync {
    /// Re-extracts the given fields from raw page structure.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when rescue cannot complete.
    async fn rescue(
        &self,
        record: &ProductRecord,
        fields: &[FieldKey],
    ) -> Result<RescueReport, ToolError>;
}

// ============================================================================
// SECTION: Reasoning Resolver
// ============================================================================

/// One reasoning resolution for a below-target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolved field.
    pub field_key: FieldKey,
    /// Resolved value.
    pub value: String,
    /// Resolver confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Reasoning resolution report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResolutionReport {
    /// Resolutions in field order.
    pub resolutions: Vec<Resolution>,
    /// Search queries issued while reasoning.
    #[serde(default)]
    pub queries_issued: u32,
}

/// Reasoning resolver seam for fields evidence alone cannot settle.
#[async_trait]
pub trait ReasoningResolver: Send + Sync {
    /// Resolves the given fields by cross-source reasoning.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when resolution cannot complete.
    async fn resolve(
        &self,
        record: &ProductRecord,
        fields: &[FieldKey],
    ) -> Result<ResolutionReport, ToolError>;
}

// ============================================================================
// SECTION: Cortex Client
// ============================================================================

/// One bounded deep extraction task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepTask {
    /// Target product.
    pub product_id: ProductId,
    /// Target field.
    pub field_key: FieldKey,
    /// Dispatch priority (higher first).
    pub priority: f64,
    /// Reason label for the dispatch.
    pub reason: String,
}

/// Deep dispatch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeepDispatchReport {
    /// Number of tasks accepted for dispatch.
    pub dispatched: u32,
}

/// Cortex client seam dispatching bounded deep tasks.
#[async_trait]
pub trait CortexClient: Send + Sync {
    /// Dispatches a bounded set of deep tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when dispatch cannot complete.
    async fn dispatch_deep(&self, tasks: &[DeepTask]) -> Result<DeepDispatchReport, ToolError>;
}

// ============================================================================
// SECTION: Tool Set
// ============================================================================

/// The tool seams one orchestration pass runs against.
pub struct ToolSet<'a> {
    /// Evidence auditor.
    pub auditor: &'a dyn EvidenceAuditor,
    /// DOM rescuer.
    pub rescuer: &'a dyn DomRescuer,
    /// Reasoning resolver.
    pub resolver: &'a dyn ReasoningResolver,
    /// Cortex deep-task client.
    pub cortex: &'a dyn CortexClient,
}
