// crates/spec-desk-cortex/src/orchestrator.rs
// ============================================================================
// Module: Spec Desk Aggressive-Mode Orchestrator
// Description: Staged escalation loop: audit, rescue, reasoning, deep tasks.
// Purpose: Drive bounded extraction escalation with typed, traced stage reports.
// Dependencies: spec-desk-core, crate::{route, tools, trace}, serde, tokio, tracing
// ============================================================================

//! ## Overview
//! The orchestrator runs only in aggressive mode; other modes short-circuit
//! with a disabled report. Each stage produces a typed report written to the
//! trace ring buffer before the next stage starts, and every applied value
//! change appends an event to the product's JSONL field timeline. Rescued
//! candidates merge into the working record so the re-audit sees them. Tool
//! faults are absorbed per task and logged; a fault never aborts the whole
//! round and never mutates the store. There is no implicit retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::ArtifactStore;
use spec_desk_core::FieldKey;
use spec_desk_core::ProductId;
use tracing::warn;

use crate::route::RouteContext;
use crate::route::plan_routes;
use crate::tools::AuditReport;
use crate::tools::DeepTask;
use crate::tools::ProductRecord;
use crate::tools::ResolutionReport;
use crate::tools::RescueReport;
use crate::tools::ToolSet;
use crate::tools::with_timeout;
use crate::trace::TraceError;
use crate::trace::TraceWriter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable enabling cortex orchestration.
pub const ENV_CORTEX_ENABLED: &str = "CORTEX_ENABLED";
/// Environment variable capping deep tasks per product.
pub const ENV_CORTEX_MAX_DEEP_FIELDS: &str = "CORTEX_MAX_DEEP_FIELDS_PER_PRODUCT";

/// Default per-product deep task cap.
pub const DEFAULT_MAX_DEEP_FIELDS: u32 = 4;
/// Default per-call tool timeout in milliseconds.
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;
/// Ring size used for stage reports.
const STAGE_RING_SIZE: u64 = 8;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Cortex orchestration mode.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CortexMode {
    /// Orchestration is disabled.
    #[default]
    Disabled,
    /// Standard extraction without escalation.
    Standard,
    /// Full escalation loop.
    Aggressive,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Orchestration mode.
    pub mode: CortexMode,
    /// Maximum deep tasks dispatched per product.
    pub max_deep_fields_per_product: u32,
    /// Per-call tool timeout in milliseconds.
    pub tool_timeout_ms: u64,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            mode: CortexMode::Disabled,
            max_deep_fields_per_product: DEFAULT_MAX_DEEP_FIELDS,
            tool_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Search activity recorded across one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SearchTracker {
    /// Search queries issued.
    pub queries_issued: u32,
    /// URLs visited.
    pub urls_visited: u32,
}

/// Deep escalation summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EscalationReport {
    /// Whether any deep task was dispatched.
    pub deep_triggered: bool,
    /// Per-product deep task cap in force.
    pub deep_task_cap: u32,
    /// Number of deep tasks dispatched.
    pub deep_task_count: u32,
}

/// Result of one aggressive-mode pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggressiveReport {
    /// Whether the pass ran.
    pub enabled: bool,
    /// Final stage label (`disabled` or `complete`).
    pub stage: String,
    /// Deep escalation summary.
    pub escalation: EscalationReport,
    /// Search activity summary.
    pub search_tracker: SearchTracker,
}

impl AggressiveReport {
    /// Returns the short-circuit report for non-aggressive modes.
    #[must_use]
    pub fn disabled(deep_task_cap: u32) -> Self {
        Self {
            enabled: false,
            stage: "disabled".to_string(),
            escalation: EscalationReport {
                deep_triggered: false,
                deep_task_cap,
                deep_task_count: 0,
            },
            search_tracker: SearchTracker::default(),
        }
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Aggressive-mode orchestrator over a tool set and trace writer.
pub struct Orchestrator<'a, S> {
    /// External tool seams.
    tools: ToolSet<'a>,
    /// Trace writer for stage reports.
    trace: &'a TraceWriter<S>,
    /// Orchestrator configuration.
    config: CortexConfig,
}

impl<'a, S: ArtifactStore> Orchestrator<'a, S> {
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(tools: ToolSet<'a>, trace: &'a TraceWriter<S>, config: CortexConfig) -> Self {
        Self {
            tools,
            trace,
            config,
        }
    }

    /// Runs one pass over a product record.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] when a stage report cannot be persisted; tool
    /// faults are absorbed per task and never abort the round.
    pub async fn run_pass(
        &self,
        record: &mut ProductRecord,
    ) -> Result<AggressiveReport, TraceError> {
        if self.config.mode != CortexMode::Aggressive {
            return Ok(AggressiveReport::disabled(self.config.max_deep_fields_per_product));
        }
        let product_id = record.product_id.clone();
        let mut tracker = SearchTracker::default();

        let mut audit = self.run_audit(record, &mut tracker).await;
        self.trace_stage(&product_id, "audit", &audit)?;

        let rejected_criticals: Vec<FieldKey> = audit
            .verdicts
            .iter()
            .filter(|verdict| !verdict.accepted)
            .filter(|verdict| {
                record.fields.get(&verdict.field_key).is_some_and(|field| field.critical)
            })
            .map(|verdict| verdict.field_key.clone())
            .collect();
        if !rejected_criticals.is_empty() {
            let rescue = self.run_rescue(record, &rejected_criticals, &mut tracker).await;
            self.trace_stage(&product_id, "rescue", &rescue)?;
            // The re-audit must see what rescue found.
            for (field_key, rescued) in rescue.candidates {
                if let Some(snapshot) = record.fields.get_mut(&field_key) {
                    snapshot.candidates.extend(rescued);
                }
            }
            audit = self.run_audit(record, &mut tracker).await;
            self.trace_stage(&product_id, "re_audit", &audit)?;
        }

        let mut applied = 0_u32;
        for verdict in &audit.verdicts {
            if !verdict.accepted {
                continue;
            }
            let Some(value) = &verdict.value else {
                continue;
            };
            if let Some(snapshot) = record.fields.get_mut(&verdict.field_key) {
                if snapshot.at_target() {
                    continue;
                }
                snapshot.value = Some(value.clone());
                snapshot.confidence = verdict.confidence;
                applied += 1;
                self.trace.append_timeline(
                    &product_id,
                    &serde_json::json!({
                        "field": verdict.field_key.as_str(),
                        "stage": "apply",
                        "value": value,
                        "confidence": verdict.confidence,
                    }),
                )?;
            }
        }
        self.trace_stage(
            &product_id,
            "apply",
            &serde_json::json!({ "applied_fields": applied }),
        )?;

        let open_fields = below_target_fields(record);
        if !open_fields.is_empty() {
            let resolution = self.run_reasoning(record, &open_fields, &mut tracker).await;
            for resolved in &resolution.resolutions {
                if let Some(snapshot) = record.fields.get_mut(&resolved.field_key)
                    && !snapshot.at_target()
                {
                    snapshot.value = Some(resolved.value.clone());
                    snapshot.confidence = resolved.confidence;
                    self.trace.append_timeline(
                        &product_id,
                        &serde_json::json!({
                            "field": resolved.field_key.as_str(),
                            "stage": "reasoning",
                            "value": resolved.value,
                            "confidence": resolved.confidence,
                        }),
                    )?;
                }
            }
            self.trace_stage(&product_id, "reasoning", &resolution)?;
        }

        let escalation = self.run_deep_stage(record, &mut tracker).await?;
        self.trace_stage(&product_id, "search_tracker", &tracker)?;

        Ok(AggressiveReport {
            enabled: true,
            stage: "complete".to_string(),
            escalation,
            search_tracker: tracker,
        })
    }

    /// Runs the evidence audit, absorbing tool faults into an empty report.
    async fn run_audit(
        &self,
        record: &ProductRecord,
        tracker: &mut SearchTracker,
    ) -> AuditReport {
        let result = with_timeout(
            "evidence_auditor",
            self.config.tool_timeout_ms,
            self.tools.auditor.audit(record),
        )
        .await;
        match result {
            Ok(report) => {
                tracker.queries_issued += report.queries_issued;
                tracker.urls_visited += report.urls_visited;
                report
            }
            Err(error) => {
                warn!(%error, "evidence audit degraded");
                AuditReport::default()
            }
        }
    }

    /// Runs the DOM rescue lane, absorbing tool faults into an empty report.
    async fn run_rescue(
        &self,
        record: &ProductRecord,
        fields: &[FieldKey],
        tracker: &mut SearchTracker,
    ) -> RescueReport {
        let result = with_timeout(
            "dom_rescuer",
            self.config.tool_timeout_ms,
            self.tools.rescuer.rescue(record, fields),
        )
        .await;
        match result {
            Ok(report) => {
                tracker.urls_visited += report.urls_visited;
                report
            }
            Err(error) => {
                warn!(%error, "dom rescue degraded");
                RescueReport::default()
            }
        }
    }

    /// Runs the reasoning resolver, absorbing tool faults into an empty report.
    async fn run_reasoning(
        &self,
        record: &ProductRecord,
        fields: &[FieldKey],
        tracker: &mut SearchTracker,
    ) -> ResolutionReport {
        let result = with_timeout(
            "reasoning_resolver",
            self.config.tool_timeout_ms,
            self.tools.resolver.resolve(record, fields),
        )
        .await;
        match result {
            Ok(report) => {
                tracker.queries_issued += report.queries_issued;
                report
            }
            Err(error) => {
                warn!(%error, "reasoning resolution degraded");
                ResolutionReport::default()
            }
        }
    }

    /// Plans and dispatches the bounded deep stage.
    async fn run_deep_stage(
        &self,
        record: &ProductRecord,
        _tracker: &mut SearchTracker,
    ) -> Result<EscalationReport, TraceError> {
        let cap = self.config.max_deep_fields_per_product;
        let tasks: Vec<DeepTask> = below_target_fields(record)
            .into_iter()
            .filter(|field_key| {
                record.fields.get(field_key).is_some_and(|field| field.critical)
            })
            .map(|field_key| {
                let deficit = record
                    .fields
                    .get(&field_key)
                    .map_or(0.0, |field| field.pass_target - field.confidence);
                DeepTask {
                    product_id: record.product_id.clone(),
                    field_key,
                    priority: deficit,
                    reason: "critical_below_target".to_string(),
                }
            })
            .collect();

        let plan = plan_routes(
            &tasks,
            &RouteContext {
                category: record.category.clone(),
                max_deep_fields_per_product: cap,
                local_only: false,
            },
        );
        let dispatchable: Vec<DeepTask> =
            plan.plans.iter().flat_map(|product| product.tasks.clone()).collect();
        self.trace_stage(&record.product_id, "deep", &plan)?;

        let mut dispatched = 0;
        if !dispatchable.is_empty() && cap > 0 {
            let result = with_timeout(
                "cortex_client",
                self.config.tool_timeout_ms,
                self.tools.cortex.dispatch_deep(&dispatchable),
            )
            .await;
            match result {
                Ok(report) => dispatched = report.dispatched,
                Err(error) => warn!(%error, "deep dispatch degraded"),
            }
        }

        Ok(EscalationReport {
            deep_triggered: dispatched > 0,
            deep_task_cap: cap,
            deep_task_count: dispatched,
        })
    }

    /// Serializes and persists one typed stage report into the trace ring.
    fn trace_stage<T: Serialize>(
        &self,
        product_id: &ProductId,
        section: &str,
        report: &T,
    ) -> Result<(), TraceError> {
        let payload = serde_json::to_value(report)
            .map_err(|err| TraceError::Serialization(err.to_string()))?;
        self.trace.write_section(product_id, section, STAGE_RING_SIZE, &payload)
    }
}

/// Returns the fields still below their pass target, in key order.
fn below_target_fields(record: &ProductRecord) -> Vec<FieldKey> {
    record
        .fields
        .iter()
        .filter(|(_, snapshot)| !snapshot.at_target())
        .map(|(field_key, _)| field_key.clone())
        .collect()
}
