// crates/spec-desk-cortex/src/lib.rs
// ============================================================================
// Module: Spec Desk Cortex Library
// Description: Public API surface for aggressive-mode orchestration.
// Purpose: Expose the orchestrator, tool seams, route planner, and traces.
// Dependencies: crate::{orchestrator, route, tools, trace}
// ============================================================================

//! ## Overview
//! Cortex drives bounded extraction escalation: audit the evidence, rescue
//! rejected criticals from the DOM, reason over what remains, then dispatch a
//! capped set of deep tasks. Every stage emits a typed report into a ring-
//! buffered trace before the next stage starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod orchestrator;
pub mod route;
pub mod tools;
pub mod trace;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use orchestrator::AggressiveReport;
pub use orchestrator::CortexConfig;
pub use orchestrator::CortexMode;
pub use orchestrator::DEFAULT_MAX_DEEP_FIELDS;
pub use orchestrator::DEFAULT_TOOL_TIMEOUT_MS;
pub use orchestrator::ENV_CORTEX_ENABLED;
pub use orchestrator::ENV_CORTEX_MAX_DEEP_FIELDS;
pub use orchestrator::EscalationReport;
pub use orchestrator::Orchestrator;
pub use orchestrator::SearchTracker;
pub use route::ProductRoutePlan;
pub use route::RouteContext;
pub use route::RoutePlan;
pub use route::plan_routes;
pub use tools::AuditReport;
pub use tools::AuditVerdict;
pub use tools::CortexClient;
pub use tools::DeepDispatchReport;
pub use tools::DeepTask;
pub use tools::DomRescuer;
pub use tools::EvidenceAuditor;
pub use tools::FieldSnapshot;
pub use tools::ProductRecord;
pub use tools::ReasoningResolver;
pub use tools::RescueReport;
pub use tools::Resolution;
pub use tools::ResolutionReport;
pub use tools::ToolError;
pub use tools::ToolSet;
pub use tools::with_timeout;
pub use trace::FIELD_TIMELINE_FILE;
pub use trace::TRACE_RUNS_DIR;
pub use trace::TraceError;
pub use trace::TraceWriter;
