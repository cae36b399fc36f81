// crates/spec-desk-cortex/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: Tests for the staged aggressive-mode escalation loop.
// Purpose: Pin the disabled short-circuit, rescue merging, traces, and caps.
// Dependencies: spec-desk-core, spec-desk-cortex, tokio
// ============================================================================
//! ## Overview
//! Drives the orchestrator with scripted tools: non-aggressive modes
//! short-circuit, accepted verdicts apply only below target, rescued
//! candidates reach the re-audit through the working record, applied changes
//! land on the JSONL field timeline, deep dispatch respects the per-product
//! cap, and tool faults degrade without aborting the round.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use spec_desk_core::ArtifactStore;
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::Evidence;
use spec_desk_core::FieldKey;
use spec_desk_core::InMemoryArtifactStore;
use spec_desk_core::ProductId;
use spec_desk_core::RunId;
use spec_desk_core::SourceRef;
use spec_desk_core::StorageKey;
use spec_desk_core::Timestamp;
use spec_desk_cortex::AuditReport;
use spec_desk_cortex::AuditVerdict;
use spec_desk_cortex::CortexClient;
use spec_desk_cortex::CortexConfig;
use spec_desk_cortex::CortexMode;
use spec_desk_cortex::DeepDispatchReport;
use spec_desk_cortex::DeepTask;
use spec_desk_cortex::DomRescuer;
use spec_desk_cortex::EvidenceAuditor;
use spec_desk_cortex::FieldSnapshot;
use spec_desk_cortex::Orchestrator;
use spec_desk_cortex::ProductRecord;
use spec_desk_cortex::ReasoningResolver;
use spec_desk_cortex::RescueReport;
use spec_desk_cortex::ResolutionReport;
use spec_desk_cortex::ToolError;
use spec_desk_cortex::ToolSet;
use spec_desk_cortex::TraceWriter;

/// Scripted tool implementations with call recording.
#[derive(Default)]
struct ScriptedTools {
    /// Audit reports returned in order; the last repeats.
    audits: Mutex<Vec<AuditReport>>,
    /// Total pending candidates visible to each audit call.
    audit_candidate_counts: Mutex<Vec<usize>>,
    /// Fields requested for rescue.
    rescued: Mutex<Vec<FieldKey>>,
    /// Deep tasks received by dispatch.
    dispatched: Mutex<Vec<DeepTask>>,
    /// Whether the auditor faults.
    audit_faults: bool,
}

#[async_trait]
impl EvidenceAuditor for ScriptedTools {
    async fn audit(&self, record: &ProductRecord) -> Result<AuditReport, ToolError> {
        self.audit_candidate_counts
            .lock()
            .expect("count lock")
            .push(record.fields.values().map(|field| field.candidates.len()).sum());
        if self.audit_faults {
            return Err(ToolError::Faulted {
                tool: "evidence_auditor",
                message: "scripted fault".to_string(),
            });
        }
        let mut audits = self.audits.lock().expect("audit lock");
        if audits.len() > 1 {
            Ok(audits.remove(0))
        } else {
            Ok(audits.first().cloned().unwrap_or_default())
        }
    }
}

#[async_trait]
impl DomRescuer for ScriptedTools {
    async fn rescue(
        &self,
        _record: &ProductRecord,
        fields: &[FieldKey],
    ) -> Result<RescueReport, ToolError> {
        self.rescued.lock().expect("rescue lock").extend_from_slice(fields);
        let candidates = fields
            .iter()
            .map(|field_key| (field_key.clone(), vec![rescued_candidate(field_key)]))
            .collect();
        Ok(RescueReport {
            candidates,
            urls_visited: 1,
        })
    }
}

#[async_trait]
impl ReasoningResolver for ScriptedTools {
    async fn resolve(
        &self,
        _record: &ProductRecord,
        _fields: &[FieldKey],
    ) -> Result<ResolutionReport, ToolError> {
        Ok(ResolutionReport::default())
    }
}

#[async_trait]
impl CortexClient for ScriptedTools {
    async fn dispatch_deep(&self, tasks: &[DeepTask]) -> Result<DeepDispatchReport, ToolError> {
        self.dispatched.lock().expect("dispatch lock").extend_from_slice(tasks);
        Ok(DeepDispatchReport {
            dispatched: u32::try_from(tasks.len()).expect("small task count"),
        })
    }
}

fn rescued_candidate(field_key: &FieldKey) -> Candidate {
    Candidate {
        candidate_id: CandidateId::new(format!("rescued_{field_key}")),
        value: "26000".to_string(),
        normalized_value: "26000".to_string(),
        score: 0.9,
        rank: 1,
        source: SourceRef {
            host: "vendor.example.com".to_string(),
            root_domain: "example.com".to_string(),
            method: "dom".to_string(),
            tier: 1,
        },
        evidence: Evidence {
            snippet_id: format!("snip-{field_key}"),
            quote: "up to 26000 dpi".to_string(),
            url: "https://vendor.example.com/specs".to_string(),
            retrieved_at: Timestamp::from_unix_millis(1_700_000_000_000),
        },
        is_component_field: false,
        is_list_field: false,
        component_type: None,
    }
}

fn record_with(fields: &[(&str, Option<&str>, f64, bool)]) -> ProductRecord {
    let mut map = BTreeMap::new();
    for (key, value, confidence, critical) in fields {
        map.insert(
            FieldKey::new(*key),
            FieldSnapshot {
                value: value.map(str::to_string),
                confidence: *confidence,
                pass_target: 0.8,
                critical: *critical,
                candidates: Vec::new(),
            },
        );
    }
    ProductRecord {
        category: Category::new("mice"),
        product_id: ProductId::new("gx-light"),
        fields: map,
    }
}

fn config(mode: CortexMode, cap: u32) -> CortexConfig {
    CortexConfig {
        mode,
        max_deep_fields_per_product: cap,
        tool_timeout_ms: 1_000,
    }
}

fn trace_writer() -> (TraceWriter<InMemoryArtifactStore>, InMemoryArtifactStore) {
    let store = InMemoryArtifactStore::new();
    (TraceWriter::new(store.clone(), RunId::new("run-1")), store)
}

fn timeline_text(store: &InMemoryArtifactStore) -> Option<String> {
    store
        .read_text_or_null(&StorageKey::new(
            "_runtime/traces/runs/run-1/gx-light/field_timeline.jsonl",
        ))
        .expect("timeline read")
}

/// Verifies non-aggressive modes short-circuit.
#[tokio::test]
async fn non_aggressive_modes_short_circuit() {
    let tools = ScriptedTools::default();
    let (trace, _store) = trace_writer();
    let orchestrator = Orchestrator::new(
        ToolSet {
            auditor: &tools,
            rescuer: &tools,
            resolver: &tools,
            cortex: &tools,
        },
        &trace,
        config(CortexMode::Standard, 4),
    );
    let mut record = record_with(&[("weight", Some("59"), 0.9, false)]);
    let report = orchestrator.run_pass(&mut record).await.expect("pass runs");
    assert!(!report.enabled);
    assert_eq!(report.stage, "disabled");
    assert_eq!(report.escalation.deep_task_cap, 4);
}

/// Verifies accepted verdicts apply only to fields below target and that
/// every applied change lands on the field timeline.
#[tokio::test]
async fn accepted_verdicts_apply_below_target_only() {
    let tools = ScriptedTools {
        audits: Mutex::new(vec![AuditReport {
            verdicts: vec![
                AuditVerdict {
                    field_key: FieldKey::new("weight"),
                    accepted: true,
                    value: Some("58".to_string()),
                    confidence: 0.95,
                },
                AuditVerdict {
                    field_key: FieldKey::new("dpi_max"),
                    accepted: true,
                    value: Some("26000".to_string()),
                    confidence: 0.9,
                },
            ],
            queries_issued: 2,
            urls_visited: 3,
        }]),
        ..ScriptedTools::default()
    };
    let (trace, store) = trace_writer();
    let orchestrator = Orchestrator::new(
        ToolSet {
            auditor: &tools,
            rescuer: &tools,
            resolver: &tools,
            cortex: &tools,
        },
        &trace,
        config(CortexMode::Aggressive, 4),
    );
    let mut record = record_with(&[
        ("weight", Some("59"), 0.9, false),
        ("dpi_max", None, 0.2, false),
    ]);
    let report = orchestrator.run_pass(&mut record).await.expect("pass runs");

    assert!(report.enabled);
    assert_eq!(report.stage, "complete");
    // Already at target: untouched. Below target: applied.
    assert_eq!(record.fields[&FieldKey::new("weight")].value.as_deref(), Some("59"));
    assert_eq!(record.fields[&FieldKey::new("dpi_max")].value.as_deref(), Some("26000"));
    assert_eq!(report.search_tracker.queries_issued, 2);
    assert_eq!(report.search_tracker.urls_visited, 3);

    let timeline = timeline_text(&store).expect("timeline present");
    let lines: Vec<&str> = timeline.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"dpi_max\""));
    assert!(lines[0].contains("\"apply\""));
}

/// Verifies rescued candidates merge into the record before the re-audit.
#[tokio::test]
async fn rescued_candidates_reach_the_re_audit() {
    let rejected = AuditReport {
        verdicts: vec![AuditVerdict {
            field_key: FieldKey::new("dpi_max"),
            accepted: false,
            value: None,
            confidence: 0.1,
        }],
        queries_issued: 1,
        urls_visited: 1,
    };
    let recovered = AuditReport {
        verdicts: vec![AuditVerdict {
            field_key: FieldKey::new("dpi_max"),
            accepted: true,
            value: Some("26000".to_string()),
            confidence: 0.9,
        }],
        queries_issued: 1,
        urls_visited: 1,
    };
    let tools = ScriptedTools {
        audits: Mutex::new(vec![rejected, recovered]),
        ..ScriptedTools::default()
    };
    let (trace, _store) = trace_writer();
    let orchestrator = Orchestrator::new(
        ToolSet {
            auditor: &tools,
            rescuer: &tools,
            resolver: &tools,
            cortex: &tools,
        },
        &trace,
        config(CortexMode::Aggressive, 4),
    );
    let mut record = record_with(&[("dpi_max", None, 0.1, true)]);
    orchestrator.run_pass(&mut record).await.expect("pass runs");

    let rescued = tools.rescued.lock().expect("rescue lock");
    assert_eq!(rescued.as_slice(), &[FieldKey::new("dpi_max")]);
    // The first audit ran on a bare record; the re-audit saw the rescued
    // candidate through the working record.
    let counts = tools.audit_candidate_counts.lock().expect("count lock");
    assert_eq!(counts.as_slice(), &[0, 1]);
    let snapshot = &record.fields[&FieldKey::new("dpi_max")];
    assert_eq!(snapshot.candidates.len(), 1);
    assert_eq!(snapshot.candidates[0].candidate_id, CandidateId::new("rescued_dpi_max"));
    assert_eq!(snapshot.value.as_deref(), Some("26000"));
}

/// Verifies the deep stage caps tasks per product.
#[tokio::test]
async fn deep_dispatch_respects_cap() {
    let tools = ScriptedTools::default();
    let (trace, _store) = trace_writer();
    let orchestrator = Orchestrator::new(
        ToolSet {
            auditor: &tools,
            rescuer: &tools,
            resolver: &tools,
            cortex: &tools,
        },
        &trace,
        config(CortexMode::Aggressive, 2),
    );
    let mut record = record_with(&[
        ("a", None, 0.1, true),
        ("b", None, 0.2, true),
        ("c", None, 0.3, true),
    ]);
    let report = orchestrator.run_pass(&mut record).await.expect("pass runs");

    assert!(report.escalation.deep_triggered);
    assert_eq!(report.escalation.deep_task_cap, 2);
    assert_eq!(report.escalation.deep_task_count, 2);
    let dispatched = tools.dispatched.lock().expect("dispatch lock");
    assert_eq!(dispatched.len(), 2);
    // Highest deficit first: a (0.7), then b (0.6).
    assert_eq!(dispatched[0].field_key, FieldKey::new("a"));
    assert_eq!(dispatched[1].field_key, FieldKey::new("b"));
}

/// Verifies an auditor fault degrades without aborting the round.
#[tokio::test]
async fn tool_fault_degrades_gracefully() {
    let tools = ScriptedTools {
        audit_faults: true,
        ..ScriptedTools::default()
    };
    let (trace, store) = trace_writer();
    let orchestrator = Orchestrator::new(
        ToolSet {
            auditor: &tools,
            rescuer: &tools,
            resolver: &tools,
            cortex: &tools,
        },
        &trace,
        config(CortexMode::Aggressive, 4),
    );
    let mut record = record_with(&[("weight", Some("59"), 0.9, false)]);
    let report = orchestrator.run_pass(&mut record).await.expect("pass runs");
    assert!(report.enabled);
    assert_eq!(report.stage, "complete");
    assert_eq!(report.search_tracker.queries_issued, 0);
    // Nothing applied, nothing on the timeline.
    assert!(timeline_text(&store).is_none());
}
