// crates/spec-desk-core/src/needset.rs
// ============================================================================
// Module: Spec Desk NeedSet Engine
// Description: Scores which fields of an item still require extraction work.
// Purpose: Rank open work deterministically from rules, provenance, and decay.
// Dependencies: crate::core::{identifiers, rules, time}, serde
// ============================================================================

//! ## Overview
//! The NeedSet engine is a pure function over one item's provenance and the
//! category rules. It attaches reason codes, applies freshness decay and
//! identity gating, and returns a deterministically sorted ranking. The
//! scoring formula is fixed; this is not a learned ranker. When no decay
//! configuration is supplied the engine degrades gracefully to raw
//! confidences.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::FieldKey;
use crate::core::rules::FieldRule;
use crate::core::rules::FieldRules;
use crate::core::rules::RequiredLevel;
use crate::core::rules::is_unknown_value;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Confidence cap applied below the pass target while identity is unlocked.
const IDENTITY_GATE_MARGIN: f64 = 0.05;

/// Score multiplier for a missing or unknown value.
const MISSING_MULTIPLIER: f64 = 2.0;

/// Score multiplier for a field carrying a constraint conflict.
const CONFLICT_MULTIPLIER: f64 = 2.0;

/// Score multiplier when the best evidence tier misses the preference.
const TIER_DEFICIT_MULTIPLIER: f64 = 2.0;

/// Per-missing-reference increment for the minimum-references deficit.
const MIN_REFS_STEP: f64 = 0.5;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Freshness decay configuration.
///
/// # Invariants
/// - `decay_days` is strictly positive.
/// - `floor` is within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Exponential decay time constant in days.
    pub decay_days: f64,
    /// Lower bound for the decay factor.
    pub floor: f64,
}

/// Identity lock state for the item under evaluation.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityLockState {
    /// Identity fields are resolved and trusted.
    Locked,
    /// Identity is unresolved; non-identity confidence is capped.
    #[default]
    Unlocked,
}

impl IdentityLockState {
    /// Returns a stable label for the lock state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

/// Identity context supplied by the caller.
///
/// # Invariants
/// - Non-identity fields gate on `status` being unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IdentityContext {
    /// Current identity lock state.
    pub status: IdentityLockState,
}

/// Per-field provenance summary consumed by the engine.
///
/// # Invariants
/// - `confidence` is within `[0, 1]`.
/// - `observed_at` is the freshest evidence timestamp, when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldProvenance {
    /// Resolved value, when any.
    pub value: Option<String>,
    /// Resolution confidence in `[0, 1]`.
    pub confidence: f64,
    /// Number of independent evidence references.
    pub evidence_count: u32,
    /// Best (lowest) evidence tier observed, when any.
    pub best_tier: Option<u8>,
    /// Freshest evidence timestamp, when known.
    pub observed_at: Option<Timestamp>,
    /// Whether a cross-validation constraint currently conflicts.
    pub constraint_conflict: bool,
}

/// Inputs to one NeedSet computation.
///
/// # Invariants
/// - `field_order` lists every field under consideration; fields absent from
///   `provenance` are treated as missing with zero confidence.
#[derive(Debug, Clone)]
pub struct NeedSetInputs<'a> {
    /// Field evaluation order.
    pub field_order: &'a [FieldKey],
    /// Per-field provenance summaries.
    pub provenance: &'a BTreeMap<FieldKey, FieldProvenance>,
    /// Category field rules.
    pub field_rules: &'a FieldRules,
    /// Identity context for gating.
    pub identity: IdentityContext,
    /// Evaluation timestamp.
    pub now: Timestamp,
    /// Optional freshness decay configuration.
    pub decay: Option<DecayConfig>,
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// Reason code attached to a need entry.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedReason {
    /// Value is null or unknown.
    Missing,
    /// Effective confidence is below the pass target.
    LowConf,
    /// Best evidence tier misses the field's tier preference.
    TierPrefUnmet,
    /// Evidence references are below the field minimum.
    MinRefsFail,
    /// A cross-validation constraint conflicts.
    Conflict,
    /// Identity is unlocked and the field is identity-gated.
    BlockedByIdentity,
}

impl NeedReason {
    /// Returns a stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::LowConf => "low_conf",
            Self::TierPrefUnmet => "tier_pref_unmet",
            Self::MinRefsFail => "min_refs_fail",
            Self::Conflict => "conflict",
            Self::BlockedByIdentity => "blocked_by_identity",
        }
    }
}

/// One ranked need entry.
///
/// # Invariants
/// - `need_score` is non-negative.
/// - `reasons` is non-empty for every emitted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedEntry {
    /// Field key.
    pub field_key: FieldKey,
    /// Need score from the fixed formula.
    pub need_score: f64,
    /// Required level of the field.
    pub required_level: RequiredLevel,
    /// Effective confidence after decay and gating.
    pub effective_confidence: f64,
    /// Reason codes in stable order.
    pub reasons: Vec<NeedReason>,
}

/// Counts of reason codes across the NeedSet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCounts {
    /// Count of `missing` reasons.
    pub missing: u32,
    /// Count of `low_conf` reasons.
    pub low_conf: u32,
    /// Count of `tier_pref_unmet` reasons.
    pub tier_pref_unmet: u32,
    /// Count of `min_refs_fail` reasons.
    pub min_refs_fail: u32,
    /// Count of `conflict` reasons.
    pub conflict: u32,
    /// Count of `blocked_by_identity` reasons.
    pub blocked_by_identity: u32,
}

impl ReasonCounts {
    /// Increments the counter for one reason.
    const fn record(&mut self, reason: NeedReason) {
        match reason {
            NeedReason::Missing => self.missing += 1,
            NeedReason::LowConf => self.low_conf += 1,
            NeedReason::TierPrefUnmet => self.tier_pref_unmet += 1,
            NeedReason::MinRefsFail => self.min_refs_fail += 1,
            NeedReason::Conflict => self.conflict += 1,
            NeedReason::BlockedByIdentity => self.blocked_by_identity += 1,
        }
    }
}

/// Counts of required levels across the NeedSet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredLevelCounts {
    /// Count of identity-level fields.
    pub identity: u32,
    /// Count of critical-level fields.
    pub critical: u32,
    /// Count of required-level fields.
    pub required: u32,
    /// Count of expected-level fields.
    pub expected: u32,
    /// Count of optional-level fields.
    pub optional: u32,
}

impl RequiredLevelCounts {
    /// Increments the counter for one required level.
    const fn record(&mut self, level: RequiredLevel) {
        match level {
            RequiredLevel::Identity => self.identity += 1,
            RequiredLevel::Critical => self.critical += 1,
            RequiredLevel::Required => self.required += 1,
            RequiredLevel::Expected => self.expected += 1,
            RequiredLevel::Optional => self.optional += 1,
        }
    }
}

/// Identity audit row emitted for each identity-level field.
///
/// # Invariants
/// - One row per identity-level field in `field_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityAuditRow {
    /// Identity field key.
    pub field_key: FieldKey,
    /// Resolved value, when any.
    pub value: Option<String>,
    /// Raw confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the field meets its pass target.
    pub meets_target: bool,
}

/// NeedSet computation report.
///
/// # Invariants
/// - `needs` is sorted by `need_score` descending with a deterministic
///   tie-break on `field_key` ascending.
/// - `needset_size == needs.len()` and `total_fields` counts `field_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedSetReport {
    /// Ranked need entries.
    pub needs: Vec<NeedEntry>,
    /// Reason counts across the NeedSet.
    pub reason_counts: ReasonCounts,
    /// Required-level counts across the NeedSet.
    pub required_level_counts: RequiredLevelCounts,
    /// Number of need entries.
    pub needset_size: usize,
    /// Number of fields considered.
    pub total_fields: usize,
    /// Identity lock state the computation ran under.
    pub identity_lock_state: IdentityLockState,
    /// Identity audit rows for identity-level fields.
    pub identity_audit_rows: Vec<IdentityAuditRow>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Computes the NeedSet for one item.
#[must_use]
pub fn compute_need_set(inputs: &NeedSetInputs<'_>) -> NeedSetReport {
    let default_provenance = FieldProvenance::default();
    let default_rule = default_field_rule();

    let mut needs = Vec::new();
    let mut reason_counts = ReasonCounts::default();
    let mut required_level_counts = RequiredLevelCounts::default();
    let mut identity_audit_rows = Vec::new();

    for field_key in inputs.field_order {
        let provenance = inputs.provenance.get(field_key).unwrap_or(&default_provenance);
        let rule = inputs.field_rules.get(field_key).unwrap_or(&default_rule);
        let pass_target = rule.effective_pass_target();

        if rule.required_level == RequiredLevel::Identity {
            identity_audit_rows.push(IdentityAuditRow {
                field_key: field_key.clone(),
                value: provenance.value.clone(),
                confidence: provenance.confidence,
                meets_target: provenance.confidence >= pass_target,
            });
        }

        let missing = provenance.value.as_deref().is_none_or(is_unknown_value);
        let mut effective_confidence = decayed_confidence(provenance, inputs.decay, inputs.now);
        let mut reasons = Vec::new();

        let identity_gated = inputs.identity.status == IdentityLockState::Unlocked
            && rule.required_level != RequiredLevel::Identity;
        if identity_gated {
            effective_confidence =
                effective_confidence.min(pass_target - IDENTITY_GATE_MARGIN).max(0.0);
            reasons.push(NeedReason::BlockedByIdentity);
        }

        let tier_ok = provenance.best_tier.is_some_and(|tier| rule.tier_satisfies(tier))
            || (provenance.best_tier.is_none() && rule.tier_preference.is_empty());
        let min_refs = rule.min_evidence_refs.unwrap_or(0);
        let refs_ok = provenance.evidence_count >= min_refs;

        if missing {
            reasons.push(NeedReason::Missing);
        } else if effective_confidence < pass_target {
            reasons.push(NeedReason::LowConf);
        }
        if !tier_ok {
            reasons.push(NeedReason::TierPrefUnmet);
        }
        if !refs_ok {
            reasons.push(NeedReason::MinRefsFail);
        }
        if provenance.constraint_conflict {
            reasons.push(NeedReason::Conflict);
        }

        let excluded = !missing && effective_confidence >= pass_target && tier_ok && refs_ok;
        if excluded {
            continue;
        }

        let missing_mult = if missing { MISSING_MULTIPLIER } else { 1.0 };
        let conf_term = (1.0 - effective_confidence).max(0.0);
        let tier_deficit = if tier_ok { 1.0 } else { TIER_DEFICIT_MULTIPLIER };
        let refs_short = f64::from(min_refs.saturating_sub(provenance.evidence_count));
        let min_refs_deficit = MIN_REFS_STEP.mul_add(refs_short, 1.0);
        let conflict_mult =
            if provenance.constraint_conflict { CONFLICT_MULTIPLIER } else { 1.0 };
        let need_score = missing_mult
            * conf_term
            * rule.required_level.weight()
            * tier_deficit
            * min_refs_deficit
            * conflict_mult;

        for reason in &reasons {
            reason_counts.record(*reason);
        }
        required_level_counts.record(rule.required_level);
        needs.push(NeedEntry {
            field_key: field_key.clone(),
            need_score,
            required_level: rule.required_level,
            effective_confidence,
            reasons,
        });
    }

    needs.sort_by(|a, b| {
        b.need_score.total_cmp(&a.need_score).then_with(|| a.field_key.cmp(&b.field_key))
    });

    NeedSetReport {
        needset_size: needs.len(),
        total_fields: inputs.field_order.len(),
        identity_lock_state: inputs.identity.status,
        identity_audit_rows,
        reason_counts,
        required_level_counts,
        needs,
    }
}

/// Returns the raw confidence discounted by freshness decay.
fn decayed_confidence(
    provenance: &FieldProvenance,
    decay: Option<DecayConfig>,
    now: Timestamp,
) -> f64 {
    match (decay, provenance.observed_at) {
        (Some(config), Some(observed_at)) if config.decay_days > 0.0 => {
            let age_days = observed_at.age_days(now);
            let factor = (-age_days / config.decay_days).exp().max(config.floor);
            provenance.confidence * factor
        }
        _ => provenance.confidence,
    }
}

/// Returns the default rule applied to fields with no configured rule.
fn default_field_rule() -> FieldRule {
    FieldRule {
        required_level: RequiredLevel::Optional,
        contract: crate::core::rules::FieldContract {
            value_type: "string".to_string(),
            unit: None,
            shape: crate::core::rules::ValueShape::Scalar,
        },
        component: None,
        enum_binding: None,
        variance_policy: None,
        constraints: Vec::new(),
        pass_target: None,
        min_evidence_refs: None,
        tier_preference: Vec::new(),
    }
}
