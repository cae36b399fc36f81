// crates/spec-desk-core/src/core/rules.rs
// ============================================================================
// Module: Spec Desk Field Rules
// Description: Field rule contracts, variance policies, and enum policies.
// Purpose: Govern how fields are typed, required, constrained, and reviewed.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Field rules form the contract between extraction, curation, and review.
//! Each field carries a required level, a value contract, optional component
//! and enum bindings, a variance policy, and value constraints. Rules are
//! loaded once per category and treated as an immutable snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ComponentType;
use crate::core::identifiers::FieldKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default pass target applied when a field rule does not set one.
pub const DEFAULT_PASS_TARGET: f64 = 0.8;

/// Sentinel normalized form for an unknown value.
pub const UNKNOWN_VALUE: &str = "unk";

// ============================================================================
// SECTION: Required Level
// ============================================================================

/// Required level of a field, from identity-defining to optional.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    /// Field participates in item identity resolution.
    Identity,
    /// Field is critical to a usable record.
    Critical,
    /// Field is required for completeness.
    Required,
    /// Field is expected but tolerable to miss.
    Expected,
    /// Field is optional.
    Optional,
}

impl RequiredLevel {
    /// Returns the NeedSet weight for this level.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Identity => 5.0,
            Self::Critical => 4.0,
            Self::Required => 2.0,
            Self::Expected => 1.5,
            Self::Optional => 1.0,
        }
    }

    /// Returns a stable label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Critical => "critical",
            Self::Required => "required",
            Self::Expected => "expected",
            Self::Optional => "optional",
        }
    }
}

// ============================================================================
// SECTION: Value Contract
// ============================================================================

/// Shape of a field value.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueShape {
    /// Single scalar value.
    #[default]
    Scalar,
    /// Ordered list of values.
    List,
}

/// Value contract for a field: type, unit, and shape.
///
/// # Invariants
/// - `value_type` is an opaque contract label (e.g. `number`, `string`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldContract {
    /// Contract type label.
    pub value_type: String,
    /// Optional unit label for numeric fields.
    #[serde(default)]
    pub unit: Option<String>,
    /// Value shape.
    #[serde(default)]
    pub shape: ValueShape,
}

// ============================================================================
// SECTION: Variance and Enum Policies
// ============================================================================

/// Per-property rule governing divergence between item values and a shared
/// component property.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Absence of a policy (`None` at the use site) means no variance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariancePolicy {
    /// Item values may not exceed the shared property value.
    UpperBound,
    /// The shared property value overwrites linked item values.
    Authoritative,
    /// Item values may diverge freely; no violations are computed.
    OverrideAllowed,
}

impl VariancePolicy {
    /// Returns a stable label for the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpperBound => "upper_bound",
            Self::Authoritative => "authoritative",
            Self::OverrideAllowed => "override_allowed",
        }
    }
}

/// Enum membership policy for a list-valued field.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnumPolicy {
    /// Only known values are admissible.
    Closed,
    /// Any value is admissible.
    #[default]
    Open,
    /// Any value is admissible; known values are preferred at match time.
    OpenPreferKnown,
}

impl EnumPolicy {
    /// Returns a stable label for the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::OpenPreferKnown => "open_prefer_known",
        }
    }
}

// ============================================================================
// SECTION: Constraints
// ============================================================================

/// Value constraint attached to a field rule.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Numeric lower bound (inclusive).
    Min {
        /// Inclusive minimum value.
        value: f64,
    },
    /// Numeric upper bound (inclusive).
    Max {
        /// Inclusive maximum value.
        value: f64,
    },
    /// Closed set of admissible raw values.
    OneOf {
        /// Admissible values.
        values: Vec<String>,
    },
}

/// Numeric relation between two fields of the same item.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossRelation {
    /// Left field must be less than or equal to the right field.
    LessOrEqual,
    /// Left field must be greater than or equal to the right field.
    GreaterOrEqual,
    /// Left field must equal the right field.
    Equal,
}

/// Cross-validation rule relating two fields of one item.
///
/// # Invariants
/// - Both fields are interpreted numerically; non-numeric values skip the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidationRule {
    /// Left-hand field key.
    pub left: FieldKey,
    /// Relation between the two fields.
    pub relation: CrossRelation,
    /// Right-hand field key.
    pub right: FieldKey,
}

impl CrossValidationRule {
    /// Evaluates the rule over two raw values; returns `None` when either
    /// side is missing or non-numeric, `Some(holds)` otherwise.
    #[must_use]
    pub fn evaluate(&self, left: Option<&str>, right: Option<&str>) -> Option<bool> {
        let lhs: f64 = left?.trim().parse().ok()?;
        let rhs: f64 = right?.trim().parse().ok()?;
        let holds = match self.relation {
            CrossRelation::LessOrEqual => lhs <= rhs,
            CrossRelation::GreaterOrEqual => lhs >= rhs,
            CrossRelation::Equal => (lhs - rhs).abs() < f64::EPSILON,
        };
        Some(holds)
    }
}

// ============================================================================
// SECTION: Field Rule
// ============================================================================

/// Rule record governing one field.
///
/// # Invariants
/// - `component` and `enum_binding` are mutually independent; a field may
///   carry either, both, or neither.
/// - `tier_preference` lists admissible source tiers; empty means any tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Required level of the field.
    pub required_level: RequiredLevel,
    /// Value contract.
    pub contract: FieldContract,
    /// Component type bound to this field, when the field is component-backed.
    #[serde(default)]
    pub component: Option<ComponentType>,
    /// Enum policy bound to this field, when the field is enum-backed.
    #[serde(default, rename = "enum")]
    pub enum_binding: Option<EnumPolicy>,
    /// Variance policy for component-backed fields.
    #[serde(default)]
    pub variance_policy: Option<VariancePolicy>,
    /// Value constraints.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Confidence pass target; defaults to [`DEFAULT_PASS_TARGET`].
    #[serde(default)]
    pub pass_target: Option<f64>,
    /// Minimum evidence references required for the field to pass.
    #[serde(default)]
    pub min_evidence_refs: Option<u32>,
    /// Admissible source tiers in preference order; empty admits every tier.
    #[serde(default)]
    pub tier_preference: Vec<u8>,
}

impl FieldRule {
    /// Returns the effective pass target for the field.
    #[must_use]
    pub fn effective_pass_target(&self) -> f64 {
        self.pass_target.unwrap_or(DEFAULT_PASS_TARGET)
    }

    /// Returns whether `tier` satisfies the field's tier preference.
    #[must_use]
    pub fn tier_satisfies(&self, tier: u8) -> bool {
        self.tier_preference.is_empty() || self.tier_preference.contains(&tier)
    }
}

/// Known enum values for one field, loaded from helper files.
///
/// # Invariants
/// - `values` keeps the source ordering from the helper file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownValues {
    /// Enum membership policy.
    pub policy: EnumPolicy,
    /// Known values in source order.
    pub values: Vec<String>,
}

/// Field rules for one category, keyed by field.
///
/// # Invariants
/// - Keys are the canonical field keys used by candidates and item state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldRules {
    /// Rules keyed by field.
    pub fields: BTreeMap<FieldKey, FieldRule>,
}

impl FieldRules {
    /// Returns the rule for a field, if present.
    #[must_use]
    pub fn get(&self, field_key: &FieldKey) -> Option<&FieldRule> {
        self.fields.get(field_key)
    }
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Returns the canonical normalized form of a raw value: lowercased with all
/// whitespace stripped.
#[must_use]
pub fn normalize_value(raw: &str) -> String {
    raw.chars().filter(|ch| !ch.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// Returns whether the normalized form of `raw` is the unknown sentinel.
#[must_use]
pub fn is_unknown_value(raw: &str) -> bool {
    normalize_value(raw) == UNKNOWN_VALUE
}
