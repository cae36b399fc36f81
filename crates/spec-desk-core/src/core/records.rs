// crates/spec-desk-core/src/core/records.rs
// ============================================================================
// Module: Spec Desk Relational Records
// Description: Typed rows for items, field state, components, and enum values.
// Purpose: Mirror the relational schema with owned, serializable record types.
// Dependencies: crate::core::{identifiers, rules, time}, serde
// ============================================================================

//! ## Overview
//! Record types mirror the relational tables one-to-one. The store constructs
//! them from rows and accepts them for writes; no raw row construction leaks
//! outside the store module. Records returned from a write equal the
//! persisted row field-for-field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::Category;
use crate::core::identifiers::ComponentIdentityId;
use crate::core::identifiers::ComponentType;
use crate::core::identifiers::ComponentValueId;
use crate::core::identifiers::EnumListId;
use crate::core::identifiers::FieldKey;
use crate::core::identifiers::ItemFieldStateId;
use crate::core::identifiers::ListValueId;
use crate::core::identifiers::ProductId;
use crate::core::identifiers::PropertyKey;
use crate::core::rules::Constraint;
use crate::core::rules::EnumPolicy;
use crate::core::rules::VariancePolicy;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Items
// ============================================================================

/// Item lifecycle state.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemLifecycle {
    /// Item is active and curated.
    #[default]
    Active,
    /// Item is a draft pending identity resolution.
    Draft,
    /// Item is retired and excluded from curation.
    Retired,
}

impl ItemLifecycle {
    /// Returns a stable label for the lifecycle state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Retired => "retired",
        }
    }
}

/// Item identity record.
///
/// # Invariants
/// - `brand` and `model` are required for identity-locked items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIdentity {
    /// Brand name.
    pub brand: String,
    /// Model name.
    pub model: String,
    /// Optional variant discriminator.
    pub variant: Option<String>,
}

/// Item row: one product within a category.
///
/// # Invariants
/// - `(category, product_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Category identifier.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Identity record.
    pub identity: ItemIdentity,
    /// Lifecycle state.
    pub lifecycle: ItemLifecycle,
}

// ============================================================================
// SECTION: Value Source
// ============================================================================

/// Origin of a resolved value.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Extracted by the pipeline.
    Pipeline,
    /// Entered or accepted by a reviewer.
    User,
    /// Cascaded from a component database property.
    ComponentDb,
    /// Imported from a curation workbook.
    Workbook,
    /// Imported from an upstream spec database.
    Specdb,
    /// Entered manually outside the review flow.
    Manual,
    /// Origin unknown.
    #[default]
    Unknown,
}

impl ValueSource {
    /// Returns a stable label for the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::User => "user",
            Self::ComponentDb => "component_db",
            Self::Workbook => "workbook",
            Self::Specdb => "specdb",
            Self::Manual => "manual",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// SECTION: Item Field State
// ============================================================================

/// Resolved value state for one `(item, field)` slot.
///
/// # Invariants
/// - `(category, product_id, field_key)` is unique.
/// - `confidence` is within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFieldStateRow {
    /// Row identifier.
    pub id: ItemFieldStateId,
    /// Category identifier.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Field key.
    pub field_key: FieldKey,
    /// Resolved value, when any.
    pub value: Option<String>,
    /// Resolution confidence in `[0, 1]`.
    pub confidence: f64,
    /// Origin of the resolved value.
    pub source: ValueSource,
    /// Whether a reviewer overrode the pipeline value.
    pub overridden: bool,
    /// Whether the slot still needs AI review.
    pub needs_ai_review: bool,
    /// Whether AI review completed for the slot.
    pub ai_review_complete: bool,
    /// Candidate accepted for this slot, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Whether a cross-validation constraint currently conflicts.
    pub constraint_conflict: bool,
}

// ============================================================================
// SECTION: Components
// ============================================================================

/// Component catalog identity row.
///
/// # Invariants
/// - `(category, component_type, canonical_name, maker)` is unique.
/// - Two components sharing a name but differing in maker are distinct rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentityRow {
    /// Row identifier.
    pub id: ComponentIdentityId,
    /// Category identifier.
    pub category: Category,
    /// Component type.
    pub component_type: ComponentType,
    /// Canonical component name.
    pub canonical_name: String,
    /// Component maker.
    pub maker: String,
    /// Known aliases.
    pub aliases: Vec<String>,
    /// External links.
    pub links: Vec<String>,
    /// Provenance of the identity row.
    pub source: ValueSource,
}

/// Shared component property value row.
///
/// # Invariants
/// - `(component_identity_id, property_key)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValueRow {
    /// Row identifier.
    pub id: ComponentValueId,
    /// Owning component identity row.
    pub component_identity_id: ComponentIdentityId,
    /// Property key.
    pub property_key: PropertyKey,
    /// Property value.
    pub value: Option<String>,
    /// Property confidence in `[0, 1]`.
    pub confidence: f64,
    /// Variance policy override at the component level.
    pub variance_policy: Option<VariancePolicy>,
    /// Property constraints stored on the row.
    pub constraints: Vec<Constraint>,
    /// Candidate accepted for this property, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Whether the property still needs review.
    pub needs_review: bool,
    /// Whether a reviewer overrode the property value.
    pub overridden: bool,
}

// ============================================================================
// SECTION: Enum Lists
// ============================================================================

/// Per-field enum list row.
///
/// # Invariants
/// - `(category, field_key)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumListRow {
    /// Row identifier.
    pub id: EnumListId,
    /// Category identifier.
    pub category: Category,
    /// Field key the list belongs to.
    pub field_key: FieldKey,
}

/// Enum member row.
///
/// # Invariants
/// - `(enum_list_id, normalized_value)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListValueRow {
    /// Row identifier.
    pub id: ListValueId,
    /// Owning enum list.
    pub enum_list_id: EnumListId,
    /// Raw member value.
    pub value: String,
    /// Canonical normalized form of `value`.
    pub normalized_value: String,
    /// Origin of the member.
    pub source: ValueSource,
    /// Enum membership policy recorded on the row.
    pub enum_policy: EnumPolicy,
    /// Candidate accepted for this member, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Whether the member still needs review.
    pub needs_review: bool,
    /// Whether a reviewer overrode the member.
    pub overridden: bool,
    /// Source timestamp, when known.
    pub source_timestamp: Option<Timestamp>,
}

// ============================================================================
// SECTION: Links
// ============================================================================

/// How an item was matched to a component or enum value.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Exact canonical-name match.
    #[default]
    Exact,
    /// Matched through a known alias.
    Alias,
    /// Fuzzy normalized match.
    Fuzzy,
    /// Linked manually by a reviewer.
    Manual,
}

impl MatchType {
    /// Returns a stable label for the match type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::Fuzzy => "fuzzy",
            Self::Manual => "manual",
        }
    }
}

/// Join row linking an item field to the component it resolved to.
///
/// # Invariants
/// - `(category, product_id, field_key)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemComponentLinkRow {
    /// Category identifier.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Component-backed field key.
    pub field_key: FieldKey,
    /// Resolved component identity row.
    pub component_identity_id: ComponentIdentityId,
    /// Match type.
    pub match_type: MatchType,
    /// Match score in `[0, 1]`.
    pub score: f64,
}

/// Join row linking an item field to an enum member.
///
/// # Invariants
/// - `(category, product_id, field_key, list_value_id)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemListLinkRow {
    /// Category identifier.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Enum-backed field key.
    pub field_key: FieldKey,
    /// Resolved enum member row.
    pub list_value_id: ListValueId,
    /// Match type.
    pub match_type: MatchType,
    /// Match score in `[0, 1]`.
    pub score: f64,
}

// ============================================================================
// SECTION: Source Registry
// ============================================================================

/// Normalized source registry row.
///
/// # Invariants
/// - `host` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRegistryRow {
    /// Source host name.
    pub host: String,
    /// Registrable root domain of the host.
    pub root_domain: String,
    /// Source trust tier (lower is better).
    pub tier: u8,
}

/// Per-candidate assertion rooted in a registered source.
///
/// # Invariants
/// - `(host, category, product_id, field_key, candidate_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAssertionRow {
    /// Asserting source host.
    pub host: String,
    /// Category identifier.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Field key.
    pub field_key: FieldKey,
    /// Candidate identifier (store-disambiguated form).
    pub candidate_id: CandidateId,
    /// Extraction method label.
    pub method: String,
    /// Assertion timestamp.
    pub asserted_at: Timestamp,
}

/// Evidence citation attached to a source assertion.
///
/// # Invariants
/// - `(assertion, snippet_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvidenceRefRow {
    /// Snippet identifier within the source artifact.
    pub snippet_id: String,
    /// Verbatim quoted text.
    pub quote: String,
    /// Source URL the quote was retrieved from.
    pub url: String,
    /// Retrieval timestamp.
    pub retrieved_at: Timestamp,
}
