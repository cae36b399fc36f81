// crates/spec-desk-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Curation Store
// Description: Relational curation store backed by SQLite WAL.
// Purpose: Persist candidates, field state, components, enums, and review rows.
// Dependencies: spec-desk-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the relational curation store on `SQLite`. All
//! writes go through named operations wrapped in single transactions; no raw
//! row construction leaks outside this module. Lane actions compose the pure
//! core transition with propagation (authoritative component cascade, enum
//! rename) inside one transaction, so observers never see partial
//! propagation. The returned row always equals the persisted row
//! field-for-field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::CandidateReviewRow;
use spec_desk_core::Category;
use spec_desk_core::ComponentIdentityId;
use spec_desk_core::ComponentIdentityRow;
use spec_desk_core::ComponentType;
use spec_desk_core::ComponentValueId;
use spec_desk_core::ComponentValueRow;
use spec_desk_core::Constraint;
use spec_desk_core::CrossValidationRule;
use spec_desk_core::EnumListId;
use spec_desk_core::EnumListRow;
use spec_desk_core::EnumPolicy;
use spec_desk_core::Evidence;
use spec_desk_core::FieldKey;
use spec_desk_core::ItemComponentLinkRow;
use spec_desk_core::ItemFieldStateId;
use spec_desk_core::ItemFieldStateRow;
use spec_desk_core::ItemIdentity;
use spec_desk_core::ItemLifecycle;
use spec_desk_core::ItemListLinkRow;
use spec_desk_core::ItemRecord;
use spec_desk_core::KeyReviewAuditRecord;
use spec_desk_core::KeyReviewStateId;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::LaneAction;
use spec_desk_core::LaneActionKind;
use spec_desk_core::LaneSlot;
use spec_desk_core::ListValueId;
use spec_desk_core::ListValueRow;
use spec_desk_core::MatchType;
use spec_desk_core::ProductId;
use spec_desk_core::PropertyKey;
use spec_desk_core::ReviewDecision;
use spec_desk_core::ReviewErrorKind;
use spec_desk_core::SlotRef;
use spec_desk_core::SourceAssertionRow;
use spec_desk_core::SourceEvidenceRefRow;
use spec_desk_core::SourceRegistryRow;
use spec_desk_core::SourceRef;
use spec_desk_core::TargetKind;
use spec_desk_core::Timestamp;
use spec_desk_core::ValueSource;
use spec_desk_core::VariancePolicy;
use spec_desk_core::lane_transition;
use spec_desk_core::normalize_value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of read-only connections.
const DEFAULT_READ_POOL_SIZE: usize = 2;
/// Maximum accepted size of a single stored value, in bytes.
pub const MAX_VALUE_BYTES: usize = 256 * 1024;

/// Domain tables reported by [`SqliteSpecStore::counts`].
const TABLE_NAMES: &[&str] = &[
    "items",
    "candidates",
    "item_field_state",
    "component_identity",
    "component_value",
    "enum_list",
    "list_value",
    "item_component_link",
    "item_list_link",
    "key_review_state",
    "key_review_audit",
    "candidate_review",
    "source_registry",
    "source_assertion",
    "source_evidence_ref",
];

/// Shared column list for review-row selects.
const REVIEW_COLUMNS: &str = "id, category, target_kind, slot_key, item_field_state_id, \
     component_identity_id, component_value_id, component_identifier, property_key, \
     list_value_id, enum_list_id, enum_value_norm, selected_value, selected_candidate_id, \
     ai_confirm_primary_status, ai_confirm_primary_confidence, ai_confirm_primary_at, \
     user_accept_primary_status, user_accept_primary_at, \
     ai_confirm_shared_status, ai_confirm_shared_confidence, ai_confirm_shared_at, \
     user_accept_shared_status, user_accept_shared_at";

/// Shared column list for candidate selects.
const CANDIDATE_COLUMNS: &str = "candidate_id, value, normalized_value, score, rank, host, \
     root_domain, method, tier, snippet_id, quote, url, retrieved_at, is_component_field, \
     is_list_field, component_type";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` curation store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteSpecStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteSpecStoreConfig {
    /// Returns a config with defaults for the given database path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` curation store errors.
///
/// # Invariants
/// - Error messages avoid embedding whole row payloads.
#[derive(Debug, Error)]
pub enum SqliteSpecStoreError {
    /// Store I/O error.
    #[error("spec store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("spec store db error: {0}")]
    Db(String),
    /// Relational integrity violation; the transaction rolled back.
    #[error("storage_integrity: {0}")]
    Integrity(String),
    /// A requested slot, product, or component does not exist.
    #[error("spec store not found: {0}")]
    NotFound(String),
    /// Invalid store configuration or input.
    #[error("spec store invalid data: {0}")]
    Invalid(String),
    /// A lane action was rejected by the review state machine.
    #[error("review action rejected: {0}")]
    Rejected(#[from] ReviewErrorKind),
}

// ============================================================================
// SECTION: Seed Inputs
// ============================================================================

/// Upsert input for an item field state row.
///
/// # Invariants
/// - `(category, product_id, field_key)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFieldStateSeed {
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

/// Upsert input for a component identity row.
///
/// # Invariants
/// - `(category, component_type, canonical_name, maker)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentitySeed {
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

/// Upsert input for a shared component property value.
///
/// # Invariants
/// - `(component_identity_id, property_key)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValueSeed {
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

/// Upsert input for an enum member row.
///
/// # Invariants
/// - `(enum_list_id, normalized_value)` is the natural key; the normalized
///   form is computed at the store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListValueSeed {
    /// Owning enum list.
    pub enum_list_id: EnumListId,
    /// Raw member value.
    pub value: String,
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

/// Logical locator for a review slot, resolved at the store boundary.
///
/// # Invariants
/// - Logical variants resolve to slot ids inside the upsert transaction; a
///   locator that cannot resolve is an integrity error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotLocator {
    /// Fully resolved slot reference.
    Resolved {
        /// Resolved slot.
        slot: SlotRef,
    },
    /// Grid slot addressed by item and field.
    Grid {
        /// Product identifier.
        product_id: ProductId,
        /// Field key.
        field_key: FieldKey,
    },
    /// Component slot addressed by catalog identity and property.
    Component {
        /// Component type.
        component_type: ComponentType,
        /// Canonical component name.
        canonical_name: String,
        /// Component maker.
        maker: String,
        /// Property key.
        property_key: PropertyKey,
    },
    /// Enum slot addressed by field and member value.
    Enum {
        /// Field key.
        field_key: FieldKey,
        /// Raw member value.
        value: String,
    },
}

/// Upsert input for a review state row.
///
/// # Invariants
/// - Seeding an existing slot leaves its lanes untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyReviewSeed {
    /// Category identifier.
    pub category: Category,
    /// Slot locator.
    pub locator: SlotLocator,
    /// Initially recorded selection value, when any.
    pub selected_value: Option<String>,
    /// Initially recorded selection candidate, when any.
    pub selected_candidate_id: Option<CandidateId>,
}

/// Propagation attached to a lane action.
///
/// # Invariants
/// - `ComponentCascade` is only attached when the property's effective
///   variance policy is authoritative.
/// - `EnumRename` is only attached when the target value differs from the
///   slot's current value.
#[derive(Debug, Clone, PartialEq)]
pub enum Propagation {
    /// No propagation; the action is slot-local.
    None,
    /// Record an accepted grid selection onto the item field state row.
    GridSelection,
    /// Authoritative component cascade to linked items.
    ComponentCascade {
        /// Cross-validation rules re-evaluated for affected items.
        cross_rules: Vec<CrossValidationRule>,
    },
    /// Enum rename rewriting linked item values.
    EnumRename {
        /// Target member value.
        new_value: String,
    },
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed curation store with WAL support.
///
/// # Invariants
/// - Writes serialize through the write-connection mutex.
/// - Every named write operation runs in a single transaction.
#[derive(Clone)]
pub struct SqliteSpecStore {
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteSpecStore {
    /// Opens an `SQLite`-backed curation store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteSpecStoreConfig) -> Result<Self, SqliteSpecStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        if config.read_pool_size == 0 {
            return Err(SqliteSpecStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_write_connection(config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_read_connection(config)?));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Locks the writer connection.
    fn write_guard(&self) -> Result<MutexGuard<'_, Connection>, SqliteSpecStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteSpecStoreError::Io("spec store write mutex poisoned".to_string()))
    }

    /// Locks one read connection, selected round-robin.
    fn read_guard(&self) -> Result<MutexGuard<'_, Connection>, SqliteSpecStoreError> {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_connections.len();
        self.read_connections[index]
            .lock()
            .map_err(|_| SqliteSpecStoreError::Io("spec store read mutex poisoned".to_string()))
    }

    // ========================================================================
    // SECTION: Items
    // ========================================================================

    /// Upserts an item row keyed on `(category, product_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_item(&self, item: &ItemRecord) -> Result<(), SqliteSpecStoreError> {
        check_value_size("brand", &item.identity.brand)?;
        check_value_size("model", &item.identity.model)?;
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO items (category, product_id, brand, model, variant, lifecycle)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category, product_id) DO UPDATE SET
                 brand = excluded.brand,
                 model = excluded.model,
                 variant = excluded.variant,
                 lifecycle = excluded.lifecycle",
            params![
                item.category.as_str(),
                item.product_id.as_str(),
                item.identity.brand,
                item.identity.model,
                item.identity.variant,
                item.lifecycle.as_str(),
            ],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    /// Returns an item row, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_item(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Option<ItemRecord>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        guard
            .query_row(
                "SELECT category, product_id, brand, model, variant, lifecycle
                 FROM items WHERE category = ?1 AND product_id = ?2",
                params![category.as_str(), product_id.as_str()],
                item_from_sql,
            )
            .optional()
            .map_err(db_err)
    }

    /// Returns every item in a category ordered by product id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn items_for_category(
        &self,
        category: &Category,
    ) -> Result<Vec<ItemRecord>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT category, product_id, brand, model, variant, lifecycle
                 FROM items WHERE category = ?1 ORDER BY product_id",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map(params![category.as_str()], item_from_sql).map_err(db_err)?;
        collect_rows(rows)
    }

    // ========================================================================
    // SECTION: Candidates
    // ========================================================================

    /// Upserts every candidate of one product, disambiguating incoming
    /// candidate ids at the store boundary.
    ///
    /// An id appearing under more than one field gets `::{field_key}::{seq}`
    /// appended per occurrence; a duplicate id within one field keeps its
    /// first occurrence raw and suffixes later ones with `::dup_{seq}`. The
    /// assignment is deterministic in artifact order, so re-seeding the same
    /// input is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure or oversize values.
    pub fn upsert_product_candidates(
        &self,
        category: &Category,
        product_id: &ProductId,
        batches: &[(FieldKey, Vec<Candidate>)],
    ) -> Result<Vec<(FieldKey, Vec<Candidate>)>, SqliteSpecStoreError> {
        let mut fields_by_id: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (field_key, candidates) in batches {
            for candidate in candidates {
                fields_by_id
                    .entry(candidate.candidate_id.as_str())
                    .or_default()
                    .insert(field_key.as_str());
            }
        }

        let mut disambiguated = Vec::with_capacity(batches.len());
        for (field_key, candidates) in batches {
            let mut occurrence: BTreeMap<&str, u32> = BTreeMap::new();
            let mut final_candidates = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let raw_id = candidate.candidate_id.as_str();
                let seq = occurrence.entry(raw_id).or_insert(0);
                let cross_field = fields_by_id.get(raw_id).is_some_and(|fields| fields.len() > 1);
                let final_id = if cross_field {
                    candidate.candidate_id.with_field_discriminator(field_key, *seq)
                } else if *seq > 0 {
                    candidate.candidate_id.with_dup_discriminator(*seq)
                } else {
                    candidate.candidate_id.clone()
                };
                *seq += 1;
                let mut resolved = candidate.clone();
                resolved.candidate_id = final_id;
                final_candidates.push(resolved);
            }
            disambiguated.push((field_key.clone(), final_candidates));
        }

        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        for (field_key, candidates) in &disambiguated {
            for candidate in candidates {
                check_value_size("candidate value", &candidate.value)?;
                check_value_size("candidate quote", &candidate.evidence.quote)?;
                tx.execute(
                    "INSERT INTO candidates (category, product_id, field_key, candidate_id,
                         value, normalized_value, score, rank, host, root_domain, method, tier,
                         snippet_id, quote, url, retrieved_at, is_component_field, is_list_field,
                         component_type)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19)
                     ON CONFLICT(category, product_id, field_key, candidate_id) DO UPDATE SET
                         value = excluded.value,
                         normalized_value = excluded.normalized_value,
                         score = excluded.score,
                         rank = excluded.rank,
                         host = excluded.host,
                         root_domain = excluded.root_domain,
                         method = excluded.method,
                         tier = excluded.tier,
                         snippet_id = excluded.snippet_id,
                         quote = excluded.quote,
                         url = excluded.url,
                         retrieved_at = excluded.retrieved_at,
                         is_component_field = excluded.is_component_field,
                         is_list_field = excluded.is_list_field,
                         component_type = excluded.component_type",
                    params![
                        category.as_str(),
                        product_id.as_str(),
                        field_key.as_str(),
                        candidate.candidate_id.as_str(),
                        candidate.value,
                        candidate.normalized_value,
                        candidate.score,
                        candidate.rank,
                        candidate.source.host,
                        candidate.source.root_domain,
                        candidate.source.method,
                        candidate.source.tier,
                        candidate.evidence.snippet_id,
                        candidate.evidence.quote,
                        candidate.evidence.url,
                        candidate.evidence.retrieved_at.as_unix_millis(),
                        i64::from(candidate.is_component_field),
                        i64::from(candidate.is_list_field),
                        candidate.component_type.as_ref().map(ComponentType::as_str),
                    ],
                )
                .map_err(db_err)?;
            }
        }
        commit(tx)?;
        Ok(disambiguated)
    }

    /// Returns the candidates for a field ordered by `(rank asc, score desc)`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn candidates_for_field(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<Vec<Candidate>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {CANDIDATE_COLUMNS} FROM candidates
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3
                 ORDER BY rank ASC, score DESC, candidate_id ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), product_id.as_str(), field_key.as_str()],
                raw_candidate_from_sql,
            )
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawCandidate::into_candidate).collect()
    }

    /// Returns every candidate of one product grouped by field.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn candidates_for_product(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<BTreeMap<FieldKey, Vec<Candidate>>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT field_key, {CANDIDATE_COLUMNS} FROM candidates
                 WHERE category = ?1 AND product_id = ?2
                 ORDER BY field_key ASC, rank ASC, score DESC, candidate_id ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str(), product_id.as_str()], |row| {
                let field_key: String = row.get(0)?;
                let raw = raw_candidate_from_sql_offset(row, 1)?;
                Ok((field_key, raw))
            })
            .map_err(db_err)?;
        let mut grouped: BTreeMap<FieldKey, Vec<Candidate>> = BTreeMap::new();
        for row in rows {
            let (field_key, raw) = row.map_err(db_err)?;
            grouped.entry(FieldKey::new(field_key)).or_default().push(raw.into_candidate()?);
        }
        Ok(grouped)
    }

    /// Returns one candidate, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_candidate(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        candidate_id: &CandidateId,
    ) -> Result<Option<Candidate>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                &format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM candidates
                     WHERE category = ?1 AND product_id = ?2 AND field_key = ?3
                       AND candidate_id = ?4"
                ),
                params![
                    category.as_str(),
                    product_id.as_str(),
                    field_key.as_str(),
                    candidate_id.as_str()
                ],
                raw_candidate_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawCandidate::into_candidate).transpose()
    }

    // ========================================================================
    // SECTION: Item Field State
    // ========================================================================

    /// Upserts an item field state row and returns the persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_item_field_state(
        &self,
        seed: &ItemFieldStateSeed,
    ) -> Result<ItemFieldStateRow, SqliteSpecStoreError> {
        if let Some(value) = &seed.value {
            check_value_size("field value", value)?;
        }
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO item_field_state (category, product_id, field_key, value, confidence,
                 source, overridden, needs_ai_review, ai_review_complete, accepted_candidate_id,
                 constraint_conflict)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(category, product_id, field_key) DO UPDATE SET
                 value = excluded.value,
                 confidence = excluded.confidence,
                 source = excluded.source,
                 overridden = excluded.overridden,
                 needs_ai_review = excluded.needs_ai_review,
                 ai_review_complete = excluded.ai_review_complete,
                 accepted_candidate_id = excluded.accepted_candidate_id,
                 constraint_conflict = excluded.constraint_conflict",
            params![
                seed.category.as_str(),
                seed.product_id.as_str(),
                seed.field_key.as_str(),
                seed.value,
                seed.confidence,
                seed.source.as_str(),
                i64::from(seed.overridden),
                i64::from(seed.needs_ai_review),
                i64::from(seed.ai_review_complete),
                seed.accepted_candidate_id.as_ref().map(CandidateId::as_str),
                i64::from(seed.constraint_conflict),
            ],
        )
        .map_err(db_err)?;
        let row = load_item_field_state_tx(&tx, &seed.category, &seed.product_id, &seed.field_key)?
            .ok_or_else(|| {
                SqliteSpecStoreError::Integrity("item field state vanished after upsert".to_string())
            })?;
        commit(tx)?;
        Ok(row)
    }

    /// Returns an item field state row by logical key, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_item_field_state(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<Option<ItemFieldStateRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, category, product_id, field_key, value, confidence, source,
                     overridden, needs_ai_review, ai_review_complete, accepted_candidate_id,
                     constraint_conflict
                 FROM item_field_state
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
                params![category.as_str(), product_id.as_str(), field_key.as_str()],
                raw_item_field_state_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawItemFieldState::into_row).transpose()
    }

    /// Returns an item field state row by row id, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_item_field_state_by_id(
        &self,
        id: ItemFieldStateId,
    ) -> Result<Option<ItemFieldStateRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, category, product_id, field_key, value, confidence, source,
                     overridden, needs_ai_review, ai_review_complete, accepted_candidate_id,
                     constraint_conflict
                 FROM item_field_state WHERE id = ?1",
                params![id.get()],
                raw_item_field_state_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawItemFieldState::into_row).transpose()
    }

    /// Returns every field state row of one product ordered by field key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn item_field_states_for_product(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Vec<ItemFieldStateRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, category, product_id, field_key, value, confidence, source,
                     overridden, needs_ai_review, ai_review_complete, accepted_candidate_id,
                     constraint_conflict
                 FROM item_field_state
                 WHERE category = ?1 AND product_id = ?2 ORDER BY field_key",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), product_id.as_str()],
                raw_item_field_state_from_sql,
            )
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawItemFieldState::into_row).collect()
    }

    // ========================================================================
    // SECTION: Components
    // ========================================================================

    /// Upserts a component identity row and returns the persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_component_identity(
        &self,
        seed: &ComponentIdentitySeed,
    ) -> Result<ComponentIdentityRow, SqliteSpecStoreError> {
        check_value_size("component name", &seed.canonical_name)?;
        let aliases_json = to_json_text(&seed.aliases)?;
        let links_json = to_json_text(&seed.links)?;
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO component_identity (category, component_type, canonical_name, maker,
                 aliases_json, links_json, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(category, component_type, canonical_name, maker) DO UPDATE SET
                 aliases_json = excluded.aliases_json,
                 links_json = excluded.links_json,
                 source = excluded.source",
            params![
                seed.category.as_str(),
                seed.component_type.as_str(),
                seed.canonical_name,
                seed.maker,
                aliases_json,
                links_json,
                seed.source.as_str(),
            ],
        )
        .map_err(db_err)?;
        let row = tx
            .query_row(
                "SELECT id, category, component_type, canonical_name, maker, aliases_json,
                     links_json, source
                 FROM component_identity
                 WHERE category = ?1 AND component_type = ?2 AND canonical_name = ?3
                   AND maker = ?4",
                params![
                    seed.category.as_str(),
                    seed.component_type.as_str(),
                    seed.canonical_name,
                    seed.maker
                ],
                raw_component_identity_from_sql,
            )
            .map_err(db_err)?
            .into_row()?;
        commit(tx)?;
        Ok(row)
    }

    /// Returns a component identity row by natural key, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_component_identity(
        &self,
        category: &Category,
        component_type: &ComponentType,
        canonical_name: &str,
        maker: &str,
    ) -> Result<Option<ComponentIdentityRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, category, component_type, canonical_name, maker, aliases_json,
                     links_json, source
                 FROM component_identity
                 WHERE category = ?1 AND component_type = ?2 AND canonical_name = ?3
                   AND maker = ?4",
                params![category.as_str(), component_type.as_str(), canonical_name, maker],
                raw_component_identity_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawComponentIdentity::into_row).transpose()
    }

    /// Returns a component identity row by row id, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_component_identity_by_id(
        &self,
        id: ComponentIdentityId,
    ) -> Result<Option<ComponentIdentityRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, category, component_type, canonical_name, maker, aliases_json,
                     links_json, source
                 FROM component_identity WHERE id = ?1",
                params![id.get()],
                raw_component_identity_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawComponentIdentity::into_row).transpose()
    }

    /// Returns every component identity of one type ordered by name and maker.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn component_identities_for_type(
        &self,
        category: &Category,
        component_type: &ComponentType,
    ) -> Result<Vec<ComponentIdentityRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, category, component_type, canonical_name, maker, aliases_json,
                     links_json, source
                 FROM component_identity
                 WHERE category = ?1 AND component_type = ?2
                 ORDER BY canonical_name, maker",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), component_type.as_str()],
                raw_component_identity_from_sql,
            )
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawComponentIdentity::into_row).collect()
    }

    /// Upserts a component property value row and returns the persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_component_value(
        &self,
        seed: &ComponentValueSeed,
    ) -> Result<ComponentValueRow, SqliteSpecStoreError> {
        if let Some(value) = &seed.value {
            check_value_size("property value", value)?;
        }
        let constraints_json = to_json_text(&seed.constraints)?;
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO component_value (component_identity_id, property_key, value, confidence,
                 variance_policy, constraints_json, accepted_candidate_id, needs_review,
                 overridden)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(component_identity_id, property_key) DO UPDATE SET
                 value = excluded.value,
                 confidence = excluded.confidence,
                 variance_policy = excluded.variance_policy,
                 constraints_json = excluded.constraints_json,
                 accepted_candidate_id = excluded.accepted_candidate_id,
                 needs_review = excluded.needs_review,
                 overridden = excluded.overridden",
            params![
                seed.component_identity_id.get(),
                seed.property_key.as_str(),
                seed.value,
                seed.confidence,
                seed.variance_policy.map(VariancePolicy::as_str),
                constraints_json,
                seed.accepted_candidate_id.as_ref().map(CandidateId::as_str),
                i64::from(seed.needs_review),
                i64::from(seed.overridden),
            ],
        )
        .map_err(db_err)?;
        let row = tx
            .query_row(
                "SELECT id, component_identity_id, property_key, value, confidence,
                     variance_policy, constraints_json, accepted_candidate_id, needs_review,
                     overridden
                 FROM component_value
                 WHERE component_identity_id = ?1 AND property_key = ?2",
                params![seed.component_identity_id.get(), seed.property_key.as_str()],
                raw_component_value_from_sql,
            )
            .map_err(db_err)?
            .into_row()?;
        commit(tx)?;
        Ok(row)
    }

    /// Returns a component property value row by row id, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_component_value_by_id(
        &self,
        id: ComponentValueId,
    ) -> Result<Option<ComponentValueRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, component_identity_id, property_key, value, confidence,
                     variance_policy, constraints_json, accepted_candidate_id, needs_review,
                     overridden
                 FROM component_value WHERE id = ?1",
                params![id.get()],
                raw_component_value_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawComponentValue::into_row).transpose()
    }

    /// Returns every property value of one component ordered by property key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn component_values_for_identity(
        &self,
        component_identity_id: ComponentIdentityId,
    ) -> Result<Vec<ComponentValueRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, component_identity_id, property_key, value, confidence,
                     variance_policy, constraints_json, accepted_candidate_id, needs_review,
                     overridden
                 FROM component_value
                 WHERE component_identity_id = ?1 ORDER BY property_key",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![component_identity_id.get()], raw_component_value_from_sql)
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawComponentValue::into_row).collect()
    }

    // ========================================================================
    // SECTION: Enum Lists
    // ========================================================================

    /// Upserts an enum list row and returns the persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_enum_list(
        &self,
        category: &Category,
        field_key: &FieldKey,
    ) -> Result<EnumListRow, SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO enum_list (category, field_key) VALUES (?1, ?2)
             ON CONFLICT(category, field_key) DO NOTHING",
            params![category.as_str(), field_key.as_str()],
        )
        .map_err(db_err)?;
        let row = load_enum_list_tx(&tx, category, field_key)?.ok_or_else(|| {
            SqliteSpecStoreError::Integrity("enum list vanished after upsert".to_string())
        })?;
        commit(tx)?;
        Ok(row)
    }

    /// Returns an enum list row by logical key, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_enum_list(
        &self,
        category: &Category,
        field_key: &FieldKey,
    ) -> Result<Option<EnumListRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, category, field_key FROM enum_list
                 WHERE category = ?1 AND field_key = ?2",
                params![category.as_str(), field_key.as_str()],
                raw_enum_list_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawEnumList::into_row).transpose()
    }

    /// Returns every enum list of one category ordered by field key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn enum_lists_for_category(
        &self,
        category: &Category,
    ) -> Result<Vec<EnumListRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, category, field_key FROM enum_list
                 WHERE category = ?1 ORDER BY field_key",
            )
            .map_err(db_err)?;
        let rows =
            stmt.query_map(params![category.as_str()], raw_enum_list_from_sql).map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawEnumList::into_row).collect()
    }

    /// Upserts an enum member row and returns the persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_list_value(
        &self,
        seed: &ListValueSeed,
    ) -> Result<ListValueRow, SqliteSpecStoreError> {
        check_value_size("enum value", &seed.value)?;
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        let row = upsert_list_value_tx(&tx, seed)?;
        commit(tx)?;
        Ok(row)
    }

    /// Returns an enum member row by row id, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_list_value_by_id(
        &self,
        id: ListValueId,
    ) -> Result<Option<ListValueRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, enum_list_id, value, normalized_value, source, enum_policy,
                     accepted_candidate_id, needs_review, overridden, source_timestamp
                 FROM list_value WHERE id = ?1",
                params![id.get()],
                raw_list_value_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawListValue::into_row).transpose()
    }

    /// Returns an enum member row by normalized value, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_list_value(
        &self,
        enum_list_id: EnumListId,
        normalized_value: &str,
    ) -> Result<Option<ListValueRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                "SELECT id, enum_list_id, value, normalized_value, source, enum_policy,
                     accepted_candidate_id, needs_review, overridden, source_timestamp
                 FROM list_value
                 WHERE enum_list_id = ?1 AND normalized_value = ?2",
                params![enum_list_id.get(), normalized_value],
                raw_list_value_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawListValue::into_row).transpose()
    }

    /// Returns every member of one enum list ordered by normalized value.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn list_values_for_list(
        &self,
        enum_list_id: EnumListId,
    ) -> Result<Vec<ListValueRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, enum_list_id, value, normalized_value, source, enum_policy,
                     accepted_candidate_id, needs_review, overridden, source_timestamp
                 FROM list_value
                 WHERE enum_list_id = ?1 ORDER BY normalized_value",
            )
            .map_err(db_err)?;
        let rows =
            stmt.query_map(params![enum_list_id.get()], raw_list_value_from_sql).map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawListValue::into_row).collect()
    }

    // ========================================================================
    // SECTION: Links
    // ========================================================================

    /// Upserts an item-to-component link keyed on `(category, product, field)`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_item_component_link(
        &self,
        link: &ItemComponentLinkRow,
    ) -> Result<(), SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO item_component_link (category, product_id, field_key,
                 component_identity_id, match_type, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category, product_id, field_key) DO UPDATE SET
                 component_identity_id = excluded.component_identity_id,
                 match_type = excluded.match_type,
                 score = excluded.score",
            params![
                link.category.as_str(),
                link.product_id.as_str(),
                link.field_key.as_str(),
                link.component_identity_id.get(),
                link.match_type.as_str(),
                link.score,
            ],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    /// Returns every item link of one component ordered by product id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn links_for_component(
        &self,
        component_identity_id: ComponentIdentityId,
    ) -> Result<Vec<ItemComponentLinkRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT category, product_id, field_key, component_identity_id, match_type, score
                 FROM item_component_link
                 WHERE component_identity_id = ?1 ORDER BY product_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![component_identity_id.get()], raw_component_link_from_sql)
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawComponentLink::into_row).collect()
    }

    /// Upserts an item-to-enum link keyed on `(category, product, field, value)`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_item_list_link(
        &self,
        link: &ItemListLinkRow,
    ) -> Result<(), SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO item_list_link (category, product_id, field_key, list_value_id,
                 match_type, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category, product_id, field_key, list_value_id) DO UPDATE SET
                 match_type = excluded.match_type,
                 score = excluded.score",
            params![
                link.category.as_str(),
                link.product_id.as_str(),
                link.field_key.as_str(),
                link.list_value_id.get(),
                link.match_type.as_str(),
                link.score,
            ],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    /// Returns every item link of one enum member ordered by product id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn links_for_list_value(
        &self,
        list_value_id: ListValueId,
    ) -> Result<Vec<ItemListLinkRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT category, product_id, field_key, list_value_id, match_type, score
                 FROM item_list_link
                 WHERE list_value_id = ?1 ORDER BY product_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![list_value_id.get()], raw_list_link_from_sql)
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawListLink::into_row).collect()
    }

    // ========================================================================
    // SECTION: Review State
    // ========================================================================

    /// Upserts a review state row, resolving slot ids from logical keys when
    /// not provided, and returns the persisted row.
    ///
    /// Seeding an existing slot leaves its lanes untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError::Integrity`] when the locator cannot
    /// resolve to the slot ids its target kind requires.
    pub fn upsert_key_review_state(
        &self,
        seed: &KeyReviewSeed,
    ) -> Result<KeyReviewStateRow, SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        let slot = resolve_locator_tx(&tx, &seed.category, &seed.locator)?;
        let row = seed_review_row_tx(
            &tx,
            &seed.category,
            &slot,
            seed.selected_value.as_deref(),
            seed.selected_candidate_id.as_ref(),
        )?;
        commit(tx)?;
        Ok(row)
    }

    /// Returns a review state row for a slot, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn get_key_review_state(
        &self,
        category: &Category,
        slot: &SlotRef,
    ) -> Result<Option<KeyReviewStateRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let raw = guard
            .query_row(
                &format!(
                    "SELECT {REVIEW_COLUMNS} FROM key_review_state
                     WHERE category = ?1 AND target_kind = ?2 AND slot_key = ?3"
                ),
                params![category.as_str(), slot.target_kind().as_str(), slot.slot_key()],
                raw_review_row_from_sql,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawReviewRow::into_row).transpose()
    }

    /// Returns every review state row of one target kind in a category.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn key_review_states_for_kind(
        &self,
        category: &Category,
        target_kind: TargetKind,
    ) -> Result<Vec<KeyReviewStateRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(&format!(
                "SELECT {REVIEW_COLUMNS} FROM key_review_state
                 WHERE category = ?1 AND target_kind = ?2 ORDER BY slot_key"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str(), target_kind.as_str()], raw_review_row_from_sql)
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawReviewRow::into_row).collect()
    }

    /// Resolves the grid slot for an item field.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError::NotFound`] when the field state row
    /// does not exist.
    pub fn resolve_grid_slot(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<SlotRef, SqliteSpecStoreError> {
        self.get_item_field_state(category, product_id, field_key)?
            .map(|row| SlotRef::GridKey {
                item_field_state_id: row.id,
            })
            .ok_or_else(|| {
                SqliteSpecStoreError::NotFound(format!(
                    "no item field state for {product_id}.{field_key}"
                ))
            })
    }

    /// Applies a lane action to a slot inside one transaction, running any
    /// attached propagation, and returns the post-write row.
    ///
    /// For an enum rename the action lands on the renamed target slot; the
    /// returned row is that slot's.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError::Rejected`] when the state machine
    /// rejects the action, [`SqliteSpecStoreError::NotFound`] when the slot
    /// has no review row, and other variants on storage failure. The
    /// transaction rolls back on every error.
    pub fn apply_lane_state(
        &self,
        category: &Category,
        slot: &SlotRef,
        action: &LaneAction,
        propagation: &Propagation,
    ) -> Result<KeyReviewStateRow, SqliteSpecStoreError> {
        check_value_size("selected value", &action.selected_value)?;
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;

        let acting_slot = match propagation {
            Propagation::EnumRename {
                new_value,
            } => rename_enum_value_tx(&tx, category, slot, new_value, action)?,
            _ => slot.clone(),
        };

        let pre = load_review_row_tx(&tx, category, &acting_slot)?.ok_or_else(|| {
            SqliteSpecStoreError::NotFound(format!(
                "no review state for slot {}",
                acting_slot.slot_key()
            ))
        })?;
        let post = lane_transition(&pre, action)?;
        persist_review_row_tx(&tx, &post)?;
        insert_audit_tx(
            &tx,
            &KeyReviewAuditRecord {
                category: category.clone(),
                target_kind: acting_slot.target_kind(),
                slot_key: acting_slot.slot_key(),
                lane: action.lane,
                action: action.kind,
                candidate_id: action.candidate_id.clone(),
                selected_value: action.selected_value.clone(),
                at: action.at,
            },
        )?;
        if action.kind == LaneActionKind::Confirm {
            upsert_candidate_review_tx(
                &tx,
                category,
                &acting_slot,
                action.candidate_id.as_ref(),
                &action.selected_value,
                action.at,
            )?;
        }

        match propagation {
            Propagation::ComponentCascade {
                cross_rules,
            } => cascade_component_tx(&tx, category, &acting_slot, action, cross_rules)?,
            Propagation::GridSelection => {
                if action.kind == LaneActionKind::Accept {
                    record_grid_selection_tx(&tx, &acting_slot, action)?;
                }
            }
            Propagation::None | Propagation::EnumRename { .. } => {}
        }

        let persisted = load_review_row_tx(&tx, category, &acting_slot)?.ok_or_else(|| {
            SqliteSpecStoreError::Integrity("review row vanished after write".to_string())
        })?;
        commit(tx)?;
        Ok(persisted)
    }

    // ========================================================================
    // SECTION: Audit and Candidate Reviews
    // ========================================================================

    /// Returns the audit log of one slot in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn audits_for_slot(
        &self,
        category: &Category,
        slot: &SlotRef,
    ) -> Result<Vec<KeyReviewAuditRecord>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT category, target_kind, slot_key, lane, action, candidate_id,
                     selected_value, acted_at
                 FROM key_review_audit
                 WHERE category = ?1 AND target_kind = ?2 AND slot_key = ?3
                 ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), slot.target_kind().as_str(), slot.slot_key()],
                raw_audit_from_sql,
            )
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawAudit::into_record).collect()
    }

    /// Upserts a candidate review row keyed on its natural key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_candidate_review(
        &self,
        row: &CandidateReviewRow,
    ) -> Result<(), SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO candidate_review (category, target_kind, slot_key, candidate_id,
                 decision, value, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(category, target_kind, slot_key, candidate_id) DO UPDATE SET
                 decision = excluded.decision,
                 value = excluded.value,
                 reviewed_at = excluded.reviewed_at",
            params![
                row.category.as_str(),
                row.target_kind.as_str(),
                row.slot_key,
                row.candidate_id.as_str(),
                row.decision.as_str(),
                row.value,
                row.reviewed_at.as_unix_millis(),
            ],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    /// Returns the candidate reviews of one slot ordered by candidate id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn candidate_reviews_for_slot(
        &self,
        category: &Category,
        target_kind: TargetKind,
        slot_key: &str,
    ) -> Result<Vec<CandidateReviewRow>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut stmt = guard
            .prepare(
                "SELECT category, target_kind, slot_key, candidate_id, decision, value,
                     reviewed_at
                 FROM candidate_review
                 WHERE category = ?1 AND target_kind = ?2 AND slot_key = ?3
                 ORDER BY candidate_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), target_kind.as_str(), slot_key],
                raw_candidate_review_from_sql,
            )
            .map_err(db_err)?;
        let raw = collect_rows(rows)?;
        raw.into_iter().map(RawCandidateReview::into_row).collect()
    }

    /// Backfills the audit log from terminal candidate reviews, skipping
    /// entries that already exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn backfill_audit_from_reviews(&self) -> Result<u64, SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        let inserted = tx
            .execute(
                "INSERT INTO key_review_audit (category, target_kind, slot_key, lane, action,
                     candidate_id, selected_value, acted_at)
                 SELECT cr.category, cr.target_kind, cr.slot_key, 'shared', 'confirm',
                     cr.candidate_id, COALESCE(cr.value, ''), cr.reviewed_at
                 FROM candidate_review cr
                 WHERE cr.decision != 'neutral'
                   AND NOT EXISTS (
                       SELECT 1 FROM key_review_audit ka
                       WHERE ka.category = cr.category
                         AND ka.target_kind = cr.target_kind
                         AND ka.slot_key = cr.slot_key
                         AND ka.candidate_id = cr.candidate_id
                         AND ka.acted_at = cr.reviewed_at
                   )",
                params![],
            )
            .map_err(db_err)?;
        commit(tx)?;
        Ok(u64::try_from(inserted).unwrap_or(u64::MAX))
    }

    // ========================================================================
    // SECTION: Sources
    // ========================================================================

    /// Upserts a source registry row keyed on host.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_source(&self, row: &SourceRegistryRow) -> Result<(), SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO source_registry (host, root_domain, tier) VALUES (?1, ?2, ?3)
             ON CONFLICT(host) DO UPDATE SET
                 root_domain = excluded.root_domain,
                 tier = excluded.tier",
            params![row.host, row.root_domain, row.tier],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    /// Upserts a source assertion row keyed on its natural key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_source_assertion(
        &self,
        row: &SourceAssertionRow,
    ) -> Result<(), SqliteSpecStoreError> {
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO source_assertion (host, category, product_id, field_key, candidate_id,
                 method, asserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(host, category, product_id, field_key, candidate_id) DO UPDATE SET
                 method = excluded.method,
                 asserted_at = excluded.asserted_at",
            params![
                row.host,
                row.category.as_str(),
                row.product_id.as_str(),
                row.field_key.as_str(),
                row.candidate_id.as_str(),
                row.method,
                row.asserted_at.as_unix_millis(),
            ],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    /// Upserts an evidence reference for a source assertion.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on write failure.
    pub fn upsert_source_evidence_ref(
        &self,
        assertion: &SourceAssertionRow,
        evidence: &SourceEvidenceRefRow,
    ) -> Result<(), SqliteSpecStoreError> {
        check_value_size("evidence quote", &evidence.quote)?;
        let mut guard = self.write_guard()?;
        let tx = begin(&mut guard)?;
        tx.execute(
            "INSERT INTO source_evidence_ref (host, category, product_id, field_key,
                 candidate_id, snippet_id, quote, url, retrieved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(host, category, product_id, field_key, candidate_id, snippet_id)
             DO UPDATE SET
                 quote = excluded.quote,
                 url = excluded.url,
                 retrieved_at = excluded.retrieved_at",
            params![
                assertion.host,
                assertion.category.as_str(),
                assertion.product_id.as_str(),
                assertion.field_key.as_str(),
                assertion.candidate_id.as_str(),
                evidence.snippet_id,
                evidence.quote,
                evidence.url,
                evidence.retrieved_at.as_unix_millis(),
            ],
        )
        .map_err(db_err)?;
        commit(tx)
    }

    // ========================================================================
    // SECTION: Counts
    // ========================================================================

    /// Returns a map of table name to row count across the domain tables.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSpecStoreError`] on read failure.
    pub fn counts(&self) -> Result<BTreeMap<String, i64>, SqliteSpecStoreError> {
        let guard = self.read_guard()?;
        let mut counts = BTreeMap::new();
        for table in TABLE_NAMES {
            let count: i64 = guard
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), params![], |row| row.get(0))
                .map_err(db_err)?;
            counts.insert((*table).to_string(), count);
        }
        Ok(counts)
    }
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Validates the configured database path shape.
fn validate_store_path(path: &Path) -> Result<(), SqliteSpecStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteSpecStoreError::Invalid("store path is empty".to_string()));
    }
    if path.is_dir() {
        return Err(SqliteSpecStoreError::Invalid(format!(
            "store path is a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Creates the parent directory of the database file when absent.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteSpecStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteSpecStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens the writer connection and applies pragmas.
fn open_write_connection(
    config: &SqliteSpecStoreConfig,
) -> Result<Connection, SqliteSpecStoreError> {
    let connection = Connection::open(&config.path)
        .map_err(|err| SqliteSpecStoreError::Io(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Opens a read-only connection and applies pragmas.
fn open_read_connection(
    config: &SqliteSpecStoreConfig,
) -> Result<Connection, SqliteSpecStoreError> {
    let connection = Connection::open_with_flags(
        &config.path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| SqliteSpecStoreError::Io(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies busy-timeout and journal-mode pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteSpecStoreConfig,
) -> Result<(), SqliteSpecStoreError> {
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_err)?;
    connection
        .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
        .map_err(db_err)?;
    connection.pragma_update(None, "foreign_keys", "on").map_err(db_err)?;
    Ok(())
}

/// Begins a transaction on the guarded writer connection.
fn begin<'a>(
    guard: &'a mut MutexGuard<'_, Connection>,
) -> Result<Transaction<'a>, SqliteSpecStoreError> {
    guard.transaction().map_err(db_err)
}

/// Commits a transaction, mapping the error.
fn commit(tx: Transaction<'_>) -> Result<(), SqliteSpecStoreError> {
    tx.commit().map_err(db_err)
}

/// Maps a `rusqlite` error into a store error.
fn db_err(err: rusqlite::Error) -> SqliteSpecStoreError {
    SqliteSpecStoreError::Db(err.to_string())
}

/// Rejects oversize values before they reach a statement.
fn check_value_size(label: &str, value: &str) -> Result<(), SqliteSpecStoreError> {
    if value.len() > MAX_VALUE_BYTES {
        return Err(SqliteSpecStoreError::Integrity(format!(
            "{label} exceeds size limit: {} bytes (max {MAX_VALUE_BYTES})",
            value.len()
        )));
    }
    Ok(())
}

/// Serializes a value to canonical JSON text for a row column.
fn to_json_text<T: Serialize>(value: &T) -> Result<String, SqliteSpecStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteSpecStoreError::Invalid(err.to_string()))
}

/// Deserializes JSON text from a row column.
fn from_json_text<T: for<'de> Deserialize<'de>>(
    column: &str,
    text: &str,
) -> Result<T, SqliteSpecStoreError> {
    serde_json::from_str(text).map_err(|err| {
        SqliteSpecStoreError::Integrity(format!("malformed {column} json: {err}"))
    })
}

/// Parses a stable snake_case label into a serde-tagged enum.
fn parse_label<T: for<'de> Deserialize<'de>>(
    column: &str,
    label: &str,
) -> Result<T, SqliteSpecStoreError> {
    serde_json::from_value(serde_json::Value::String(label.to_string())).map_err(|_| {
        SqliteSpecStoreError::Integrity(format!("unrecognized {column} label: {label}"))
    })
}

/// Converts a raw rowid into a typed row identifier.
fn row_id<T>(
    column: &str,
    raw: i64,
    construct: impl Fn(i64) -> Option<T>,
) -> Result<T, SqliteSpecStoreError> {
    construct(raw)
        .ok_or_else(|| SqliteSpecStoreError::Integrity(format!("zero {column} rowid")))
}

/// Collects a mapped-row iterator into a vector, mapping errors.
fn collect_rows<T>(
    rows: impl Iterator<Item = Result<T, rusqlite::Error>>,
) -> Result<Vec<T>, SqliteSpecStoreError> {
    rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Initializes or verifies the store schema.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteSpecStoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS items (
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    brand TEXT NOT NULL,
                    model TEXT NOT NULL,
                    variant TEXT,
                    lifecycle TEXT NOT NULL,
                    PRIMARY KEY (category, product_id)
                );
                CREATE TABLE IF NOT EXISTS candidates (
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    candidate_id TEXT NOT NULL,
                    value TEXT NOT NULL,
                    normalized_value TEXT NOT NULL,
                    score REAL NOT NULL,
                    rank INTEGER NOT NULL,
                    host TEXT NOT NULL,
                    root_domain TEXT NOT NULL,
                    method TEXT NOT NULL,
                    tier INTEGER NOT NULL,
                    snippet_id TEXT NOT NULL,
                    quote TEXT NOT NULL,
                    url TEXT NOT NULL,
                    retrieved_at INTEGER NOT NULL,
                    is_component_field INTEGER NOT NULL,
                    is_list_field INTEGER NOT NULL,
                    component_type TEXT,
                    PRIMARY KEY (category, product_id, field_key, candidate_id)
                );
                CREATE INDEX IF NOT EXISTS idx_candidates_product
                    ON candidates (category, product_id);
                CREATE TABLE IF NOT EXISTS item_field_state (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    value TEXT,
                    confidence REAL NOT NULL,
                    source TEXT NOT NULL,
                    overridden INTEGER NOT NULL,
                    needs_ai_review INTEGER NOT NULL,
                    ai_review_complete INTEGER NOT NULL,
                    accepted_candidate_id TEXT,
                    constraint_conflict INTEGER NOT NULL,
                    UNIQUE (category, product_id, field_key)
                );
                CREATE TABLE IF NOT EXISTS component_identity (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category TEXT NOT NULL,
                    component_type TEXT NOT NULL,
                    canonical_name TEXT NOT NULL,
                    maker TEXT NOT NULL,
                    aliases_json TEXT NOT NULL,
                    links_json TEXT NOT NULL,
                    source TEXT NOT NULL,
                    UNIQUE (category, component_type, canonical_name, maker)
                );
                CREATE TABLE IF NOT EXISTS component_value (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    component_identity_id INTEGER NOT NULL
                        REFERENCES component_identity(id) ON DELETE CASCADE,
                    property_key TEXT NOT NULL,
                    value TEXT,
                    confidence REAL NOT NULL,
                    variance_policy TEXT,
                    constraints_json TEXT NOT NULL,
                    accepted_candidate_id TEXT,
                    needs_review INTEGER NOT NULL,
                    overridden INTEGER NOT NULL,
                    UNIQUE (component_identity_id, property_key)
                );
                CREATE TABLE IF NOT EXISTS enum_list (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    UNIQUE (category, field_key)
                );
                CREATE TABLE IF NOT EXISTS list_value (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    enum_list_id INTEGER NOT NULL
                        REFERENCES enum_list(id) ON DELETE CASCADE,
                    value TEXT NOT NULL,
                    normalized_value TEXT NOT NULL,
                    source TEXT NOT NULL,
                    enum_policy TEXT NOT NULL,
                    accepted_candidate_id TEXT,
                    needs_review INTEGER NOT NULL,
                    overridden INTEGER NOT NULL,
                    source_timestamp INTEGER,
                    UNIQUE (enum_list_id, normalized_value)
                );
                CREATE TABLE IF NOT EXISTS item_component_link (
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    component_identity_id INTEGER NOT NULL
                        REFERENCES component_identity(id) ON DELETE CASCADE,
                    match_type TEXT NOT NULL,
                    score REAL NOT NULL,
                    PRIMARY KEY (category, product_id, field_key)
                );
                CREATE TABLE IF NOT EXISTS item_list_link (
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    list_value_id INTEGER NOT NULL
                        REFERENCES list_value(id) ON DELETE CASCADE,
                    match_type TEXT NOT NULL,
                    score REAL NOT NULL,
                    PRIMARY KEY (category, product_id, field_key, list_value_id)
                );
                CREATE TABLE IF NOT EXISTS key_review_state (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category TEXT NOT NULL,
                    target_kind TEXT NOT NULL,
                    slot_key TEXT NOT NULL,
                    item_field_state_id INTEGER,
                    component_identity_id INTEGER,
                    component_value_id INTEGER,
                    component_identifier TEXT,
                    property_key TEXT,
                    list_value_id INTEGER,
                    enum_list_id INTEGER,
                    enum_value_norm TEXT,
                    selected_value TEXT,
                    selected_candidate_id TEXT,
                    ai_confirm_primary_status TEXT NOT NULL,
                    ai_confirm_primary_confidence REAL,
                    ai_confirm_primary_at INTEGER,
                    user_accept_primary_status TEXT NOT NULL,
                    user_accept_primary_at INTEGER,
                    ai_confirm_shared_status TEXT NOT NULL,
                    ai_confirm_shared_confidence REAL,
                    ai_confirm_shared_at INTEGER,
                    user_accept_shared_status TEXT NOT NULL,
                    user_accept_shared_at INTEGER,
                    UNIQUE (category, target_kind, slot_key)
                );
                CREATE TABLE IF NOT EXISTS key_review_audit (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    category TEXT NOT NULL,
                    target_kind TEXT NOT NULL,
                    slot_key TEXT NOT NULL,
                    lane TEXT NOT NULL,
                    action TEXT NOT NULL,
                    candidate_id TEXT,
                    selected_value TEXT NOT NULL,
                    acted_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_key_review_audit_slot
                    ON key_review_audit (category, target_kind, slot_key);
                CREATE TABLE IF NOT EXISTS candidate_review (
                    category TEXT NOT NULL,
                    target_kind TEXT NOT NULL,
                    slot_key TEXT NOT NULL,
                    candidate_id TEXT NOT NULL,
                    decision TEXT NOT NULL,
                    value TEXT,
                    reviewed_at INTEGER NOT NULL,
                    PRIMARY KEY (category, target_kind, slot_key, candidate_id)
                );
                CREATE TABLE IF NOT EXISTS source_registry (
                    host TEXT PRIMARY KEY,
                    root_domain TEXT NOT NULL,
                    tier INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS source_assertion (
                    host TEXT NOT NULL,
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    candidate_id TEXT NOT NULL,
                    method TEXT NOT NULL,
                    asserted_at INTEGER NOT NULL,
                    PRIMARY KEY (host, category, product_id, field_key, candidate_id)
                );
                CREATE TABLE IF NOT EXISTS source_evidence_ref (
                    host TEXT NOT NULL,
                    category TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    field_key TEXT NOT NULL,
                    candidate_id TEXT NOT NULL,
                    snippet_id TEXT NOT NULL,
                    quote TEXT NOT NULL,
                    url TEXT NOT NULL,
                    retrieved_at INTEGER NOT NULL,
                    PRIMARY KEY (host, category, product_id, field_key, candidate_id, snippet_id)
                );",
            )
            .map_err(db_err)?;
        }
        Some(found) if found == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(SqliteSpecStoreError::Invalid(format!(
                "store schema version mismatch: found {found}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(db_err)
}

// ============================================================================
// SECTION: Transaction-Scoped Operations
// ============================================================================

/// Loads an item field state row by logical key inside a transaction.
fn load_item_field_state_tx(
    tx: &Transaction<'_>,
    category: &Category,
    product_id: &ProductId,
    field_key: &FieldKey,
) -> Result<Option<ItemFieldStateRow>, SqliteSpecStoreError> {
    let raw = tx
        .query_row(
            "SELECT id, category, product_id, field_key, value, confidence, source, overridden,
                 needs_ai_review, ai_review_complete, accepted_candidate_id, constraint_conflict
             FROM item_field_state
             WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
            params![category.as_str(), product_id.as_str(), field_key.as_str()],
            raw_item_field_state_from_sql,
        )
        .optional()
        .map_err(db_err)?;
    raw.map(RawItemFieldState::into_row).transpose()
}

/// Loads an enum list row by logical key inside a transaction.
fn load_enum_list_tx(
    tx: &Transaction<'_>,
    category: &Category,
    field_key: &FieldKey,
) -> Result<Option<EnumListRow>, SqliteSpecStoreError> {
    let raw = tx
        .query_row(
            "SELECT id, category, field_key FROM enum_list
             WHERE category = ?1 AND field_key = ?2",
            params![category.as_str(), field_key.as_str()],
            raw_enum_list_from_sql,
        )
        .optional()
        .map_err(db_err)?;
    raw.map(RawEnumList::into_row).transpose()
}

/// Upserts an enum member row inside a transaction and returns it.
fn upsert_list_value_tx(
    tx: &Transaction<'_>,
    seed: &ListValueSeed,
) -> Result<ListValueRow, SqliteSpecStoreError> {
    let normalized = normalize_value(&seed.value);
    tx.execute(
        "INSERT INTO list_value (enum_list_id, value, normalized_value, source, enum_policy,
             accepted_candidate_id, needs_review, overridden, source_timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(enum_list_id, normalized_value) DO UPDATE SET
             value = excluded.value,
             source = excluded.source,
             enum_policy = excluded.enum_policy,
             accepted_candidate_id = excluded.accepted_candidate_id,
             needs_review = excluded.needs_review,
             overridden = excluded.overridden,
             source_timestamp = excluded.source_timestamp",
        params![
            seed.enum_list_id.get(),
            seed.value,
            normalized,
            seed.source.as_str(),
            seed.enum_policy.as_str(),
            seed.accepted_candidate_id.as_ref().map(CandidateId::as_str),
            i64::from(seed.needs_review),
            i64::from(seed.overridden),
            seed.source_timestamp.map(Timestamp::as_unix_millis),
        ],
    )
    .map_err(db_err)?;
    let raw = tx
        .query_row(
            "SELECT id, enum_list_id, value, normalized_value, source, enum_policy,
                 accepted_candidate_id, needs_review, overridden, source_timestamp
             FROM list_value
             WHERE enum_list_id = ?1 AND normalized_value = ?2",
            params![seed.enum_list_id.get(), normalized],
            raw_list_value_from_sql,
        )
        .map_err(db_err)?;
    raw.into_row()
}

/// Resolves a slot locator into a slot reference inside a transaction.
fn resolve_locator_tx(
    tx: &Transaction<'_>,
    category: &Category,
    locator: &SlotLocator,
) -> Result<SlotRef, SqliteSpecStoreError> {
    match locator {
        SlotLocator::Resolved {
            slot,
        } => Ok(slot.clone()),
        SlotLocator::Grid {
            product_id,
            field_key,
        } => {
            let row = load_item_field_state_tx(tx, category, product_id, field_key)?.ok_or_else(
                || {
                    SqliteSpecStoreError::Integrity(format!(
                        "grid slot missing item field state: {product_id}.{field_key}"
                    ))
                },
            )?;
            Ok(SlotRef::GridKey {
                item_field_state_id: row.id,
            })
        }
        SlotLocator::Component {
            component_type,
            canonical_name,
            maker,
            property_key,
        } => {
            let identity_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM component_identity
                     WHERE category = ?1 AND component_type = ?2 AND canonical_name = ?3
                       AND maker = ?4",
                    params![category.as_str(), component_type.as_str(), canonical_name, maker],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            let identity_id = identity_id.ok_or_else(|| {
                SqliteSpecStoreError::Integrity(format!(
                    "component slot missing identity: {canonical_name} ({maker})"
                ))
            })?;
            let value_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM component_value
                     WHERE component_identity_id = ?1 AND property_key = ?2",
                    params![identity_id, property_key.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            let value_id = value_id.ok_or_else(|| {
                SqliteSpecStoreError::Integrity(format!(
                    "component slot missing property value: {canonical_name}.{property_key}"
                ))
            })?;
            Ok(SlotRef::ComponentKey {
                component_identity_id: row_id(
                    "component_identity",
                    identity_id,
                    ComponentIdentityId::from_raw,
                )?,
                component_value_id: row_id(
                    "component_value",
                    value_id,
                    ComponentValueId::from_raw,
                )?,
                component_identifier: format!("{canonical_name} ({maker})"),
                property_key: property_key.clone(),
            })
        }
        SlotLocator::Enum {
            field_key,
            value,
        } => {
            let list = load_enum_list_tx(tx, category, field_key)?.ok_or_else(|| {
                SqliteSpecStoreError::Integrity(format!("enum slot missing list: {field_key}"))
            })?;
            let normalized = normalize_value(value);
            let value_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM list_value
                     WHERE enum_list_id = ?1 AND normalized_value = ?2",
                    params![list.id.get(), normalized],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            let value_id = value_id.ok_or_else(|| {
                SqliteSpecStoreError::Integrity(format!(
                    "enum slot missing member: {field_key}={value}"
                ))
            })?;
            Ok(SlotRef::EnumKey {
                list_value_id: row_id("list_value", value_id, ListValueId::from_raw)?,
                enum_list_id: list.id,
                enum_value_norm: normalized,
            })
        }
    }
}

/// Loads a review row for a slot inside a transaction.
fn load_review_row_tx(
    tx: &Transaction<'_>,
    category: &Category,
    slot: &SlotRef,
) -> Result<Option<KeyReviewStateRow>, SqliteSpecStoreError> {
    let raw = tx
        .query_row(
            &format!(
                "SELECT {REVIEW_COLUMNS} FROM key_review_state
                 WHERE category = ?1 AND target_kind = ?2 AND slot_key = ?3"
            ),
            params![category.as_str(), slot.target_kind().as_str(), slot.slot_key()],
            raw_review_row_from_sql,
        )
        .optional()
        .map_err(db_err)?;
    raw.map(RawReviewRow::into_row).transpose()
}

/// Inserts a baseline review row for a slot when absent and returns the row.
fn seed_review_row_tx(
    tx: &Transaction<'_>,
    category: &Category,
    slot: &SlotRef,
    selected_value: Option<&str>,
    selected_candidate_id: Option<&CandidateId>,
) -> Result<KeyReviewStateRow, SqliteSpecStoreError> {
    let (ifs_id, ci_id, cv_id, component_identifier, property_key, lv_id, el_id, enum_norm) =
        slot_columns(slot);
    tx.execute(
        "INSERT INTO key_review_state (category, target_kind, slot_key, item_field_state_id,
             component_identity_id, component_value_id, component_identifier, property_key,
             list_value_id, enum_list_id, enum_value_norm, selected_value,
             selected_candidate_id, ai_confirm_primary_status, user_accept_primary_status,
             ai_confirm_shared_status, user_accept_shared_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
             'pending', 'pending', 'pending', 'pending')
         ON CONFLICT(category, target_kind, slot_key) DO NOTHING",
        params![
            category.as_str(),
            slot.target_kind().as_str(),
            slot.slot_key(),
            ifs_id,
            ci_id,
            cv_id,
            component_identifier,
            property_key,
            lv_id,
            el_id,
            enum_norm,
            selected_value,
            selected_candidate_id.map(CandidateId::as_str),
        ],
    )
    .map_err(db_err)?;
    load_review_row_tx(tx, category, slot)?.ok_or_else(|| {
        SqliteSpecStoreError::Integrity("review row vanished after seed".to_string())
    })
}

/// Returns the nullable slot-id column tuple for a slot reference.
#[allow(clippy::type_complexity, reason = "column tuple mirrors the schema")]
fn slot_columns(
    slot: &SlotRef,
) -> (
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<String>,
) {
    match slot {
        SlotRef::GridKey {
            item_field_state_id,
        } => (Some(item_field_state_id.get()), None, None, None, None, None, None, None),
        SlotRef::ComponentKey {
            component_identity_id,
            component_value_id,
            component_identifier,
            property_key,
        } => (
            None,
            Some(component_identity_id.get()),
            Some(component_value_id.get()),
            Some(component_identifier.clone()),
            Some(property_key.as_str().to_string()),
            None,
            None,
            None,
        ),
        SlotRef::EnumKey {
            list_value_id,
            enum_list_id,
            enum_value_norm,
        } => (
            None,
            None,
            None,
            None,
            None,
            Some(list_value_id.get()),
            Some(enum_list_id.get()),
            Some(enum_value_norm.clone()),
        ),
    }
}

/// Persists the lane and selection fields of a review row.
fn persist_review_row_tx(
    tx: &Transaction<'_>,
    row: &KeyReviewStateRow,
) -> Result<(), SqliteSpecStoreError> {
    let updated = tx
        .execute(
            "UPDATE key_review_state SET
                 selected_value = ?1,
                 selected_candidate_id = ?2,
                 ai_confirm_primary_status = ?3,
                 ai_confirm_primary_confidence = ?4,
                 ai_confirm_primary_at = ?5,
                 user_accept_primary_status = ?6,
                 user_accept_primary_at = ?7,
                 ai_confirm_shared_status = ?8,
                 ai_confirm_shared_confidence = ?9,
                 ai_confirm_shared_at = ?10,
                 user_accept_shared_status = ?11,
                 user_accept_shared_at = ?12
             WHERE id = ?13",
            params![
                row.selected_value,
                row.selected_candidate_id.as_ref().map(CandidateId::as_str),
                row.primary.ai_confirm_status.as_str(),
                row.primary.ai_confirm_confidence,
                row.primary.ai_confirm_at.map(Timestamp::as_unix_millis),
                row.primary.user_accept_status.as_str(),
                row.primary.user_accept_at.map(Timestamp::as_unix_millis),
                row.shared.ai_confirm_status.as_str(),
                row.shared.ai_confirm_confidence,
                row.shared.ai_confirm_at.map(Timestamp::as_unix_millis),
                row.shared.user_accept_status.as_str(),
                row.shared.user_accept_at.map(Timestamp::as_unix_millis),
                row.id.get(),
            ],
        )
        .map_err(db_err)?;
    if updated != 1 {
        return Err(SqliteSpecStoreError::Integrity(format!(
            "review row update touched {updated} rows"
        )));
    }
    Ok(())
}

/// Appends an audit record inside a transaction.
fn insert_audit_tx(
    tx: &Transaction<'_>,
    record: &KeyReviewAuditRecord,
) -> Result<(), SqliteSpecStoreError> {
    tx.execute(
        "INSERT INTO key_review_audit (category, target_kind, slot_key, lane, action,
             candidate_id, selected_value, acted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.category.as_str(),
            record.target_kind.as_str(),
            record.slot_key,
            record.lane.as_str(),
            record.action.as_str(),
            record.candidate_id.as_ref().map(CandidateId::as_str),
            record.selected_value,
            record.at.as_unix_millis(),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Upserts an accepted candidate review for a confirm inside a transaction.
fn upsert_candidate_review_tx(
    tx: &Transaction<'_>,
    category: &Category,
    slot: &SlotRef,
    candidate_id: Option<&CandidateId>,
    value: &str,
    at: Timestamp,
) -> Result<(), SqliteSpecStoreError> {
    let Some(candidate_id) = candidate_id else {
        return Ok(());
    };
    tx.execute(
        "INSERT INTO candidate_review (category, target_kind, slot_key, candidate_id, decision,
             value, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, 'accepted', ?5, ?6)
         ON CONFLICT(category, target_kind, slot_key, candidate_id) DO UPDATE SET
             decision = excluded.decision,
             value = excluded.value,
             reviewed_at = excluded.reviewed_at",
        params![
            category.as_str(),
            slot.target_kind().as_str(),
            slot.slot_key(),
            candidate_id.as_str(),
            value,
            at.as_unix_millis(),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Rewrites an enum member and its item links to a new value inside a
/// transaction, returning the target slot that receives the lane action.
fn rename_enum_value_tx(
    tx: &Transaction<'_>,
    category: &Category,
    old_slot: &SlotRef,
    new_value: &str,
    action: &LaneAction,
) -> Result<SlotRef, SqliteSpecStoreError> {
    let SlotRef::EnumKey {
        list_value_id: old_value_id,
        enum_list_id,
        ..
    } = old_slot
    else {
        return Err(SqliteSpecStoreError::Rejected(ReviewErrorKind::LaneContextMismatch));
    };

    let old_row = tx
        .query_row(
            "SELECT id, enum_list_id, value, normalized_value, source, enum_policy,
                 accepted_candidate_id, needs_review, overridden, source_timestamp
             FROM list_value WHERE id = ?1",
            params![old_value_id.get()],
            raw_list_value_from_sql,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| {
            SqliteSpecStoreError::NotFound(format!("no enum member for id {old_value_id}"))
        })?
        .into_row()?;
    let field_key: String = tx
        .query_row(
            "SELECT field_key FROM enum_list WHERE id = ?1",
            params![enum_list_id.get()],
            |row| row.get(0),
        )
        .map_err(db_err)?;

    tx.execute(
        "UPDATE item_field_state SET value = ?1, source = 'user'
         WHERE category = ?2 AND field_key = ?3 AND value = ?4",
        params![new_value, category.as_str(), field_key, old_row.value],
    )
    .map_err(db_err)?;

    let new_row = upsert_list_value_tx(
        tx,
        &ListValueSeed {
            enum_list_id: *enum_list_id,
            value: new_value.to_string(),
            source: ValueSource::User,
            enum_policy: old_row.enum_policy,
            accepted_candidate_id: action.candidate_id.clone(),
            needs_review: true,
            overridden: true,
            source_timestamp: Some(action.at),
        },
    )?;

    tx.execute(
        "INSERT OR IGNORE INTO item_list_link (category, product_id, field_key, list_value_id,
             match_type, score)
         SELECT category, product_id, field_key, ?1, match_type, score
         FROM item_list_link WHERE list_value_id = ?2",
        params![new_row.id.get(), old_value_id.get()],
    )
    .map_err(db_err)?;
    tx.execute("DELETE FROM item_list_link WHERE list_value_id = ?1", params![old_value_id.get()])
        .map_err(db_err)?;
    tx.execute("DELETE FROM list_value WHERE id = ?1", params![old_value_id.get()])
        .map_err(db_err)?;

    let new_slot = SlotRef::EnumKey {
        list_value_id: new_row.id,
        enum_list_id: *enum_list_id,
        enum_value_norm: new_row.normalized_value.clone(),
    };
    seed_review_row_tx(tx, category, &new_slot, Some(new_row.value.as_str()), None)?;
    Ok(new_slot)
}

/// Records an accepted grid selection onto the item field state row.
fn record_grid_selection_tx(
    tx: &Transaction<'_>,
    slot: &SlotRef,
    action: &LaneAction,
) -> Result<(), SqliteSpecStoreError> {
    let SlotRef::GridKey {
        item_field_state_id,
    } = slot
    else {
        return Err(SqliteSpecStoreError::Rejected(ReviewErrorKind::LaneContextMismatch));
    };
    tx.execute(
        "UPDATE item_field_state
         SET value = ?1, accepted_candidate_id = ?2, source = 'user'
         WHERE id = ?3",
        params![
            action.selected_value,
            action.candidate_id.as_ref().map(CandidateId::as_str),
            item_field_state_id.get(),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Cascades an authoritative component property value to every linked item
/// and re-evaluates cross-validation constraints, inside a transaction.
fn cascade_component_tx(
    tx: &Transaction<'_>,
    category: &Category,
    slot: &SlotRef,
    action: &LaneAction,
    cross_rules: &[CrossValidationRule],
) -> Result<(), SqliteSpecStoreError> {
    let SlotRef::ComponentKey {
        component_identity_id,
        component_value_id,
        property_key,
        ..
    } = slot
    else {
        return Err(SqliteSpecStoreError::Rejected(ReviewErrorKind::LaneContextMismatch));
    };

    tx.execute(
        "UPDATE component_value SET value = ?1, accepted_candidate_id = ?2 WHERE id = ?3",
        params![
            action.selected_value,
            action.candidate_id.as_ref().map(CandidateId::as_str),
            component_value_id.get(),
        ],
    )
    .map_err(db_err)?;

    let mut stmt = tx
        .prepare(
            "SELECT product_id FROM item_component_link
             WHERE component_identity_id = ?1 ORDER BY product_id",
        )
        .map_err(db_err)?;
    let product_ids: Vec<String> = collect_rows(
        stmt.query_map(params![component_identity_id.get()], |row| row.get(0))
            .map_err(db_err)?,
    )?;

    let property_field = property_key.as_str();
    for product_id in &product_ids {
        tx.execute(
            "UPDATE item_field_state
             SET value = ?1, source = 'component_db', needs_ai_review = 1,
                 ai_review_complete = 0
             WHERE category = ?2 AND product_id = ?3 AND field_key = ?4",
            params![action.selected_value, category.as_str(), product_id, property_field],
        )
        .map_err(db_err)?;

        let mut conflict = false;
        for rule in cross_rules {
            if rule.left.as_str() != property_field && rule.right.as_str() != property_field {
                continue;
            }
            let left = load_field_value_tx(tx, category, product_id, rule.left.as_str())?;
            let right = load_field_value_tx(tx, category, product_id, rule.right.as_str())?;
            if rule.evaluate(left.as_deref(), right.as_deref()) == Some(false) {
                conflict = true;
            }
        }
        tx.execute(
            "UPDATE item_field_state SET constraint_conflict = ?1
             WHERE category = ?2 AND product_id = ?3 AND field_key = ?4",
            params![i64::from(conflict), category.as_str(), product_id, property_field],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

/// Loads one raw field value for cross-validation inside a transaction.
fn load_field_value_tx(
    tx: &Transaction<'_>,
    category: &Category,
    product_id: &str,
    field_key: &str,
) -> Result<Option<String>, SqliteSpecStoreError> {
    tx.query_row(
        "SELECT value FROM item_field_state
         WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
        params![category.as_str(), product_id, field_key],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
    .map(Option::flatten)
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps an item row directly from SQL.
fn item_from_sql(row: &rusqlite::Row<'_>) -> Result<ItemRecord, rusqlite::Error> {
    let category: String = row.get(0)?;
    let product_id: String = row.get(1)?;
    let brand: String = row.get(2)?;
    let model: String = row.get(3)?;
    let variant: Option<String> = row.get(4)?;
    let lifecycle: String = row.get(5)?;
    let lifecycle = match lifecycle.as_str() {
        "draft" => ItemLifecycle::Draft,
        "retired" => ItemLifecycle::Retired,
        _ => ItemLifecycle::Active,
    };
    Ok(ItemRecord {
        category: Category::new(category),
        product_id: ProductId::new(product_id),
        identity: ItemIdentity {
            brand,
            model,
            variant,
        },
        lifecycle,
    })
}

/// Raw candidate columns before typed conversion.
struct RawCandidate {
    /// Stored candidate id.
    candidate_id: String,
    /// Stored raw value.
    value: String,
    /// Stored normalized value.
    normalized_value: String,
    /// Stored score.
    score: f64,
    /// Stored rank.
    rank: i64,
    /// Stored host.
    host: String,
    /// Stored root domain.
    root_domain: String,
    /// Stored method.
    method: String,
    /// Stored tier.
    tier: i64,
    /// Stored snippet id.
    snippet_id: String,
    /// Stored quote.
    quote: String,
    /// Stored url.
    url: String,
    /// Stored retrieval timestamp.
    retrieved_at: i64,
    /// Stored component-field flag.
    is_component_field: i64,
    /// Stored list-field flag.
    is_list_field: i64,
    /// Stored component type.
    component_type: Option<String>,
}

impl RawCandidate {
    /// Converts raw columns into a typed candidate.
    fn into_candidate(self) -> Result<Candidate, SqliteSpecStoreError> {
        Ok(Candidate {
            candidate_id: CandidateId::new(self.candidate_id),
            value: self.value,
            normalized_value: self.normalized_value,
            score: self.score,
            rank: u32::try_from(self.rank).map_err(|_| {
                SqliteSpecStoreError::Integrity("candidate rank out of range".to_string())
            })?,
            source: SourceRef {
                host: self.host,
                root_domain: self.root_domain,
                method: self.method,
                tier: u8::try_from(self.tier).map_err(|_| {
                    SqliteSpecStoreError::Integrity("candidate tier out of range".to_string())
                })?,
            },
            evidence: Evidence {
                snippet_id: self.snippet_id,
                quote: self.quote,
                url: self.url,
                retrieved_at: Timestamp::from_unix_millis(self.retrieved_at),
            },
            is_component_field: self.is_component_field != 0,
            is_list_field: self.is_list_field != 0,
            component_type: self.component_type.map(ComponentType::new),
        })
    }
}

/// Maps candidate columns starting at column zero.
fn raw_candidate_from_sql(row: &rusqlite::Row<'_>) -> Result<RawCandidate, rusqlite::Error> {
    raw_candidate_from_sql_offset(row, 0)
}

/// Maps candidate columns starting at an offset.
fn raw_candidate_from_sql_offset(
    row: &rusqlite::Row<'_>,
    offset: usize,
) -> Result<RawCandidate, rusqlite::Error> {
    Ok(RawCandidate {
        candidate_id: row.get(offset)?,
        value: row.get(offset + 1)?,
        normalized_value: row.get(offset + 2)?,
        score: row.get(offset + 3)?,
        rank: row.get(offset + 4)?,
        host: row.get(offset + 5)?,
        root_domain: row.get(offset + 6)?,
        method: row.get(offset + 7)?,
        tier: row.get(offset + 8)?,
        snippet_id: row.get(offset + 9)?,
        quote: row.get(offset + 10)?,
        url: row.get(offset + 11)?,
        retrieved_at: row.get(offset + 12)?,
        is_component_field: row.get(offset + 13)?,
        is_list_field: row.get(offset + 14)?,
        component_type: row.get(offset + 15)?,
    })
}

/// Raw item field state columns before typed conversion.
struct RawItemFieldState {
    /// Stored rowid.
    id: i64,
    /// Stored category.
    category: String,
    /// Stored product id.
    product_id: String,
    /// Stored field key.
    field_key: String,
    /// Stored value.
    value: Option<String>,
    /// Stored confidence.
    confidence: f64,
    /// Stored source label.
    source: String,
    /// Stored overridden flag.
    overridden: i64,
    /// Stored needs-AI-review flag.
    needs_ai_review: i64,
    /// Stored AI-review-complete flag.
    ai_review_complete: i64,
    /// Stored accepted candidate id.
    accepted_candidate_id: Option<String>,
    /// Stored constraint-conflict flag.
    constraint_conflict: i64,
}

impl RawItemFieldState {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<ItemFieldStateRow, SqliteSpecStoreError> {
        Ok(ItemFieldStateRow {
            id: row_id("item_field_state", self.id, ItemFieldStateId::from_raw)?,
            category: Category::new(self.category),
            product_id: ProductId::new(self.product_id),
            field_key: FieldKey::new(self.field_key),
            value: self.value,
            confidence: self.confidence,
            source: parse_label("source", &self.source)?,
            overridden: self.overridden != 0,
            needs_ai_review: self.needs_ai_review != 0,
            ai_review_complete: self.ai_review_complete != 0,
            accepted_candidate_id: self.accepted_candidate_id.map(CandidateId::new),
            constraint_conflict: self.constraint_conflict != 0,
        })
    }
}

/// Maps item field state columns from SQL.
fn raw_item_field_state_from_sql(
    row: &rusqlite::Row<'_>,
) -> Result<RawItemFieldState, rusqlite::Error> {
    Ok(RawItemFieldState {
        id: row.get(0)?,
        category: row.get(1)?,
        product_id: row.get(2)?,
        field_key: row.get(3)?,
        value: row.get(4)?,
        confidence: row.get(5)?,
        source: row.get(6)?,
        overridden: row.get(7)?,
        needs_ai_review: row.get(8)?,
        ai_review_complete: row.get(9)?,
        accepted_candidate_id: row.get(10)?,
        constraint_conflict: row.get(11)?,
    })
}

/// Raw component identity columns before typed conversion.
struct RawComponentIdentity {
    /// Stored rowid.
    id: i64,
    /// Stored category.
    category: String,
    /// Stored component type.
    component_type: String,
    /// Stored canonical name.
    canonical_name: String,
    /// Stored maker.
    maker: String,
    /// Stored aliases JSON.
    aliases_json: String,
    /// Stored links JSON.
    links_json: String,
    /// Stored source label.
    source: String,
}

impl RawComponentIdentity {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<ComponentIdentityRow, SqliteSpecStoreError> {
        Ok(ComponentIdentityRow {
            id: row_id("component_identity", self.id, ComponentIdentityId::from_raw)?,
            category: Category::new(self.category),
            component_type: ComponentType::new(self.component_type),
            canonical_name: self.canonical_name,
            maker: self.maker,
            aliases: from_json_text("aliases", &self.aliases_json)?,
            links: from_json_text("links", &self.links_json)?,
            source: parse_label("source", &self.source)?,
        })
    }
}

/// Maps component identity columns from SQL.
fn raw_component_identity_from_sql(
    row: &rusqlite::Row<'_>,
) -> Result<RawComponentIdentity, rusqlite::Error> {
    Ok(RawComponentIdentity {
        id: row.get(0)?,
        category: row.get(1)?,
        component_type: row.get(2)?,
        canonical_name: row.get(3)?,
        maker: row.get(4)?,
        aliases_json: row.get(5)?,
        links_json: row.get(6)?,
        source: row.get(7)?,
    })
}

/// Raw component value columns before typed conversion.
struct RawComponentValue {
    /// Stored rowid.
    id: i64,
    /// Stored owning identity rowid.
    component_identity_id: i64,
    /// Stored property key.
    property_key: String,
    /// Stored value.
    value: Option<String>,
    /// Stored confidence.
    confidence: f64,
    /// Stored variance policy label.
    variance_policy: Option<String>,
    /// Stored constraints JSON.
    constraints_json: String,
    /// Stored accepted candidate id.
    accepted_candidate_id: Option<String>,
    /// Stored needs-review flag.
    needs_review: i64,
    /// Stored overridden flag.
    overridden: i64,
}

impl RawComponentValue {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<ComponentValueRow, SqliteSpecStoreError> {
        Ok(ComponentValueRow {
            id: row_id("component_value", self.id, ComponentValueId::from_raw)?,
            component_identity_id: row_id(
                "component_identity",
                self.component_identity_id,
                ComponentIdentityId::from_raw,
            )?,
            property_key: PropertyKey::new(self.property_key),
            value: self.value,
            confidence: self.confidence,
            variance_policy: self
                .variance_policy
                .as_deref()
                .map(|label| parse_label("variance_policy", label))
                .transpose()?,
            constraints: from_json_text("constraints", &self.constraints_json)?,
            accepted_candidate_id: self.accepted_candidate_id.map(CandidateId::new),
            needs_review: self.needs_review != 0,
            overridden: self.overridden != 0,
        })
    }
}

/// Maps component value columns from SQL.
fn raw_component_value_from_sql(
    row: &rusqlite::Row<'_>,
) -> Result<RawComponentValue, rusqlite::Error> {
    Ok(RawComponentValue {
        id: row.get(0)?,
        component_identity_id: row.get(1)?,
        property_key: row.get(2)?,
        value: row.get(3)?,
        confidence: row.get(4)?,
        variance_policy: row.get(5)?,
        constraints_json: row.get(6)?,
        accepted_candidate_id: row.get(7)?,
        needs_review: row.get(8)?,
        overridden: row.get(9)?,
    })
}

/// Raw enum list columns before typed conversion.
struct RawEnumList {
    /// Stored rowid.
    id: i64,
    /// Stored category.
    category: String,
    /// Stored field key.
    field_key: String,
}

impl RawEnumList {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<EnumListRow, SqliteSpecStoreError> {
        Ok(EnumListRow {
            id: row_id("enum_list", self.id, EnumListId::from_raw)?,
            category: Category::new(self.category),
            field_key: FieldKey::new(self.field_key),
        })
    }
}

/// Maps enum list columns from SQL.
fn raw_enum_list_from_sql(row: &rusqlite::Row<'_>) -> Result<RawEnumList, rusqlite::Error> {
    Ok(RawEnumList {
        id: row.get(0)?,
        category: row.get(1)?,
        field_key: row.get(2)?,
    })
}

/// Raw list value columns before typed conversion.
struct RawListValue {
    /// Stored rowid.
    id: i64,
    /// Stored owning list rowid.
    enum_list_id: i64,
    /// Stored raw value.
    value: String,
    /// Stored normalized value.
    normalized_value: String,
    /// Stored source label.
    source: String,
    /// Stored enum policy label.
    enum_policy: String,
    /// Stored accepted candidate id.
    accepted_candidate_id: Option<String>,
    /// Stored needs-review flag.
    needs_review: i64,
    /// Stored overridden flag.
    overridden: i64,
    /// Stored source timestamp.
    source_timestamp: Option<i64>,
}

impl RawListValue {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<ListValueRow, SqliteSpecStoreError> {
        Ok(ListValueRow {
            id: row_id("list_value", self.id, ListValueId::from_raw)?,
            enum_list_id: row_id("enum_list", self.enum_list_id, EnumListId::from_raw)?,
            value: self.value,
            normalized_value: self.normalized_value,
            source: parse_label("source", &self.source)?,
            enum_policy: parse_label("enum_policy", &self.enum_policy)?,
            accepted_candidate_id: self.accepted_candidate_id.map(CandidateId::new),
            needs_review: self.needs_review != 0,
            overridden: self.overridden != 0,
            source_timestamp: self.source_timestamp.map(Timestamp::from_unix_millis),
        })
    }
}

/// Maps list value columns from SQL.
fn raw_list_value_from_sql(row: &rusqlite::Row<'_>) -> Result<RawListValue, rusqlite::Error> {
    Ok(RawListValue {
        id: row.get(0)?,
        enum_list_id: row.get(1)?,
        value: row.get(2)?,
        normalized_value: row.get(3)?,
        source: row.get(4)?,
        enum_policy: row.get(5)?,
        accepted_candidate_id: row.get(6)?,
        needs_review: row.get(7)?,
        overridden: row.get(8)?,
        source_timestamp: row.get(9)?,
    })
}

/// Raw component link columns before typed conversion.
struct RawComponentLink {
    /// Stored category.
    category: String,
    /// Stored product id.
    product_id: String,
    /// Stored field key.
    field_key: String,
    /// Stored component identity rowid.
    component_identity_id: i64,
    /// Stored match type label.
    match_type: String,
    /// Stored match score.
    score: f64,
}

impl RawComponentLink {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<ItemComponentLinkRow, SqliteSpecStoreError> {
        Ok(ItemComponentLinkRow {
            category: Category::new(self.category),
            product_id: ProductId::new(self.product_id),
            field_key: FieldKey::new(self.field_key),
            component_identity_id: row_id(
                "component_identity",
                self.component_identity_id,
                ComponentIdentityId::from_raw,
            )?,
            match_type: parse_label::<MatchType>("match_type", &self.match_type)?,
            score: self.score,
        })
    }
}

/// Maps component link columns from SQL.
fn raw_component_link_from_sql(
    row: &rusqlite::Row<'_>,
) -> Result<RawComponentLink, rusqlite::Error> {
    Ok(RawComponentLink {
        category: row.get(0)?,
        product_id: row.get(1)?,
        field_key: row.get(2)?,
        component_identity_id: row.get(3)?,
        match_type: row.get(4)?,
        score: row.get(5)?,
    })
}

/// Raw list link columns before typed conversion.
struct RawListLink {
    /// Stored category.
    category: String,
    /// Stored product id.
    product_id: String,
    /// Stored field key.
    field_key: String,
    /// Stored list value rowid.
    list_value_id: i64,
    /// Stored match type label.
    match_type: String,
    /// Stored match score.
    score: f64,
}

impl RawListLink {
    /// Converts raw columns into a typed row.
    fn into_row(self) -> Result<ItemListLinkRow, SqliteSpecStoreError> {
        Ok(ItemListLinkRow {
            category: Category::new(self.category),
            product_id: ProductId::new(self.product_id),
            field_key: FieldKey::new(self.field_key),
            list_value_id: row_id("list_value", self.list_value_id, ListValueId::from_raw)?,
            match_type: parse_label::<MatchType>("match_type", &self.match_type)?,
            score: self.score,
        })
    }
}

/// Maps list link columns from SQL.
fn raw_list_link_from_sql(row: &rusqlite::Row<'_>) -> Result<RawListLink, rusqlite::Error> {
    Ok(RawListLink {
        category: row.get(0)?,
        product_id: row.get(1)?,
        field_key: row.get(2)?,
        list_value_id: row.get(3)?,
        match_type: row.get(4)?,
        score: row.get(5)?,
    })
}

/// Raw review row columns before typed conversion.
struct RawReviewRow {
    /// Stored rowid.
    id: i64,
    /// Stored category.
    category: String,
    /// Stored target kind label.
    target_kind: String,
    /// Stored item field state rowid.
    item_field_state_id: Option<i64>,
    /// Stored component identity rowid.
    component_identity_id: Option<i64>,
    /// Stored component value rowid.
    component_value_id: Option<i64>,
    /// Stored component identifier.
    component_identifier: Option<String>,
    /// Stored property key.
    property_key: Option<String>,
    /// Stored list value rowid.
    list_value_id: Option<i64>,
    /// Stored enum list rowid.
    enum_list_id: Option<i64>,
    /// Stored normalized enum value.
    enum_value_norm: Option<String>,
    /// Stored selection value.
    selected_value: Option<String>,
    /// Stored selection candidate id.
    selected_candidate_id: Option<String>,
    /// Stored primary AI-confirm status label.
    ai_confirm_primary_status: String,
    /// Stored primary AI-confirm confidence.
    ai_confirm_primary_confidence: Option<f64>,
    /// Stored primary AI-confirm timestamp.
    ai_confirm_primary_at: Option<i64>,
    /// Stored primary user-accept status label.
    user_accept_primary_status: String,
    /// Stored primary user-accept timestamp.
    user_accept_primary_at: Option<i64>,
    /// Stored shared AI-confirm status label.
    ai_confirm_shared_status: String,
    /// Stored shared AI-confirm confidence.
    ai_confirm_shared_confidence: Option<f64>,
    /// Stored shared AI-confirm timestamp.
    ai_confirm_shared_at: Option<i64>,
    /// Stored shared user-accept status label.
    user_accept_shared_status: String,
    /// Stored shared user-accept timestamp.
    user_accept_shared_at: Option<i64>,
}

impl RawReviewRow {
    /// Converts raw columns into a typed review row.
    fn into_row(self) -> Result<KeyReviewStateRow, SqliteSpecStoreError> {
        let slot = match self.target_kind.as_str() {
            "grid_key" => SlotRef::GridKey {
                item_field_state_id: row_id(
                    "item_field_state",
                    self.item_field_state_id.ok_or_else(missing_slot_id)?,
                    ItemFieldStateId::from_raw,
                )?,
            },
            "component_key" => SlotRef::ComponentKey {
                component_identity_id: row_id(
                    "component_identity",
                    self.component_identity_id.ok_or_else(missing_slot_id)?,
                    ComponentIdentityId::from_raw,
                )?,
                component_value_id: row_id(
                    "component_value",
                    self.component_value_id.ok_or_else(missing_slot_id)?,
                    ComponentValueId::from_raw,
                )?,
                component_identifier: self.component_identifier.ok_or_else(missing_slot_id)?,
                property_key: PropertyKey::new(self.property_key.ok_or_else(missing_slot_id)?),
            },
            "enum_key" => SlotRef::EnumKey {
                list_value_id: row_id(
                    "list_value",
                    self.list_value_id.ok_or_else(missing_slot_id)?,
                    ListValueId::from_raw,
                )?,
                enum_list_id: row_id(
                    "enum_list",
                    self.enum_list_id.ok_or_else(missing_slot_id)?,
                    EnumListId::from_raw,
                )?,
                enum_value_norm: self.enum_value_norm.ok_or_else(missing_slot_id)?,
            },
            other => {
                return Err(SqliteSpecStoreError::Integrity(format!(
                    "unrecognized target_kind label: {other}"
                )));
            }
        };
        Ok(KeyReviewStateRow {
            id: row_id("key_review_state", self.id, KeyReviewStateId::from_raw)?,
            category: Category::new(self.category),
            slot,
            selected_value: self.selected_value,
            selected_candidate_id: self.selected_candidate_id.map(CandidateId::new),
            primary: LaneSlot {
                ai_confirm_status: parse_label(
                    "ai_confirm_primary_status",
                    &self.ai_confirm_primary_status,
                )?,
                ai_confirm_confidence: self.ai_confirm_primary_confidence,
                ai_confirm_at: self.ai_confirm_primary_at.map(Timestamp::from_unix_millis),
                user_accept_status: parse_label(
                    "user_accept_primary_status",
                    &self.user_accept_primary_status,
                )?,
                user_accept_at: self.user_accept_primary_at.map(Timestamp::from_unix_millis),
            },
            shared: LaneSlot {
                ai_confirm_status: parse_label(
                    "ai_confirm_shared_status",
                    &self.ai_confirm_shared_status,
                )?,
                ai_confirm_confidence: self.ai_confirm_shared_confidence,
                ai_confirm_at: self.ai_confirm_shared_at.map(Timestamp::from_unix_millis),
                user_accept_status: parse_label(
                    "user_accept_shared_status",
                    &self.user_accept_shared_status,
                )?,
                user_accept_at: self.user_accept_shared_at.map(Timestamp::from_unix_millis),
            },
        })
    }
}

/// Returns the integrity error for a slot-id column missing for its kind.
fn missing_slot_id() -> SqliteSpecStoreError {
    SqliteSpecStoreError::Integrity("review row missing slot id for its target kind".to_string())
}

/// Maps review row columns from SQL.
fn raw_review_row_from_sql(row: &rusqlite::Row<'_>) -> Result<RawReviewRow, rusqlite::Error> {
    Ok(RawReviewRow {
        id: row.get(0)?,
        category: row.get(1)?,
        target_kind: row.get(2)?,
        item_field_state_id: row.get(4)?,
        component_identity_id: row.get(5)?,
        component_value_id: row.get(6)?,
        component_identifier: row.get(7)?,
        property_key: row.get(8)?,
        list_value_id: row.get(9)?,
        enum_list_id: row.get(10)?,
        enum_value_norm: row.get(11)?,
        selected_value: row.get(12)?,
        selected_candidate_id: row.get(13)?,
        ai_confirm_primary_status: row.get(14)?,
        ai_confirm_primary_confidence: row.get(15)?,
        ai_confirm_primary_at: row.get(16)?,
        user_accept_primary_status: row.get(17)?,
        user_accept_primary_at: row.get(18)?,
        ai_confirm_shared_status: row.get(19)?,
        ai_confirm_shared_confidence: row.get(20)?,
        ai_confirm_shared_at: row.get(21)?,
        user_accept_shared_status: row.get(22)?,
        user_accept_shared_at: row.get(23)?,
    })
}

/// Raw audit columns before typed conversion.
struct RawAudit {
    /// Stored category.
    category: String,
    /// Stored target kind label.
    target_kind: String,
    /// Stored slot key.
    slot_key: String,
    /// Stored lane label.
    lane: String,
    /// Stored action label.
    action: String,
    /// Stored candidate id.
    candidate_id: Option<String>,
    /// Stored selection value.
    selected_value: String,
    /// Stored action timestamp.
    acted_at: i64,
}

impl RawAudit {
    /// Converts raw columns into a typed audit record.
    fn into_record(self) -> Result<KeyReviewAuditRecord, SqliteSpecStoreError> {
        Ok(KeyReviewAuditRecord {
            category: Category::new(self.category),
            target_kind: parse_label("target_kind", &self.target_kind)?,
            slot_key: self.slot_key,
            lane: parse_label("lane", &self.lane)?,
            action: parse_label("action", &self.action)?,
            candidate_id: self.candidate_id.map(CandidateId::new),
            selected_value: self.selected_value,
            at: Timestamp::from_unix_millis(self.acted_at),
        })
    }
}

/// Maps audit columns from SQL.
fn raw_audit_from_sql(row: &rusqlite::Row<'_>) -> Result<RawAudit, rusqlite::Error> {
    Ok(RawAudit {
        category: row.get(0)?,
        target_kind: row.get(1)?,
        slot_key: row.get(2)?,
        lane: row.get(3)?,
        action: row.get(4)?,
        candidate_id: row.get(5)?,
        selected_value: row.get(6)?,
        acted_at: row.get(7)?,
    })
}

/// Raw candidate review columns before typed conversion.
struct RawCandidateReview {
    /// Stored category.
    category: String,
    /// Stored target kind label.
    target_kind: String,
    /// Stored slot key.
    slot_key: String,
    /// Stored candidate id.
    candidate_id: String,
    /// Stored decision label.
    decision: String,
    /// Stored asserted value.
    value: Option<String>,
    /// Stored review timestamp.
    reviewed_at: i64,
}

impl RawCandidateReview {
    /// Converts raw columns into a typed candidate review row.
    fn into_row(self) -> Result<CandidateReviewRow, SqliteSpecStoreError> {
        Ok(CandidateReviewRow {
            category: Category::new(self.category),
            target_kind: parse_label("target_kind", &self.target_kind)?,
            slot_key: self.slot_key,
            candidate_id: CandidateId::new(self.candidate_id),
            decision: parse_label::<ReviewDecision>("decision", &self.decision)?,
            value: self.value,
            reviewed_at: Timestamp::from_unix_millis(self.reviewed_at),
        })
    }
}

/// Maps candidate review columns from SQL.
fn raw_candidate_review_from_sql(
    row: &rusqlite::Row<'_>,
) -> Result<RawCandidateReview, rusqlite::Error> {
    Ok(RawCandidateReview {
        category: row.get(0)?,
        target_kind: row.get(1)?,
        slot_key: row.get(2)?,
        candidate_id: row.get(3)?,
        decision: row.get(4)?,
        value: row.get(5)?,
        reviewed_at: row.get(6)?,
    })
}
