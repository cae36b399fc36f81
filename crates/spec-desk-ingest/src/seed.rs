// crates/spec-desk-ingest/src/seed.rs
// ============================================================================
// Module: Spec Desk Seeder
// Description: Seeds per-product artifacts into the relational curation store.
// Purpose: Populate candidates, field state, components, enums, and review rows.
// Dependencies: spec-desk-core, spec-desk-rules, spec-desk-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! The seeder turns one product's artifact set into relational rows: items,
//! disambiguated candidates, field state, component catalog rows and links,
//! enum members and links, review-state seeds for all three target kinds, and
//! the source registry. Every insert uses upsert semantics keyed on natural
//! keys, so re-seeding the same artifacts yields bit-identical table counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::ComponentIdentityId;
use spec_desk_core::ComponentType;
use spec_desk_core::EnumPolicy;
use spec_desk_core::FieldKey;
use spec_desk_core::FieldRule;
use spec_desk_core::ItemComponentLinkRow;
use spec_desk_core::ItemListLinkRow;
use spec_desk_core::ItemRecord;
use spec_desk_core::MatchType;
use spec_desk_core::ProductId;
use spec_desk_core::SlotRef;
use spec_desk_core::SourceAssertionRow;
use spec_desk_core::SourceEvidenceRefRow;
use spec_desk_core::SourceRegistryRow;
use spec_desk_core::ValueSource;
use spec_desk_core::normalize_value;
use spec_desk_rules::ComponentDbEntry;
use spec_desk_rules::RulesBundle;
use spec_desk_store_sqlite::ComponentIdentitySeed;
use spec_desk_store_sqlite::ComponentValueSeed;
use spec_desk_store_sqlite::ItemFieldStateSeed;
use spec_desk_store_sqlite::KeyReviewSeed;
use spec_desk_store_sqlite::ListValueSeed;
use spec_desk_store_sqlite::SlotLocator;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreError;
use thiserror::Error;

use crate::artifacts::NormalizedField;
use crate::artifacts::ProductArtifacts;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Confidence threshold below which a seeded slot is flagged for AI review.
pub const AI_REVIEW_THRESHOLD: f64 = 0.8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Seeder errors.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The relational store rejected a write.
    #[error("seed store error: {0}")]
    Store(#[from] SqliteSpecStoreError),
}

// ============================================================================
// SECTION: Seed Report
// ============================================================================

/// Counters describing one product seed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedReport {
    /// Number of field state rows seeded.
    pub fields_seeded: u32,
    /// Number of candidate rows seeded.
    pub candidates_seeded: u32,
    /// Number of component links seeded.
    pub components_linked: u32,
    /// Number of enum member links seeded.
    pub enum_values_linked: u32,
    /// Number of audit rows backfilled from candidate reviews.
    pub audits_backfilled: u64,
}

// ============================================================================
// SECTION: Seeder
// ============================================================================

/// Seeds product artifacts into the store under one category's rules.
pub struct Seeder<'a> {
    /// Target relational store.
    store: &'a SqliteSpecStore,
    /// Category rules bundle.
    bundle: &'a RulesBundle,
}

impl<'a> Seeder<'a> {
    /// Creates a seeder over a store and rules bundle.
    #[must_use]
    pub const fn new(store: &'a SqliteSpecStore, bundle: &'a RulesBundle) -> Self {
        Self {
            store,
            bundle,
        }
    }

    /// Seeds the known enum values of the category as workbook members.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] on store failure.
    pub fn seed_known_values(&self, category: &Category) -> Result<(), SeedError> {
        for (field_key, known) in &self.bundle.known_values {
            let list = self.store.upsert_enum_list(category, field_key)?;
            for value in &known.values {
                let existing =
                    self.store.get_list_value(list.id, &normalize_value(value))?;
                if existing.is_some() {
                    continue;
                }
                self.store.upsert_list_value(&ListValueSeed {
                    enum_list_id: list.id,
                    value: value.clone(),
                    source: ValueSource::Workbook,
                    enum_policy: known.policy,
                    accepted_candidate_id: None,
                    needs_review: false,
                    overridden: false,
                    source_timestamp: None,
                })?;
            }
        }
        Ok(())
    }

    /// Seeds one product's artifact set.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] on store failure.
    pub fn seed_product(
        &self,
        category: &Category,
        artifacts: &ProductArtifacts,
    ) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();
        let product_id = &artifacts.normalized.product_id;

        let mut identity = artifacts.normalized.identity.clone();
        identity.brand = identity.brand.trim().to_string();
        identity.model = identity.model.trim().to_string();
        identity.variant = identity.variant.map(|variant| variant.trim().to_string());
        self.store.upsert_item(&ItemRecord {
            category: category.clone(),
            product_id: product_id.clone(),
            identity,
            lifecycle: artifacts.normalized.lifecycle,
        })?;

        let batches: Vec<(FieldKey, Vec<Candidate>)> = artifacts
            .candidates
            .fields
            .iter()
            .map(|(field_key, candidates)| {
                (self.bundle.migrate_key(field_key), candidates.clone())
            })
            .collect();
        let stored = self.store.upsert_product_candidates(category, product_id, &batches)?;
        for (field_key, candidates) in &stored {
            for candidate in candidates {
                report.candidates_seeded += 1;
                self.seed_source_rows(category, product_id, field_key, candidate)?;
            }
        }

        for (field_key, normalized_field) in &artifacts.normalized.fields {
            let field_key = self.bundle.migrate_key(field_key);
            self.seed_field(category, product_id, &field_key, normalized_field, &mut report)?;
        }

        report.audits_backfilled = self.store.backfill_audit_from_reviews()?;
        Ok(report)
    }

    /// Seeds one field's state, review row, and component or enum bindings.
    fn seed_field(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        normalized_field: &NormalizedField,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let override_value = self
            .bundle
            .product_overrides
            .get(product_id)
            .and_then(|fields| fields.get(field_key));
        let (value, source, overridden) = match override_value {
            Some(value) => (Some(value.clone()), ValueSource::Manual, true),
            None => {
                (normalized_field.value.clone(), normalized_field.source, normalized_field.overridden)
            }
        };
        let needs_ai_review =
            normalized_field.confidence < AI_REVIEW_THRESHOLD && !overridden;

        self.store.upsert_item_field_state(&ItemFieldStateSeed {
            category: category.clone(),
            product_id: product_id.clone(),
            field_key: field_key.clone(),
            value: value.clone(),
            confidence: normalized_field.confidence,
            source,
            overridden,
            needs_ai_review,
            ai_review_complete: false,
            accepted_candidate_id: None,
            constraint_conflict: false,
        })?;
        report.fields_seeded += 1;

        self.store.upsert_key_review_state(&KeyReviewSeed {
            category: category.clone(),
            locator: SlotLocator::Grid {
                product_id: product_id.clone(),
                field_key: field_key.clone(),
            },
            selected_value: value.clone(),
            selected_candidate_id: None,
        })?;

        let rule = self.bundle.rules.get(field_key);
        let Some(value) = value else {
            return Ok(());
        };

        if let Some(component_type) = rule.and_then(|rule| rule.component.as_ref()) {
            self.seed_component(
                category,
                product_id,
                field_key,
                component_type,
                &value,
                normalized_field.confidence,
                report,
            )?;
        }
        if is_enum_field(rule, self.bundle, field_key) {
            self.seed_enum_value(
                category,
                product_id,
                field_key,
                &value,
                normalized_field.confidence,
                report,
            )?;
        }
        Ok(())
    }

    /// Seeds the component identity, property values, link, and review rows
    /// for a component-backed field.
    #[allow(clippy::too_many_arguments, reason = "seed context is positional")]
    fn seed_component(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        component_type: &ComponentType,
        value: &str,
        confidence: f64,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let entry = self
            .bundle
            .component_dbs
            .get(component_type)
            .and_then(|db| db.resolve(value));

        let (identity_seed, match_type) = match entry {
            Some(entry) => (
                ComponentIdentitySeed {
                    category: category.clone(),
                    component_type: component_type.clone(),
                    canonical_name: entry.name.clone(),
                    maker: entry.maker.clone(),
                    aliases: entry.aliases.clone(),
                    links: entry.links.clone(),
                    source: ValueSource::ComponentDb,
                },
                if normalize_value(&entry.name) == normalize_value(value) {
                    MatchType::Exact
                } else {
                    MatchType::Alias
                },
            ),
            None => (
                ComponentIdentitySeed {
                    category: category.clone(),
                    component_type: component_type.clone(),
                    canonical_name: value.trim().to_string(),
                    maker: String::new(),
                    aliases: Vec::new(),
                    links: Vec::new(),
                    source: ValueSource::Pipeline,
                },
                MatchType::Fuzzy,
            ),
        };

        let identity = self.store.upsert_component_identity(&identity_seed)?;
        self.store.upsert_item_component_link(&ItemComponentLinkRow {
            category: category.clone(),
            product_id: product_id.clone(),
            field_key: field_key.clone(),
            component_identity_id: identity.id,
            match_type,
            score: confidence,
        })?;
        report.components_linked += 1;

        if let Some(entry) = entry {
            self.seed_component_properties(category, identity.id, &identity_seed, entry, confidence)?;
        }
        Ok(())
    }

    /// Seeds the shared property rows and their review slots for one entry.
    fn seed_component_properties(
        &self,
        category: &Category,
        identity_id: ComponentIdentityId,
        identity_seed: &ComponentIdentitySeed,
        entry: &ComponentDbEntry,
        fallback_confidence: f64,
    ) -> Result<(), SeedError> {
        for (property_key, property) in &entry.properties {
            let property_confidence = property.confidence.unwrap_or(fallback_confidence);
            let variance_policy = property.variance_policy.or_else(|| {
                self.bundle
                    .rules
                    .get(&property_key.as_field_key())
                    .and_then(|rule| rule.variance_policy)
            });
            self.store.upsert_component_value(&ComponentValueSeed {
                component_identity_id: identity_id,
                property_key: property_key.clone(),
                value: Some(property.value.clone()),
                confidence: property_confidence,
                variance_policy,
                constraints: Vec::new(),
                accepted_candidate_id: None,
                needs_review: property_confidence < AI_REVIEW_THRESHOLD,
                overridden: false,
            })?;
            self.store.upsert_key_review_state(&KeyReviewSeed {
                category: category.clone(),
                locator: SlotLocator::Component {
                    component_type: identity_seed.component_type.clone(),
                    canonical_name: identity_seed.canonical_name.clone(),
                    maker: identity_seed.maker.clone(),
                    property_key: property_key.clone(),
                },
                selected_value: Some(property.value.clone()),
                selected_candidate_id: None,
            })?;
        }
        Ok(())
    }

    /// Seeds the enum member, link, and review row for an enum-backed field.
    fn seed_enum_value(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        value: &str,
        confidence: f64,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let known = self.bundle.known_values.get(field_key);
        let policy = known.map_or(EnumPolicy::Open, |known| known.policy);
        let normalized = normalize_value(value);

        if policy == EnumPolicy::Closed {
            let admissible = known.is_some_and(|known| {
                known.values.iter().any(|known_value| normalize_value(known_value) == normalized)
            });
            if !admissible {
                // Closed-policy violations stay at the candidate level.
                return Ok(());
            }
        }

        let list = self.store.upsert_enum_list(category, field_key)?;
        let existing = self.store.get_list_value(list.id, &normalized)?;
        let row = match existing {
            Some(row) => {
                if row.source == ValueSource::Workbook {
                    // A pipeline match deduplicates against the workbook
                    // member but retains its pipeline source.
                    self.store.upsert_list_value(&ListValueSeed {
                        enum_list_id: list.id,
                        value: row.value.clone(),
                        source: ValueSource::Pipeline,
                        enum_policy: row.enum_policy,
                        accepted_candidate_id: row.accepted_candidate_id.clone(),
                        needs_review: row.needs_review,
                        overridden: row.overridden,
                        source_timestamp: row.source_timestamp,
                    })?
                } else {
                    row
                }
            }
            None => self.store.upsert_list_value(&ListValueSeed {
                enum_list_id: list.id,
                value: value.to_string(),
                source: ValueSource::Pipeline,
                enum_policy: policy,
                accepted_candidate_id: None,
                needs_review: true,
                overridden: false,
                source_timestamp: None,
            })?,
        };

        self.store.upsert_item_list_link(&ItemListLinkRow {
            category: category.clone(),
            product_id: product_id.clone(),
            field_key: field_key.clone(),
            list_value_id: row.id,
            match_type: MatchType::Exact,
            score: confidence,
        })?;
        report.enum_values_linked += 1;

        self.store.upsert_key_review_state(&KeyReviewSeed {
            category: category.clone(),
            locator: SlotLocator::Resolved {
                slot: SlotRef::EnumKey {
                    list_value_id: row.id,
                    enum_list_id: list.id,
                    enum_value_norm: row.normalized_value.clone(),
                },
            },
            selected_value: Some(row.value.clone()),
            selected_candidate_id: None,
        })?;
        Ok(())
    }

    /// Seeds the source registry, assertion, and evidence rows for one
    /// stored candidate.
    fn seed_source_rows(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        candidate: &Candidate,
    ) -> Result<(), SeedError> {
        self.store.upsert_source(&SourceRegistryRow {
            host: candidate.source.host.clone(),
            root_domain: candidate.source.root_domain.clone(),
            tier: candidate.source.tier,
        })?;
        let assertion = SourceAssertionRow {
            host: candidate.source.host.clone(),
            category: category.clone(),
            product_id: product_id.clone(),
            field_key: field_key.clone(),
            candidate_id: CandidateId::new(candidate.candidate_id.as_str()),
            method: candidate.source.method.clone(),
            asserted_at: candidate.evidence.retrieved_at,
        };
        self.store.upsert_source_assertion(&assertion)?;
        self.store.upsert_source_evidence_ref(
            &assertion,
            &SourceEvidenceRefRow {
                snippet_id: candidate.evidence.snippet_id.clone(),
                quote: candidate.evidence.quote.clone(),
                url: candidate.evidence.url.clone(),
                retrieved_at: candidate.evidence.retrieved_at,
            },
        )?;
        Ok(())
    }
}

/// Returns whether a field is enum-backed by rule or known values.
fn is_enum_field(rule: Option<&FieldRule>, bundle: &RulesBundle, field_key: &FieldKey) -> bool {
    rule.is_some_and(|rule| rule.enum_binding.is_some())
        || bundle.known_values.contains_key(field_key)
}
