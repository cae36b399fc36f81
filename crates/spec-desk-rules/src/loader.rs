// crates/spec-desk-rules/src/loader.rs
// ============================================================================
// Module: Spec Desk Rules Loader
// Description: Loads category rules, component DBs, and known values.
// Purpose: Build an immutable in-memory rules bundle from the helper layout.
// Dependencies: spec-desk-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The loader reads the conventional helper-file layout through the storage
//! interface and yields an immutable [`RulesBundle`]. Missing helper files
//! degrade to empty defaults; malformed files fail closed. The component DB
//! alias index is case- and whitespace-insensitive. Reloading swaps the
//! cached bundle atomically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::ArtifactStore;
use spec_desk_core::ArtifactStoreError;
use spec_desk_core::Category;
use spec_desk_core::ComponentType;
use spec_desk_core::CrossValidationRule;
use spec_desk_core::FieldKey;
use spec_desk_core::FieldRules;
use spec_desk_core::KnownValues;
use spec_desk_core::ProductId;
use spec_desk_core::PropertyKey;
use spec_desk_core::StorageKey;
use spec_desk_core::VariancePolicy;
use spec_desk_core::normalize_value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Generated helper files loaded per category.
const GENERATED_DIR: &str = "_generated";
/// Overrides directory loaded per category.
const OVERRIDES_DIR: &str = "_overrides";
/// Component DB subdirectory under the generated helpers.
const COMPONENT_DB_DIR: &str = "component_db";
/// Suffix of per-product override files.
const PRODUCT_OVERRIDE_SUFFIX: &str = ".overrides.json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rules loader errors.
#[derive(Debug, Error)]
pub enum RulesError {
    /// Storage access failed.
    #[error("rules storage error: {0}")]
    Storage(#[from] ArtifactStoreError),
    /// A helper file exists but does not parse into its expected shape.
    #[error("malformed helper file {path}: {message}")]
    Malformed {
        /// Helper file key.
        path: String,
        /// Parse failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Component DB
// ============================================================================

/// One shared property inside a component DB entry.
///
/// # Invariants
/// - `confidence`, when present, is within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDbProperty {
    /// Property value.
    pub value: String,
    /// Optional property confidence.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Optional variance policy override.
    #[serde(default)]
    pub variance_policy: Option<VariancePolicy>,
}

/// One component DB entry.
///
/// # Invariants
/// - `name` is the canonical component name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDbEntry {
    /// Canonical component name.
    pub name: String,
    /// Component maker.
    #[serde(default)]
    pub maker: String,
    /// Known aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// External links.
    #[serde(default)]
    pub links: Vec<String>,
    /// Shared properties keyed by property key.
    #[serde(default)]
    pub properties: BTreeMap<PropertyKey, ComponentDbProperty>,
}

/// In-memory component DB for one component type.
///
/// # Invariants
/// - `index` keys are normalized (lowercased, whitespace stripped) aliases and
///   names mapping to `entries` keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentDb {
    /// Entries keyed by canonical name.
    pub entries: BTreeMap<String, ComponentDbEntry>,
    /// Normalized alias/name index into `entries`.
    pub index: BTreeMap<String, String>,
}

impl ComponentDb {
    /// Builds a component DB from its entries, deriving the alias index.
    #[must_use]
    pub fn from_entries(entries: Vec<ComponentDbEntry>) -> Self {
        let mut map = BTreeMap::new();
        let mut index = BTreeMap::new();
        for entry in entries {
            index.insert(normalize_value(&entry.name), entry.name.clone());
            for alias in &entry.aliases {
                index.insert(normalize_value(alias), entry.name.clone());
            }
            map.insert(entry.name.clone(), entry);
        }
        Self {
            entries: map,
            index,
        }
    }

    /// Resolves a raw name or alias to an entry, case- and
    /// whitespace-insensitively.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<&ComponentDbEntry> {
        let key = self.index.get(&normalize_value(raw))?;
        self.entries.get(key)
    }
}

// ============================================================================
// SECTION: UI Catalog
// ============================================================================

/// One UI field catalog entry.
///
/// # Invariants
/// - `display_order` sorts ascending in the review grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiFieldEntry {
    /// Field key the entry describes.
    pub field_key: FieldKey,
    /// Display label.
    pub label: String,
    /// Optional display group.
    #[serde(default)]
    pub group: Option<String>,
    /// Optional display order.
    #[serde(default)]
    pub display_order: Option<u32>,
}

// ============================================================================
// SECTION: Rules Bundle
// ============================================================================

/// Immutable rules snapshot for one category.
///
/// # Invariants
/// - The bundle is never mutated after load; reloads build a new bundle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RulesBundle {
    /// Field rules.
    pub rules: FieldRules,
    /// Component DBs keyed by component type.
    pub component_dbs: BTreeMap<ComponentType, ComponentDb>,
    /// Known enum values keyed by field.
    pub known_values: BTreeMap<FieldKey, KnownValues>,
    /// Cross-validation rules.
    pub cross_validation: Vec<CrossValidationRule>,
    /// Field key migrations (old key to new key).
    pub key_migrations: BTreeMap<String, String>,
    /// Parse templates, kept opaque for the extraction layer.
    pub parse_templates: serde_json::Value,
    /// UI field catalog entries.
    pub ui_field_catalog: Vec<UiFieldEntry>,
    /// Per-product manual overrides keyed by product, then field.
    pub product_overrides: BTreeMap<ProductId, BTreeMap<FieldKey, String>>,
}

impl RulesBundle {
    /// Applies a key migration to a field key, returning the canonical key.
    #[must_use]
    pub fn migrate_key(&self, field_key: &FieldKey) -> FieldKey {
        self.key_migrations
            .get(field_key.as_str())
            .map_or_else(|| field_key.clone(), FieldKey::new)
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Rules loader reading the helper-file layout through a storage seam.
pub struct RulesLoader<S> {
    /// Storage backend.
    store: S,
    /// Helper root prefix.
    helper_root: String,
}

impl<S: ArtifactStore> RulesLoader<S> {
    /// Creates a loader rooted at the helper prefix.
    #[must_use]
    pub fn new(store: S, helper_root: impl Into<String>) -> Self {
        Self {
            store,
            helper_root: helper_root.into(),
        }
    }

    /// Loads the full rules bundle for a category.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] on storage failure or malformed helper files;
    /// missing files degrade to empty defaults.
    pub fn load_category(&self, category: &Category) -> Result<RulesBundle, RulesError> {
        let rules = self
            .read_generated::<FieldRules>(category, "field_rules.json")?
            .unwrap_or_default();
        let known_values = self
            .read_generated::<BTreeMap<FieldKey, KnownValues>>(category, "known_values.json")?
            .unwrap_or_default();
        let cross_validation = self
            .read_generated::<Vec<CrossValidationRule>>(category, "cross_validation_rules.json")?
            .unwrap_or_default();
        let key_migrations = self
            .read_generated::<BTreeMap<String, String>>(category, "key_migrations.json")?
            .unwrap_or_default();
        let parse_templates = self
            .read_generated::<serde_json::Value>(category, "parse_templates.json")?
            .unwrap_or(serde_json::Value::Null);
        let ui_field_catalog = self
            .read_generated::<Vec<UiFieldEntry>>(category, "ui_field_catalog.json")?
            .unwrap_or_default();

        let component_dbs = self.load_component_dbs(category, &rules)?;
        let product_overrides = self.load_product_overrides(category)?;

        Ok(RulesBundle {
            rules,
            component_dbs,
            known_values,
            cross_validation,
            key_migrations,
            parse_templates,
            ui_field_catalog,
            product_overrides,
        })
    }

    /// Loads the component DBs referenced by the field rules, merged with
    /// component override files.
    fn load_component_dbs(
        &self,
        category: &Category,
        rules: &FieldRules,
    ) -> Result<BTreeMap<ComponentType, ComponentDb>, RulesError> {
        let mut types: Vec<&ComponentType> =
            rules.fields.values().filter_map(|rule| rule.component.as_ref()).collect();
        types.sort();
        types.dedup();

        let mut dbs = BTreeMap::new();
        for component_type in types {
            let key = self.store.resolve_output_key(&[
                &self.helper_root,
                category.as_str(),
                GENERATED_DIR,
                COMPONENT_DB_DIR,
                &format!("{component_type}.json"),
            ]);
            let mut entries = self
                .read_typed::<Vec<ComponentDbEntry>>(&key)?
                .unwrap_or_default();
            self.merge_component_overrides(category, component_type, &mut entries)?;
            dbs.insert(component_type.clone(), ComponentDb::from_entries(entries));
        }
        Ok(dbs)
    }

    /// Merges component override files over the generated entries.
    fn merge_component_overrides(
        &self,
        category: &Category,
        component_type: &ComponentType,
        entries: &mut Vec<ComponentDbEntry>,
    ) -> Result<(), RulesError> {
        let prefix = self.store.resolve_output_key(&[
            &self.helper_root,
            category.as_str(),
            OVERRIDES_DIR,
            "components",
            &format!("{component_type}_"),
        ]);
        for key in self.store.list_keys(&prefix)? {
            let Some(override_entry) = self.read_typed::<ComponentDbEntry>(&key)? else {
                continue;
            };
            match entries.iter_mut().find(|entry| entry.name == override_entry.name) {
                Some(existing) => *existing = override_entry,
                None => entries.push(override_entry),
            }
        }
        Ok(())
    }

    /// Loads per-product manual override files.
    fn load_product_overrides(
        &self,
        category: &Category,
    ) -> Result<BTreeMap<ProductId, BTreeMap<FieldKey, String>>, RulesError> {
        let prefix = self.store.resolve_output_key(&[
            &self.helper_root,
            category.as_str(),
            OVERRIDES_DIR,
        ]);
        let mut overrides = BTreeMap::new();
        for key in self.store.list_keys(&prefix)? {
            let Some(file_name) = key.as_str().rsplit('/').next() else {
                continue;
            };
            let Some(product_id) = file_name.strip_suffix(PRODUCT_OVERRIDE_SUFFIX) else {
                continue;
            };
            if let Some(fields) = self.read_typed::<BTreeMap<FieldKey, String>>(&key)? {
                overrides.insert(ProductId::new(product_id), fields);
            }
        }
        Ok(overrides)
    }

    /// Reads one generated helper file into its typed shape.
    fn read_generated<T: for<'de> Deserialize<'de>>(
        &self,
        category: &Category,
        file_name: &str,
    ) -> Result<Option<T>, RulesError> {
        let key = self.store.resolve_output_key(&[
            &self.helper_root,
            category.as_str(),
            GENERATED_DIR,
            file_name,
        ]);
        self.read_typed(&key)
    }

    /// Reads one JSON object into its typed shape; absent keys yield `None`.
    fn read_typed<T: for<'de> Deserialize<'de>>(
        &self,
        key: &StorageKey,
    ) -> Result<Option<T>, RulesError> {
        let Some(value) = self.store.read_json_or_null(key)? else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|err| RulesError::Malformed {
            path: key.as_str().to_string(),
            message: err.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Process-wide cache of immutable rules bundles.
///
/// # Invariants
/// - Bundles are shared via `Arc`; reload swaps the slot atomically under the
///   cache mutex, never mutating a published bundle.
pub struct RulesCache<S> {
    /// Loader building bundles.
    loader: RulesLoader<S>,
    /// Cached bundles keyed by category.
    snapshots: Mutex<BTreeMap<Category, Arc<RulesBundle>>>,
}

impl<S: ArtifactStore> RulesCache<S> {
    /// Creates an empty cache over a loader.
    #[must_use]
    pub fn new(loader: RulesLoader<S>) -> Self {
        Self {
            loader,
            snapshots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the cached bundle for a category, loading it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] when loading fails; the cache is unchanged.
    pub fn get(&self, category: &Category) -> Result<Arc<RulesBundle>, RulesError> {
        {
            let guard = self.lock()?;
            if let Some(bundle) = guard.get(category) {
                return Ok(Arc::clone(bundle));
            }
        }
        self.reload(category)
    }

    /// Reloads the bundle for a category and swaps the cache slot.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] when loading fails; the previous bundle stays
    /// published.
    pub fn reload(&self, category: &Category) -> Result<Arc<RulesBundle>, RulesError> {
        let bundle = Arc::new(self.loader.load_category(category)?);
        let mut guard = self.lock()?;
        guard.insert(category.clone(), Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Locks the snapshot map.
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<Category, Arc<RulesBundle>>>, RulesError> {
        self.snapshots
            .lock()
            .map_err(|_| RulesError::Storage(ArtifactStoreError::Io(
                "rules cache mutex poisoned".to_string(),
            )))
    }
}
