// crates/spec-desk-intel/src/aggregator.rs
// ============================================================================
// Module: Spec Desk Source Intel Aggregator
// Description: Rolling per-domain statistics with reward decay.
// Purpose: Rank future extraction work by source quality signals.
// Dependencies: spec-desk-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Source intel aggregates one row per `(category, root_domain)` with
//! per-path, per-brand, and per-field-method sub-aggregates. Field-method
//! rewards decay exponentially on each update so stale evidence loses weight;
//! contradictions from constraint analysis decrement reward. Stats persist as
//! JSON at fixed storage keys under `_source_intel/{category}/`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::ArtifactStore;
use spec_desk_core::ArtifactStoreError;
use spec_desk_core::Category;
use spec_desk_core::FieldKey;
use spec_desk_core::ProductId;
use spec_desk_core::Timestamp;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Storage directory for source intel, under the output root.
pub const INTEL_DIR: &str = "_source_intel";
/// File name of the per-category domain stats object.
pub const DOMAIN_STATS_FILE: &str = "domain_stats.json";
/// Default reward half-life in seconds (seven days).
pub const DEFAULT_HALF_LIFE_SECS: f64 = 604_800.0;
/// Default size of the rolling products-seen window.
pub const DEFAULT_PRODUCTS_WINDOW: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Source intel errors.
#[derive(Debug, Error)]
pub enum IntelError {
    /// Storage access failed.
    #[error("intel storage error: {0}")]
    Storage(#[from] ArtifactStoreError),
    /// A stats object exists but does not parse.
    #[error("malformed intel object {path}: {message}")]
    Malformed {
        /// Object key.
        path: String,
        /// Parse failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Aggregator configuration.
///
/// # Invariants
/// - `half_life_secs` is strictly positive.
/// - `products_window` is greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntelConfig {
    /// Reward half-life in seconds.
    pub half_life_secs: f64,
    /// Rolling products-seen window size.
    pub products_window: usize,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            half_life_secs: DEFAULT_HALF_LIFE_SECS,
            products_window: DEFAULT_PRODUCTS_WINDOW,
        }
    }
}

// ============================================================================
// SECTION: Aggregates
// ============================================================================

/// Shared counter block used by domain, path, and brand aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AggregateCounters {
    /// Extraction attempts.
    pub attempts: u64,
    /// Attempts that returned HTTP success.
    pub http_ok_count: u64,
    /// Attempts whose page identity matched the target item.
    pub identity_match_count: u64,
    /// Attempts that conflicted with a major anchor field.
    pub major_anchor_conflict_count: u64,
    /// Fields the source contributed candidates for.
    pub fields_contributed_count: u64,
    /// Contributed fields that were accepted.
    pub fields_accepted_count: u64,
    /// Accepted fields at critical required level.
    pub accepted_critical_fields_count: u64,
}

/// Endpoint signal sample aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EndpointSignal {
    /// Number of samples.
    pub count: u64,
    /// Running average sample score.
    pub avg_score: f64,
}

impl EndpointSignal {
    /// Folds one sample into the running average.
    fn record(&mut self, score: f64) {
        let total = self.avg_score.mul_add(precise(self.count), score);
        self.count += 1;
        self.avg_score = total / precise(self.count);
    }
}

/// Decayed reward counters for one `field::method` pair.
///
/// # Invariants
/// - Counters are non-negative; decay never drives them below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldMethodReward {
    /// Decayed observation count.
    pub seen_count: f64,
    /// Decayed success count.
    pub success_count: f64,
    /// Decayed failure count.
    pub fail_count: f64,
    /// Decayed contradiction count.
    pub contradiction_count: f64,
}

impl FieldMethodReward {
    /// Applies exponential decay across an elapsed interval.
    fn decay(&mut self, elapsed_secs: f64, half_life_secs: f64) {
        let factor = (-elapsed_secs / half_life_secs).exp();
        self.seen_count *= factor;
        self.success_count *= factor;
        self.fail_count *= factor;
        self.contradiction_count *= factor;
    }

    /// Returns the net reward score for ranking.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.success_count - self.fail_count - 2.0 * self.contradiction_count
    }
}

/// Rolling statistics for one `(category, root_domain)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DomainStats {
    /// Domain-level counters.
    pub counters: AggregateCounters,
    /// Per-path sub-aggregates.
    pub per_path: BTreeMap<String, AggregateCounters>,
    /// Per-brand sub-aggregates.
    pub per_brand: BTreeMap<String, AggregateCounters>,
    /// Decayed per-`field::method` rewards.
    pub field_method_reward: BTreeMap<String, FieldMethodReward>,
    /// Rolling window of products recently seen on the domain.
    pub products_seen: Vec<ProductId>,
    /// Attempts against approved sources.
    pub approved_attempts: u64,
    /// Attempts against candidate (unapproved) sources.
    pub candidate_attempts: u64,
    /// Parser health score in `[0, 1]`.
    pub parser_health_score: f64,
    /// Unique page fingerprints observed.
    pub unique_fingerprints: BTreeSet<String>,
    /// Endpoint signal samples keyed by endpoint label.
    pub endpoint_signals: BTreeMap<String, EndpointSignal>,
    /// Timestamp of the last recorded round.
    pub last_updated: Option<Timestamp>,
}

// ============================================================================
// SECTION: Observations
// ============================================================================

/// Outcome of one field-method extraction inside a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMethodOutcome {
    /// Field the method ran for.
    pub field_key: FieldKey,
    /// Extraction method label.
    pub method: String,
    /// Whether the extraction succeeded.
    pub success: bool,
}

/// One extraction round observation for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundObservation {
    /// Registrable root domain.
    pub root_domain: String,
    /// URL path of the fetched page.
    pub path: String,
    /// Brand of the target item.
    pub brand: String,
    /// Product identifier of the target item.
    pub product_id: ProductId,
    /// Whether the fetch returned HTTP success.
    pub http_ok: bool,
    /// Whether page identity matched the target item.
    pub identity_match: bool,
    /// Whether the page conflicted with a major anchor field.
    pub major_anchor_conflict: bool,
    /// Fields the round contributed candidates for.
    pub fields_contributed: u64,
    /// Contributed fields that were accepted.
    pub fields_accepted: u64,
    /// Accepted fields at critical required level.
    pub accepted_critical_fields: u64,
    /// Whether the source is approved.
    pub approved: bool,
    /// Parser health sample in `[0, 1]`.
    pub parser_health: f64,
    /// Page fingerprint.
    pub fingerprint: String,
    /// Endpoint signal samples `(endpoint, score)`.
    pub endpoint_signals: Vec<(String, f64)>,
    /// Field-method outcomes.
    pub field_outcomes: Vec<FieldMethodOutcome>,
    /// Contradicted `field::method` keys from constraint analysis.
    pub contradictions: Vec<String>,
    /// Observation timestamp.
    pub at: Timestamp,
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Source intel aggregator over a storage seam.
pub struct SourceIntelAggregator<S> {
    /// Storage backend.
    store: S,
    /// Output root prefix.
    output_root: String,
    /// Aggregator configuration.
    config: IntelConfig,
}

impl<S: ArtifactStore> SourceIntelAggregator<S> {
    /// Creates an aggregator rooted at the output prefix.
    #[must_use]
    pub fn new(store: S, output_root: impl Into<String>, config: IntelConfig) -> Self {
        Self {
            store,
            output_root: output_root.into(),
            config,
        }
    }

    /// Returns the configured output root.
    #[must_use]
    pub fn output_root(&self) -> &str {
        &self.output_root
    }

    /// Returns the storage backend.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Loads the persisted domain stats for a category.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError`] on storage failure or malformed stats.
    pub fn load_stats(
        &self,
        category: &Category,
    ) -> Result<BTreeMap<String, DomainStats>, IntelError> {
        let key = self.store.resolve_output_key(&[
            &self.output_root,
            INTEL_DIR,
            category.as_str(),
            DOMAIN_STATS_FILE,
        ]);
        let Some(value) = self.store.read_json_or_null(&key)? else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_value(value).map_err(|err| IntelError::Malformed {
            path: key.as_str().to_string(),
            message: err.to_string(),
        })
    }

    /// Persists the domain stats for a category.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError`] on storage failure.
    pub fn save_stats(
        &self,
        category: &Category,
        stats: &BTreeMap<String, DomainStats>,
    ) -> Result<(), IntelError> {
        let key = self.store.resolve_output_key(&[
            &self.output_root,
            INTEL_DIR,
            category.as_str(),
            DOMAIN_STATS_FILE,
        ]);
        let body = serde_json::to_value(stats)
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        self.store.write_object(&key, &body, Some("application/json"))?;
        Ok(())
    }

    /// Folds one round observation into the stats map.
    pub fn record_round(
        &self,
        stats: &mut BTreeMap<String, DomainStats>,
        observation: &RoundObservation,
    ) {
        let domain = stats.entry(observation.root_domain.clone()).or_default();

        let elapsed_secs = domain
            .last_updated
            .map_or(0.0, |last| last.elapsed_seconds(observation.at));
        if elapsed_secs > 0.0 {
            for reward in domain.field_method_reward.values_mut() {
                reward.decay(elapsed_secs, self.config.half_life_secs);
            }
        }

        record_counters(&mut domain.counters, observation);
        record_counters(
            domain.per_path.entry(observation.path.clone()).or_default(),
            observation,
        );
        record_counters(
            domain.per_brand.entry(observation.brand.clone()).or_default(),
            observation,
        );

        if observation.approved {
            domain.approved_attempts += 1;
        } else {
            domain.candidate_attempts += 1;
        }

        // Running average keeps parser health bounded without a sample log.
        let samples = precise(domain.counters.attempts);
        domain.parser_health_score = domain
            .parser_health_score
            .mul_add(samples - 1.0, observation.parser_health)
            / samples;

        domain.unique_fingerprints.insert(observation.fingerprint.clone());
        for (endpoint, score) in &observation.endpoint_signals {
            domain.endpoint_signals.entry(endpoint.clone()).or_default().record(*score);
        }

        domain.products_seen.retain(|product| product != &observation.product_id);
        domain.products_seen.push(observation.product_id.clone());
        let window = self.config.products_window;
        if domain.products_seen.len() > window {
            let excess = domain.products_seen.len() - window;
            domain.products_seen.drain(0 .. excess);
        }

        for outcome in &observation.field_outcomes {
            let key = reward_key(&outcome.field_key, &outcome.method);
            let reward = domain.field_method_reward.entry(key).or_default();
            reward.seen_count += 1.0;
            if outcome.success {
                reward.success_count += 1.0;
            } else {
                reward.fail_count += 1.0;
            }
        }
        for contradicted in &observation.contradictions {
            let reward =
                domain.field_method_reward.entry(contradicted.clone()).or_default();
            reward.contradiction_count += 1.0;
            reward.success_count = (reward.success_count - 1.0).max(0.0);
        }

        domain.last_updated = Some(observation.at);
    }
}

/// Folds an observation into one counter block.
fn record_counters(counters: &mut AggregateCounters, observation: &RoundObservation) {
    counters.attempts += 1;
    counters.http_ok_count += u64::from(observation.http_ok);
    counters.identity_match_count += u64::from(observation.identity_match);
    counters.major_anchor_conflict_count += u64::from(observation.major_anchor_conflict);
    counters.fields_contributed_count += observation.fields_contributed;
    counters.fields_accepted_count += observation.fields_accepted;
    counters.accepted_critical_fields_count += observation.accepted_critical_fields;
}

/// Returns the reward map key for a field-method pair.
#[must_use]
pub fn reward_key(field_key: &FieldKey, method: &str) -> String {
    format!("{field_key}::{method}")
}

/// Converts a counter into the float domain for running averages.
#[allow(clippy::cast_precision_loss, reason = "counters stay far below 2^52")]
fn precise(count: u64) -> f64 {
    count as f64
}
