// crates/spec-desk-intel/src/report.rs
// ============================================================================
// Module: Spec Desk Intel Reports
// Description: Promotion suggestions and expansion plans from domain stats.
// Purpose: Emit ranking reports as JSON at fixed storage keys.
// Dependencies: spec-desk-core, crate::aggregator, serde, serde_json
// ============================================================================

//! ## Overview
//! Reports distill domain stats into actionable plans: which candidate
//! domains deserve promotion to approved status, and where per-brand coverage
//! is thin enough to warrant expansion. Reports are emitted per run under
//! `_source_intel/{category}/promotion_suggestions/` and
//! `_source_intel/{category}/expansion_plans/`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::ArtifactStore;
use spec_desk_core::ArtifactStoreError;
use spec_desk_core::Category;
use spec_desk_core::RunId;
use spec_desk_core::Timestamp;

use crate::aggregator::AggregateCounters;
use crate::aggregator::DomainStats;
use crate::aggregator::INTEL_DIR;
use crate::aggregator::IntelError;
use crate::aggregator::SourceIntelAggregator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Storage directory for promotion suggestion reports.
pub const PROMOTION_DIR: &str = "promotion_suggestions";
/// Storage directory for expansion plan reports.
pub const EXPANSION_DIR: &str = "expansion_plans";

/// Promotion score threshold for a suggestion.
const PROMOTION_THRESHOLD: f64 = 0.6;
/// Maximum tolerated major-anchor conflict rate.
const MAX_CONFLICT_RATE: f64 = 0.1;
/// Coverage threshold below which a brand gets an expansion plan.
const EXPANSION_COVERAGE_THRESHOLD: f64 = 0.5;

// ============================================================================
// SECTION: Report Shapes
// ============================================================================

/// One promotion suggestion for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSuggestion {
    /// Registrable root domain.
    pub root_domain: String,
    /// Composite promotion score in `[0, 1]`.
    pub score: f64,
    /// Identity match rate across attempts.
    pub identity_match_rate: f64,
    /// Acceptance rate across contributed fields.
    pub accept_rate: f64,
    /// Parser health score.
    pub parser_health: f64,
    /// Whether the domain clears the promotion bar.
    pub suggested: bool,
}

/// Promotion report for one category and run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    /// Category identifier.
    pub category: Category,
    /// Emitting run identifier.
    pub run_id: RunId,
    /// Report timestamp.
    pub generated_at: Timestamp,
    /// Overall suggestions ordered by score descending.
    pub overall: Vec<PromotionSuggestion>,
    /// Per-brand suggestions ordered by score descending.
    pub per_brand: BTreeMap<String, Vec<PromotionSuggestion>>,
}

/// One per-brand expansion plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionPlan {
    /// Brand the plan covers.
    pub brand: String,
    /// Acceptance coverage for the brand in `[0, 1]`.
    pub coverage: f64,
    /// Candidate domains worth trying for the brand.
    pub candidate_domains: Vec<String>,
}

/// Expansion report for one category and run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionReport {
    /// Category identifier.
    pub category: Category,
    /// Emitting run identifier.
    pub run_id: RunId,
    /// Report timestamp.
    pub generated_at: Timestamp,
    /// Plans ordered by coverage ascending.
    pub plans: Vec<ExpansionPlan>,
}

// ============================================================================
// SECTION: Report Builders
// ============================================================================

/// Builds the promotion report from domain stats.
#[must_use]
pub fn build_promotion_report(
    category: &Category,
    run_id: &RunId,
    generated_at: Timestamp,
    stats: &BTreeMap<String, DomainStats>,
) -> PromotionReport {
    let mut overall: Vec<PromotionSuggestion> = stats
        .iter()
        .map(|(root_domain, domain)| {
            suggest(root_domain, &domain.counters, domain.parser_health_score)
        })
        .collect();
    overall.sort_by(|a, b| {
        b.score.total_cmp(&a.score).then_with(|| a.root_domain.cmp(&b.root_domain))
    });

    let mut per_brand: BTreeMap<String, Vec<PromotionSuggestion>> = BTreeMap::new();
    for (root_domain, domain) in stats {
        for (brand, counters) in &domain.per_brand {
            per_brand
                .entry(brand.clone())
                .or_default()
                .push(suggest(root_domain, counters, domain.parser_health_score));
        }
    }
    for suggestions in per_brand.values_mut() {
        suggestions.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| a.root_domain.cmp(&b.root_domain))
        });
    }

    PromotionReport {
        category: category.clone(),
        run_id: run_id.clone(),
        generated_at,
        overall,
        per_brand,
    }
}

/// Builds the expansion report from domain stats.
#[must_use]
pub fn build_expansion_report(
    category: &Category,
    run_id: &RunId,
    generated_at: Timestamp,
    stats: &BTreeMap<String, DomainStats>,
) -> ExpansionReport {
    let mut brand_totals: BTreeMap<String, AggregateCounters> = BTreeMap::new();
    for domain in stats.values() {
        for (brand, counters) in &domain.per_brand {
            let total = brand_totals.entry(brand.clone()).or_default();
            total.attempts += counters.attempts;
            total.fields_contributed_count += counters.fields_contributed_count;
            total.fields_accepted_count += counters.fields_accepted_count;
        }
    }

    let mut plans = Vec::new();
    for (brand, totals) in &brand_totals {
        let coverage = rate(totals.fields_accepted_count, totals.fields_contributed_count);
        if coverage >= EXPANSION_COVERAGE_THRESHOLD {
            continue;
        }
        let mut candidate_domains: Vec<String> = stats
            .iter()
            .filter(|(_, domain)| !domain.per_brand.contains_key(brand))
            .filter(|(root_domain, domain)| {
                suggest(root_domain, &domain.counters, domain.parser_health_score).suggested
            })
            .map(|(root_domain, _)| root_domain.clone())
            .collect();
        candidate_domains.sort();
        plans.push(ExpansionPlan {
            brand: brand.clone(),
            coverage,
            candidate_domains,
        });
    }
    plans.sort_by(|a, b| a.coverage.total_cmp(&b.coverage).then_with(|| a.brand.cmp(&b.brand)));

    ExpansionReport {
        category: category.clone(),
        run_id: run_id.clone(),
        generated_at,
        plans,
    }
}

/// Scores one counter block into a promotion suggestion.
fn suggest(
    root_domain: &str,
    counters: &AggregateCounters,
    parser_health: f64,
) -> PromotionSuggestion {
    let identity_match_rate = rate(counters.identity_match_count, counters.attempts);
    let accept_rate = rate(counters.fields_accepted_count, counters.fields_contributed_count);
    let conflict_rate = rate(counters.major_anchor_conflict_count, counters.attempts);
    let score = identity_match_rate.mul_add(0.4, accept_rate.mul_add(0.4, parser_health * 0.2));
    PromotionSuggestion {
        root_domain: root_domain.to_string(),
        score,
        identity_match_rate,
        accept_rate,
        parser_health,
        suggested: score >= PROMOTION_THRESHOLD && conflict_rate < MAX_CONFLICT_RATE,
    }
}

/// Returns `numerator / denominator`, zero when the denominator is zero.
fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss, reason = "counters stay far below 2^52")]
        {
            numerator as f64 / denominator as f64
        }
    }
}

// ============================================================================
// SECTION: Report Emission
// ============================================================================

impl<S: ArtifactStore> SourceIntelAggregator<S> {
    /// Emits the promotion report for one run.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError`] on storage failure.
    pub fn emit_promotion_report(
        &self,
        report: &PromotionReport,
    ) -> Result<(), IntelError> {
        let key = self.store().resolve_output_key(&[
            self.output_root(),
            INTEL_DIR,
            report.category.as_str(),
            PROMOTION_DIR,
            &format!("{}.json", report.run_id),
        ]);
        let body = serde_json::to_value(report)
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        self.store().write_object(&key, &body, Some("application/json"))?;
        Ok(())
    }

    /// Emits the expansion report for one run.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError`] on storage failure.
    pub fn emit_expansion_report(&self, report: &ExpansionReport) -> Result<(), IntelError> {
        let key = self.store().resolve_output_key(&[
            self.output_root(),
            INTEL_DIR,
            report.category.as_str(),
            EXPANSION_DIR,
            &format!("{}.json", report.run_id),
        ]);
        let body = serde_json::to_value(report)
            .map_err(|err| ArtifactStoreError::Io(err.to_string()))?;
        self.store().write_object(&key, &body, Some("application/json"))?;
        Ok(())
    }
}
