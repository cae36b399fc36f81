// crates/spec-desk-cortex/src/route.rs
// ============================================================================
// Module: Spec Desk Route Planning
// Description: Deep-task routing with per-product caps.
// Purpose: Decide which deep tasks dispatch and which defer, without executing.
// Dependencies: spec-desk-core, crate::tools, serde
// ============================================================================

//! ## Overview
//! Route planning groups deep tasks per product, orders them by priority, and
//! enforces the per-product cap. The plan reports dispatched and deferred
//! tasks; execution is a separate concern of the orchestrator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::Category;
use spec_desk_core::ProductId;

use crate::tools::DeepTask;

// ============================================================================
// SECTION: Route Context
// ============================================================================

/// Context for one route planning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteContext {
    /// Category identifier.
    pub category: Category,
    /// Maximum deep tasks dispatched per product.
    pub max_deep_fields_per_product: u32,
    /// Whether remote dispatch is disabled.
    #[serde(default)]
    pub local_only: bool,
}

// ============================================================================
// SECTION: Route Plan
// ============================================================================

/// Routing decision for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRoutePlan {
    /// Product identifier.
    pub product_id: ProductId,
    /// Tasks selected for dispatch, ordered by priority descending.
    pub tasks: Vec<DeepTask>,
    /// Tasks deferred past the per-product cap.
    pub deferred: Vec<DeepTask>,
}

/// Routing decision across all requested tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Category identifier.
    pub category: Category,
    /// Whether remote dispatch is disabled.
    pub local_only: bool,
    /// Per-product plans ordered by product id.
    pub plans: Vec<ProductRoutePlan>,
    /// Total tasks selected for dispatch.
    pub total_tasks: u32,
    /// Total tasks deferred.
    pub deferred_tasks: u32,
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Plans deep-task routing under the per-product cap.
#[must_use]
pub fn plan_routes(tasks: &[DeepTask], context: &RouteContext) -> RoutePlan {
    let mut grouped: BTreeMap<ProductId, Vec<DeepTask>> = BTreeMap::new();
    for task in tasks {
        grouped.entry(task.product_id.clone()).or_default().push(task.clone());
    }

    let cap = usize::try_from(context.max_deep_fields_per_product).unwrap_or(usize::MAX);
    let mut plans = Vec::with_capacity(grouped.len());
    let mut total_tasks = 0;
    let mut deferred_tasks = 0;
    for (product_id, mut product_tasks) in grouped {
        product_tasks.sort_by(|a, b| {
            b.priority.total_cmp(&a.priority).then_with(|| a.field_key.cmp(&b.field_key))
        });
        let deferred = if product_tasks.len() > cap {
            product_tasks.split_off(cap)
        } else {
            Vec::new()
        };
        total_tasks += u32::try_from(product_tasks.len()).unwrap_or(u32::MAX);
        deferred_tasks += u32::try_from(deferred.len()).unwrap_or(u32::MAX);
        plans.push(ProductRoutePlan {
            product_id,
            tasks: product_tasks,
            deferred,
        });
    }

    RoutePlan {
        category: context.category.clone(),
        local_only: context.local_only,
        plans,
        total_tasks,
        deferred_tasks,
    }
}
