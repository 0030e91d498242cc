//! Demand Policy Engine
//!
//! Compares the buyers already committed to a product's active batches with
//! their combined activation thresholds:
//! - ratio above `high_demand_ratio`: open a fast batch at a premium
//! - ratio below `low_demand_ratio`: open a cheaper economy batch
//!
//! The two bands do not overlap, so one call opens at most one batch.
//! Calls for the same product are serialized so each decision is made on a
//! snapshot that already includes the previous call's batch.

use crate::{
    Batch, BatchType, FormationRule,
    collaborators::ProductCatalog,
    config::DemandConfig,
    error::{BatchingError, Result},
    lifecycle::BatchLifecycleManager,
    policy::rule_for,
    registry::KeyedLocks,
    validation,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandLevel {
    High,
    Balanced,
    Low,
}

/// Aggregate over a product's active batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemandSnapshot {
    pub total_capacity: u64,
    pub total_demand: u64,
}

impl DemandSnapshot {
    pub fn from_batches<'a>(batches: impl IntoIterator<Item = &'a Batch>) -> Self {
        batches
            .into_iter()
            .filter(|b| b.is_active)
            .fold(Self::default(), |acc, b| Self {
                total_capacity: acc.total_capacity + u64::from(b.buyers_required),
                total_demand: acc.total_demand + u64::from(b.current_buyers),
            })
    }

    /// Strict comparisons: with no capacity at all neither band fires
    pub fn level(&self, config: &DemandConfig) -> DemandLevel {
        let capacity = self.total_capacity as f64;
        let demand = self.total_demand as f64;
        if demand > capacity * config.high_demand_ratio {
            DemandLevel::High
        } else if demand < capacity * config.low_demand_ratio {
            DemandLevel::Low
        } else {
            DemandLevel::Balanced
        }
    }
}

/// Opens fast or economy batches when a product's demand leaves the balanced band
pub struct DemandPolicyEngine {
    lifecycle: Arc<BatchLifecycleManager>,
    catalog: Arc<dyn ProductCatalog>,
    config: DemandConfig,
    /// Per-product critical sections
    locks: KeyedLocks<String>,
}

impl DemandPolicyEngine {
    /// Creates a demand engine
    ///
    /// # Arguments
    /// * `lifecycle` - Used to create batches and to read the store
    /// * `catalog` - Source of each product's base price
    /// * `config` - Demand bands and per-tier defaults
    pub fn new(
        lifecycle: Arc<BatchLifecycleManager>,
        catalog: Arc<dyn ProductCatalog>,
        config: DemandConfig,
    ) -> Self {
        Self {
            lifecycle,
            catalog,
            config,
            locks: KeyedLocks::new(),
        }
    }

    /// Open a new batch for `product_id` if demand left the balanced band
    ///
    /// # Arguments
    /// * `product_id` - Product known to the catalog
    ///
    /// # Returns
    /// * `Ok(Some(batch))` when a fast or economy batch was created
    /// * `Ok(None)` when demand is balanced (or the product has no capacity)
    pub async fn auto_create_batches(&self, product_id: &str) -> Result<Option<Batch>> {
        validation::validate_product_id(product_id)?;
        let _guard = self.locks.acquire(&product_id.to_string()).await;

        let base_price = self
            .catalog
            .base_price(product_id)
            .await
            .map_err(|e| BatchingError::Catalog(e.to_string()))?
            .ok_or_else(|| BatchingError::not_found("product", product_id))?;

        let store = self.lifecycle.store();
        let batches = store.list_batches(product_id).await?;
        let snapshot = DemandSnapshot::from_batches(&batches);
        let level = snapshot.level(&self.config);
        debug!(
            product_id,
            "Demand {}/{} is {:?}",
            snapshot.total_demand, snapshot.total_capacity, level
        );

        let (batch_type, multiplier, buyers_required) = match level {
            DemandLevel::Balanced => return Ok(None),
            DemandLevel::High => (
                BatchType::Fast,
                self.config.fast_price_multiplier,
                self.config.fast_buyers_required,
            ),
            DemandLevel::Low => (
                BatchType::Economy,
                self.config.economy_price_multiplier,
                self.config.economy_buyers_required,
            ),
        };

        // An active formation rule for the tier overrides the defaults
        let rules = store.formation_rules(product_id).await?;
        let (multiplier, buyers_required) = match rule_for(&rules, batch_type) {
            Some(rule) if rule_is_usable(rule) => (rule.price_multiplier, rule.min_buyers),
            Some(rule) => {
                warn!(
                    product_id,
                    rule_id = %rule.id,
                    "Ignoring formation rule with min_buyers {} and multiplier {}",
                    rule.min_buyers, rule.price_multiplier
                );
                (multiplier, buyers_required)
            }
            None => (multiplier, buyers_required),
        };

        let batch = self
            .lifecycle
            .create_batch(product_id, batch_type, base_price * multiplier, buyers_required)
            .await?;
        info!(
            product_id,
            batch_id = %batch.id,
            "Auto-created {} batch on {:?} demand",
            batch_type, level
        );
        Ok(Some(batch))
    }
}

/// A rule can only stand in for the defaults if it yields a valid batch
fn rule_is_usable(rule: &FormationRule) -> bool {
    rule.min_buyers > 0 && rule.price_multiplier.is_finite() && rule.price_multiplier > 0.0
}
