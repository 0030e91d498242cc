use crate::{
    Batch, BatchAnalytics, BatchId, Membership, error::Result, registry::Store, validation,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Read-only rollups over a product's batches
pub struct AnalyticsAggregator {
    store: Arc<dyn Store>,
}

impl AnalyticsAggregator {
    /// Creates an aggregator reading from `store`
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Metrics for one product
    ///
    /// `revenue_generated` is committed exposure, not settled revenue: it sums
    /// every non-cancelled membership, including those in batches that are
    /// still forming and may never ship.
    ///
    /// # Arguments
    /// * `product_id` - Product whose batches are summarized, retired ones included
    ///
    /// # Returns
    /// `BatchAnalytics` with every field zeroed when the product has no batches
    pub async fn compute_batch_analytics(&self, product_id: &str) -> Result<BatchAnalytics> {
        validation::validate_product_id(product_id)?;
        let batches = self.store.list_batches(product_id).await?;
        let memberships = self.store.memberships_for_product(product_id).await?;
        let analytics = summarize(&batches, &memberships);
        debug!(product_id, "Computed analytics over {} batches", analytics.total_batches);
        Ok(analytics)
    }
}

/// Fold batches and their memberships into `BatchAnalytics`
///
/// Memberships whose batch is not in `batches` are ignored.
pub fn summarize(batches: &[Batch], memberships: &[Membership]) -> BatchAnalytics {
    let total_batches = batches.len();
    if total_batches == 0 {
        return BatchAnalytics::default();
    }

    let batch_ids: HashSet<BatchId> = batches.iter().map(|b| b.id).collect();
    let active: Vec<&Membership> = memberships
        .iter()
        .filter(|m| m.status.is_active() && batch_ids.contains(&m.batch_id))
        .collect();

    let completed = batches.iter().filter(|b| b.status.is_completed());
    let completed_count = completed.clone().count();

    let ship_days: Vec<f64> = completed
        .filter_map(|b| b.actual_ship_date.map(|shipped| shipped - b.created_at))
        .map(|elapsed| elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY)
        .collect();
    let average_delivery_time = if ship_days.is_empty() {
        0.0
    } else {
        ship_days.iter().sum::<f64>() / ship_days.len() as f64
    };

    let required: u64 = batches.iter().map(|b| u64::from(b.buyers_required)).sum();

    BatchAnalytics {
        total_batches,
        active_batches: batches.iter().filter(|b| b.is_active).count(),
        total_orders: active.len(),
        average_batch_size: required as f64 / total_batches as f64,
        completion_rate: completed_count as f64 / total_batches as f64,
        average_delivery_time,
        revenue_generated: active.iter().map(|m| m.total_price).sum(),
    }
}
