//! External Collaborators Module
//!
//! Interfaces to services outside the batching engine:
//! - `ProductCatalog`: base prices for demand-driven batch creation
//! - `NotificationDispatcher`: tells buyers a batch reached its threshold
//! - `ShippingInitiator`: hands a processed batch to fulfillment
//!
//! Notification and shipping are fire-and-forget: `dispatch` runs them on a
//! background task and only logs failures.

mod defaults;

pub use defaults::{LogNotifier, LogShipper, StaticCatalog};

use crate::BatchId;
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn};

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` when the product is unknown
    async fn base_price(&self, product_id: &str) -> anyhow::Result<Option<f64>>;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify_batch_ready(&self, batch_id: BatchId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ShippingInitiator: Send + Sync {
    async fn initiate_shipping(&self, batch_id: BatchId) -> anyhow::Result<()>;
}

/// Run a side effect in the background, logging instead of propagating errors
pub fn dispatch<F>(what: &'static str, batch_id: BatchId, effect: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match effect.await {
            Ok(()) => debug!(%batch_id, "{} dispatched", what),
            Err(e) => warn!(%batch_id, "{} failed: {:?}", what, e),
        }
    });
}
