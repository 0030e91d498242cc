use super::{NotificationDispatcher, ProductCatalog, ShippingInitiator};
use crate::BatchId;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

/// Catalog backed by a fixed price table (see `[catalog.products]`)
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    prices: HashMap<String, f64>,
}

impl StaticCatalog {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn base_price(&self, product_id: &str) -> anyhow::Result<Option<f64>> {
        Ok(self.prices.get(product_id).copied())
    }
}

/// Notifier that only records the event in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn notify_batch_ready(&self, batch_id: BatchId) -> anyhow::Result<()> {
        info!(%batch_id, "Batch is ready for processing");
        Ok(())
    }
}

/// Shipping initiator that only records the event in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogShipper;

#[async_trait]
impl ShippingInitiator for LogShipper {
    async fn initiate_shipping(&self, batch_id: BatchId) -> anyhow::Result<()> {
        info!(%batch_id, "Initiating shipping");
        Ok(())
    }
}
