//! Batch Analytics Module
//!
//! Read-only rollups over every batch of a product, retired ones included.

mod aggregator;
pub use aggregator::{AnalyticsAggregator, summarize};
