//! Batch Policy Module
//!
//! Policies that read formation rules and aggregate demand:
//! - `DemandPolicyEngine`: opens new batches when a product's demand ratio
//!   leaves the configured band
//! - `order_by_priority`: listing order of a product's batches
//!
//! Formation rules are read-only input here.

mod demand;
mod ordering;

#[cfg(test)]
mod tests;

pub use demand::{DemandLevel, DemandPolicyEngine, DemandSnapshot};
pub use ordering::{order_by_priority, rule_for};
