//! Group-buying engine: pools individual buyers into shared fulfillment
//! batches, tracks batch readiness and drives each batch through shipping.

pub mod types; // Batch, Membership, FormationRule and their status enums.
pub mod error; // Caller-visible error taxonomy.
pub mod config; // TOML configuration.
pub mod validation; // Input checks run before any state is read.
pub mod registry; // Persistence port, stores and per-key locks.
pub mod collaborators; // Catalog, notification and shipping interfaces.
pub mod lifecycle; // Batch state machine.
pub mod ledger; // Buyer memberships and the cached buyer count.
pub mod policy; // Demand-driven batch creation and listing order.
pub mod analytics; // Read-only rollups per product.
pub mod api; // JSON-RPC adapter.

#[cfg(test)]
pub(crate) mod testing;

// Re-export the engine components and domain types for easier access.
pub use types::*;
pub use config::Config;
pub use error::{BatchingError, Result};
pub use analytics::AnalyticsAggregator;
pub use ledger::MembershipLedger;
pub use lifecycle::BatchLifecycleManager;
pub use policy::DemandPolicyEngine;
