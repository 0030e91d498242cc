//! Batch Lifecycle Module
//!
//! Owns the batch state machine:
//! - `BatchLifecycleManager`: creation, readiness, regression, fulfillment
//! - `transitions`: the closed table of legal status moves
//! - `delivery`: delivery tier lookup per batch type
//!
//! # State Machine
//! `forming -> ready -> processing -> shipped -> delivered`, with
//! `ready -> forming` as the only backwards move. `is_active` is a separate
//! retirement flag and never changes the status.

mod delivery;
mod manager;
mod transitions;


pub use delivery::{DELIVERY_GRACE_DAYS, DeliveryTier};
pub use manager::BatchLifecycleManager;
pub(crate) use manager::{promote_if_ready, reconcile_count, regress_if_short};
pub use transitions::{transition_batch, transition_membership};
