//! Membership Ledger Module
//!
//! Records buyer commitments to batches and keeps each batch's cached
//! buyer count in step with its active memberships.

mod membership;


pub use membership::MembershipLedger;
