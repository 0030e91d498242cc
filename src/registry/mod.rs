//! Persistence Registry Module
//!
//! Durable storage for batches, memberships and formation rules:
//! - `Store`: the storage port every component reads and writes through
//! - `MemoryStore`: in-process implementation
//! - `SqliteStore`: sqlx-backed implementation
//! - `KeyedLocks`: per-key critical sections layered over either store

mod database;
mod locks;
mod memory;

pub use database::SqliteStore;
pub use locks::KeyedLocks;
pub use memory::MemoryStore;

use crate::{Batch, BatchId, FormationRule, Membership, MembershipId, error::StoreError};
use async_trait::async_trait;

/// One upsert inside an atomic commit
#[derive(Debug, Clone)]
pub enum Write {
    Batch(Batch),
    Membership(Membership),
}

/// Storage port
///
/// Reads return owned snapshots. `commit` applies every write or none of them.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;

    /// Every batch of a product, retired ones included, oldest first
    async fn list_batches(&self, product_id: &str) -> Result<Vec<Batch>, StoreError>;

    async fn get_membership(&self, id: MembershipId) -> Result<Option<Membership>, StoreError>;

    /// All memberships of a batch, cancelled ones included, oldest first
    async fn memberships_for_batch(&self, batch_id: BatchId)
    -> Result<Vec<Membership>, StoreError>;

    /// All memberships of a user, cancelled ones included, newest first
    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, StoreError>;

    async fn memberships_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<Membership>, StoreError>;

    async fn formation_rules(&self, product_id: &str) -> Result<Vec<FormationRule>, StoreError>;

    async fn put_formation_rule(&self, rule: FormationRule) -> Result<(), StoreError>;

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}
