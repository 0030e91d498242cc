use super::{Store, Write};
use crate::{Batch, BatchId, FormationRule, Membership, MembershipId, error::StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    batches: HashMap<BatchId, Batch>,
    memberships: HashMap<MembershipId, Membership>,
    rules: HashMap<Uuid, FormationRule>,
}

/// In-process store
///
/// All tables sit behind one lock, so a commit is visible all at once and
/// every read sees a consistent snapshot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.batches.get(&id).cloned())
    }

    async fn list_batches(&self, product_id: &str) -> Result<Vec<Batch>, StoreError> {
        let tables = self.tables.read().await;
        let mut batches: Vec<Batch> = tables
            .batches
            .values()
            .filter(|b| b.product_id == product_id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.created_at);
        Ok(batches)
    }

    async fn get_membership(&self, id: MembershipId) -> Result<Option<Membership>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.memberships.get(&id).cloned())
    }

    async fn memberships_for_batch(
        &self,
        batch_id: BatchId,
    ) -> Result<Vec<Membership>, StoreError> {
        let tables = self.tables.read().await;
        let mut memberships: Vec<Membership> = tables
            .memberships
            .values()
            .filter(|m| m.batch_id == batch_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships)
    }

    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, StoreError> {
        let tables = self.tables.read().await;
        let mut memberships: Vec<Membership> = tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(memberships)
    }

    async fn memberships_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<Membership>, StoreError> {
        let tables = self.tables.read().await;
        let mut memberships: Vec<Membership> = tables
            .memberships
            .values()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships)
    }

    async fn formation_rules(&self, product_id: &str) -> Result<Vec<FormationRule>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rules
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn put_formation_rule(&self, rule: FormationRule) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for write in writes {
            match write {
                Write::Batch(batch) => {
                    tables.batches.insert(batch.id, batch);
                }
                Write::Membership(membership) => {
                    tables.memberships.insert(membership.id, membership);
                }
            }
        }
        Ok(())
    }
}
