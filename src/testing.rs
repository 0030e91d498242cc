//! Shared fixtures for unit tests

use crate::{
    Batch, BatchId, BatchLifecycleManager, FormationRule, Membership, MembershipId,
    MembershipLedger,
    collaborators::{NotificationDispatcher, ShippingInitiator},
    error::StoreError,
    registry::{MemoryStore, Store, Write},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Forwards every ready notification to a channel
pub(crate) struct RecordingNotifier(UnboundedSender<BatchId>);

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify_batch_ready(&self, batch_id: BatchId) -> anyhow::Result<()> {
        self.0.send(batch_id)?;
        Ok(())
    }
}

/// Forwards the batch id, then fails
pub(crate) struct FailingShipper(UnboundedSender<BatchId>);

#[async_trait]
impl ShippingInitiator for FailingShipper {
    async fn initiate_shipping(&self, batch_id: BatchId) -> anyhow::Result<()> {
        self.0.send(batch_id)?;
        anyhow::bail!("carrier unavailable")
    }
}

pub(crate) struct Harness {
    pub store: MemoryStore,
    pub lifecycle: Arc<BatchLifecycleManager>,
    pub ledger: MembershipLedger,
    pub notified: UnboundedReceiver<BatchId>,
    pub shipped: UnboundedReceiver<BatchId>,
}

/// Memory store whose commits can be switched to fail
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn fail_commits(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        self.inner.get_batch(id).await
    }

    async fn list_batches(&self, product_id: &str) -> Result<Vec<Batch>, StoreError> {
        self.inner.list_batches(product_id).await
    }

    async fn get_membership(&self, id: MembershipId) -> Result<Option<Membership>, StoreError> {
        self.inner.get_membership(id).await
    }

    async fn memberships_for_batch(
        &self,
        batch_id: BatchId,
    ) -> Result<Vec<Membership>, StoreError> {
        self.inner.memberships_for_batch(batch_id).await
    }

    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, StoreError> {
        self.inner.memberships_for_user(user_id).await
    }

    async fn memberships_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<Membership>, StoreError> {
        self.inner.memberships_for_product(product_id).await
    }

    async fn formation_rules(&self, product_id: &str) -> Result<Vec<FormationRule>, StoreError> {
        self.inner.formation_rules(product_id).await
    }

    async fn put_formation_rule(&self, rule: FormationRule) -> Result<(), StoreError> {
        self.inner.put_formation_rule(rule).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.commit(writes).await
    }
}

fn build(store: MemoryStore, backing: Arc<dyn Store>) -> Harness {
    let (notify_tx, notified) = unbounded_channel();
    let (ship_tx, shipped) = unbounded_channel();
    let lifecycle = Arc::new(BatchLifecycleManager::new(
        backing,
        Arc::new(RecordingNotifier(notify_tx)),
        Arc::new(FailingShipper(ship_tx)),
    ));
    let ledger = MembershipLedger::new(lifecycle.clone());
    Harness {
        store,
        lifecycle,
        ledger,
        notified,
        shipped,
    }
}

pub(crate) fn harness() -> Harness {
    let store = MemoryStore::new();
    build(store.clone(), Arc::new(store))
}

/// Harness over a `FlakyStore`; `Harness::store` sees the same tables
pub(crate) fn flaky_harness() -> (Harness, Arc<FlakyStore>) {
    let store = MemoryStore::new();
    let flaky = Arc::new(FlakyStore {
        inner: store.clone(),
        failing: AtomicBool::new(false),
    });
    (build(store, flaky.clone()), flaky)
}
