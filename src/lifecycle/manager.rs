//! Batch Lifecycle Manager
//!
//! Every mutation of a batch runs while holding that batch's lock from
//! `KeyedLocks`, spanning the precondition read and the commit. The
//! membership ledger shares the same locks so joins and cancels serialize
//! with lifecycle operations on the same batch.

use super::delivery::DELIVERY_GRACE_DAYS;
use super::transitions::{transition_batch, transition_membership};
use crate::{
    Batch, BatchId, BatchStatus, BatchType, BatchUpdate, Membership, MembershipId,
    MembershipStatus,
    collaborators::{NotificationDispatcher, ShippingInitiator, dispatch},
    error::{BatchingError, Result},
    registry::{KeyedLocks, Store, Write},
    validation,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owner of the batch state machine
pub struct BatchLifecycleManager {
    store: Arc<dyn Store>,
    /// Per-batch critical sections, shared with the membership ledger
    locks: KeyedLocks<BatchId>,
    notifier: Arc<dyn NotificationDispatcher>,
    shipper: Arc<dyn ShippingInitiator>,
}

impl BatchLifecycleManager {
    /// Creates a lifecycle manager over a store
    ///
    /// # Arguments
    /// * `store` - Persistence for batches and memberships
    /// * `notifier` - Told when a batch becomes ready
    /// * `shipper` - Handed each batch that starts processing
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationDispatcher>,
        shipper: Arc<dyn ShippingInitiator>,
    ) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            notifier,
            shipper,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Enter the critical section for `batch_id`
    pub(crate) async fn lock(&self, batch_id: BatchId) -> OwnedMutexGuard<()> {
        self.locks.acquire(&batch_id).await
    }

    /// Create a new forming batch
    ///
    /// Delivery time, speed and estimated dates derive from `batch_type`.
    ///
    /// # Arguments
    /// * `product_id` - Product the batch pools orders for
    /// * `batch_type` - Delivery tier
    /// * `price` - Unit price charged to every member
    /// * `buyers_required` - Active memberships needed before the batch is ready
    ///
    /// # Returns
    /// The stored batch, or a `ValidationError` for bad input
    pub async fn create_batch(
        &self,
        product_id: &str,
        batch_type: BatchType,
        price: f64,
        buyers_required: u32,
    ) -> Result<Batch> {
        validation::validate_new_batch(product_id, price, buyers_required)?;

        let now = Utc::now();
        let tier = batch_type.delivery_tier();
        let ship_in = Duration::days(i64::from(tier.days));

        let batch = Batch {
            id: Uuid::new_v4(),
            product_id: product_id.to_string(),
            batch_type,
            price,
            discount: 0.0,
            delivery_time: tier.label(),
            delivery_speed: tier.speed,
            buyers_required,
            current_buyers: 0,
            status: BatchStatus::Forming,
            estimated_ship_date: now + ship_in,
            estimated_delivery_date: now + ship_in + Duration::days(DELIVERY_GRACE_DAYS),
            actual_ship_date: None,
            actual_delivery_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.store.commit(vec![Write::Batch(batch.clone())]).await?;
        info!(
            batch_id = %batch.id,
            product_id = %batch.product_id,
            "Created {} batch at {:.2} requiring {} buyers",
            batch_type, price, buyers_required
        );
        Ok(batch)
    }

    pub async fn get_batch(&self, batch_id: BatchId) -> Result<Batch> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| BatchingError::not_found("batch", batch_id))
    }

    async fn active_memberships(&self, batch_id: BatchId) -> Result<Vec<Membership>> {
        let memberships = self.store.memberships_for_batch(batch_id).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| m.status.is_active())
            .collect())
    }

    /// Recount active memberships, repairing a drifted `current_buyers`.
    /// Returns whether the cached count changed.
    async fn recount(&self, batch: &mut Batch) -> Result<bool> {
        let active = self.active_memberships(batch.id).await?.len();
        Ok(reconcile_count(batch, active))
    }

    /// Send the batch-ready notification without waiting on it
    pub(crate) fn announce_ready(&self, batch_id: BatchId) {
        let notifier = self.notifier.clone();
        dispatch("batch-ready notification", batch_id, async move {
            notifier.notify_batch_ready(batch_id).await
        });
    }

    /// Promote a forming batch to ready once its threshold is met
    pub async fn evaluate_readiness(&self, batch_id: BatchId) -> Result<Batch> {
        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;
        let recounted = self.recount(&mut batch).await?;
        let became_ready = promote_if_ready(&mut batch, Utc::now())?;

        if recounted || became_ready {
            self.store.commit(vec![Write::Batch(batch.clone())]).await?;
        }
        if became_ready {
            self.announce_ready(batch_id);
        }
        Ok(batch)
    }

    /// Demote a ready batch back to forming after it lost buyers
    pub async fn regress_if_under_capacity(&self, batch_id: BatchId) -> Result<Batch> {
        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;
        let recounted = self.recount(&mut batch).await?;
        let regressed = regress_if_short(&mut batch, Utc::now())?;

        if recounted || regressed {
            self.store.commit(vec![Write::Batch(batch.clone())]).await?;
        }
        Ok(batch)
    }

    /// Start fulfillment of a ready batch
    ///
    /// Confirms every pending membership and hands the batch to shipping.
    /// A shipping failure is logged and does not undo the transition.
    ///
    /// # Returns
    /// The batch in `processing`, or `StateConflict` unless it was `ready`
    pub async fn process_batch(&self, batch_id: BatchId) -> Result<Batch> {
        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;

        if batch.status != BatchStatus::Ready {
            warn!(batch_id = %batch_id, "Refusing to process batch in status {}", batch.status);
            return Err(BatchingError::conflict(format!(
                "batch {} is {}, only ready batches can be processed",
                batch_id, batch.status
            )));
        }

        let now = Utc::now();
        transition_batch(&mut batch, BatchStatus::Processing, now)?;
        batch.actual_ship_date = Some(now);

        let mut writes = vec![Write::Batch(batch.clone())];
        for mut membership in self.store.memberships_for_batch(batch_id).await? {
            if membership.status == MembershipStatus::Pending {
                transition_membership(&mut membership, MembershipStatus::Confirmed, now)?;
                writes.push(Write::Membership(membership));
            }
        }
        let confirmed = writes.len() - 1;
        self.store.commit(writes).await?;
        info!(batch_id = %batch_id, "Batch processing with {} confirmed memberships", confirmed);

        let shipper = self.shipper.clone();
        dispatch("shipping initiation", batch_id, async move {
            shipper.initiate_shipping(batch_id).await
        });
        Ok(batch)
    }

    /// Mark a processing batch shipped
    ///
    /// Memberships named in `tracking` receive their tracking number and move
    /// to shipped. Memberships without an entry are left as they are.
    ///
    /// # Arguments
    /// * `batch_id` - A batch in `processing`
    /// * `tracking` - Tracking number per membership id
    pub async fn mark_shipped(
        &self,
        batch_id: BatchId,
        tracking: &HashMap<MembershipId, String>,
    ) -> Result<Batch> {
        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;

        if batch.status != BatchStatus::Processing {
            return Err(BatchingError::conflict(format!(
                "batch {} is {}, only processing batches can be shipped",
                batch_id, batch.status
            )));
        }

        let now = Utc::now();
        transition_batch(&mut batch, BatchStatus::Shipped, now)?;

        let mut writes = vec![Write::Batch(batch.clone())];
        let mut untracked = 0usize;
        for mut membership in self.active_memberships(batch_id).await? {
            let Some(number) = tracking.get(&membership.id) else {
                untracked += 1;
                continue;
            };
            if !membership.status.can_transition_to(MembershipStatus::Shipped) {
                warn!(
                    membership_id = %membership.id,
                    "Skipping tracking number for membership in status {}",
                    membership.status
                );
                continue;
            }
            transition_membership(&mut membership, MembershipStatus::Shipped, now)?;
            membership.tracking_number = Some(number.clone());
            writes.push(Write::Membership(membership));
        }
        let shipped = writes.len() - 1;
        self.store.commit(writes).await?;

        info!(batch_id = %batch_id, "Batch shipped, {} memberships tracked", shipped);
        if untracked > 0 {
            debug!(batch_id = %batch_id, "{} memberships shipped without tracking", untracked);
        }
        Ok(batch)
    }

    /// Close a shipped batch as delivered
    pub async fn mark_delivered(&self, batch_id: BatchId) -> Result<Batch> {
        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;

        let now = Utc::now();
        transition_batch(&mut batch, BatchStatus::Delivered, now)?;
        batch.actual_delivery_date = Some(now);

        let mut writes = vec![Write::Batch(batch.clone())];
        for mut membership in self.store.memberships_for_batch(batch_id).await? {
            if membership.status == MembershipStatus::Shipped {
                transition_membership(&mut membership, MembershipStatus::Delivered, now)?;
                writes.push(Write::Membership(membership));
            }
        }
        self.store.commit(writes).await?;
        info!(batch_id = %batch_id, "Batch delivered");
        Ok(batch)
    }

    /// Retire a batch. The status is left untouched.
    pub async fn deactivate(&self, batch_id: BatchId) -> Result<Batch> {
        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;
        if batch.is_active {
            batch.is_active = false;
            batch.updated_at = Utc::now();
            self.store.commit(vec![Write::Batch(batch.clone())]).await?;
            info!(batch_id = %batch_id, "Batch deactivated");
        }
        Ok(batch)
    }

    /// Apply an operator patch
    ///
    /// A new `buyers_required` is checked against the live count right away,
    /// so a batch can become ready or fall back to forming here.
    pub async fn update_batch(&self, batch_id: BatchId, update: BatchUpdate) -> Result<Batch> {
        validation::validate_update(&update)?;

        let _guard = self.lock(batch_id).await;
        let mut batch = self.get_batch(batch_id).await?;
        let now = Utc::now();

        if let Some(price) = update.price {
            batch.price = price;
        }
        if let Some(discount) = update.discount {
            batch.discount = discount;
        }
        if let Some(date) = update.estimated_ship_date {
            batch.estimated_ship_date = date;
        }
        if let Some(date) = update.estimated_delivery_date {
            batch.estimated_delivery_date = date;
        }
        if batch.estimated_delivery_date < batch.estimated_ship_date {
            return Err(validation::ValidationError::DeliveryBeforeShip.into());
        }
        let threshold_changed = update
            .buyers_required
            .is_some_and(|required| required != batch.buyers_required);
        if let Some(required) = update.buyers_required {
            batch.buyers_required = required;
        }
        batch.updated_at = now;

        // A new threshold settles the status in the same commit as the patch
        let mut became_ready = false;
        if threshold_changed {
            self.recount(&mut batch).await?;
            became_ready = promote_if_ready(&mut batch, now)?;
            regress_if_short(&mut batch, now)?;
        }

        self.store.commit(vec![Write::Batch(batch.clone())]).await?;
        info!(batch_id = %batch_id, "Batch updated");
        if became_ready {
            self.announce_ready(batch_id);
        }
        Ok(batch)
    }

    /// Check the cached buyer count and per-user uniqueness of one batch
    pub async fn verify_invariants(&self, batch_id: BatchId) -> Result<()> {
        let _guard = self.lock(batch_id).await;
        let batch = self.get_batch(batch_id).await?;
        let active = self.active_memberships(batch_id).await?;

        if active.len() != batch.current_buyers as usize {
            return Err(BatchingError::conflict(format!(
                "batch {} caches {} buyers but has {} active memberships",
                batch_id,
                batch.current_buyers,
                active.len()
            )));
        }

        let mut users = HashSet::new();
        for membership in &active {
            if !users.insert(membership.user_id.as_str()) {
                return Err(BatchingError::conflict(format!(
                    "user {} holds more than one active membership in batch {}",
                    membership.user_id, batch_id
                )));
            }
        }
        Ok(())
    }
}

/// Align the cached buyer count with the number of `active` memberships.
/// Returns whether it changed.
pub(crate) fn reconcile_count(batch: &mut Batch, active: usize) -> bool {
    let active = u32::try_from(active).unwrap_or(u32::MAX);
    if active == batch.current_buyers {
        return false;
    }
    warn!(
        batch_id = %batch.id,
        "Cached buyer count {} disagrees with {} active memberships, repairing",
        batch.current_buyers, active
    );
    batch.current_buyers = active;
    batch.updated_at = Utc::now();
    true
}

/// Forming to ready when the threshold is met. Returns whether it moved.
pub(crate) fn promote_if_ready(batch: &mut Batch, now: DateTime<Utc>) -> Result<bool> {
    if batch.status != BatchStatus::Forming || batch.current_buyers < batch.buyers_required {
        return Ok(false);
    }
    transition_batch(batch, BatchStatus::Ready, now)?;
    info!(
        batch_id = %batch.id,
        "Batch ready with {}/{} buyers",
        batch.current_buyers, batch.buyers_required
    );
    Ok(true)
}

/// Ready back to forming when the count fell below the threshold
pub(crate) fn regress_if_short(batch: &mut Batch, now: DateTime<Utc>) -> Result<bool> {
    if batch.status != BatchStatus::Ready || batch.current_buyers >= batch.buyers_required {
        return Ok(false);
    }
    transition_batch(batch, BatchStatus::Forming, now)?;
    info!(
        batch_id = %batch.id,
        "Batch regressed to forming with {}/{} buyers",
        batch.current_buyers, batch.buyers_required
    );
    Ok(true)
}
