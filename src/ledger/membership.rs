//! Membership Ledger
//!
//! Joins and cancels hold the batch lock across the precondition check and
//! the commit. The membership, the recounted batch and any status change it
//! causes go to the store as one write set.

use crate::{
    Batch, BatchId, Membership, MembershipId, MembershipStatus, MembershipWithBatch,
    PaymentStatus,
    error::{BatchingError, Result},
    lifecycle::{
        BatchLifecycleManager, promote_if_ready, reconcile_count, regress_if_short,
        transition_membership,
    },
    policy::order_by_priority,
    registry::Write,
    validation,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Records which buyers hold a place in which batch
pub struct MembershipLedger {
    lifecycle: Arc<BatchLifecycleManager>,
}

impl MembershipLedger {
    /// Creates a ledger that shares the lifecycle manager's store and batch locks
    pub fn new(lifecycle: Arc<BatchLifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Commit a buyer to a batch
    ///
    /// The batch must be active and still forming or ready, and the user
    /// must not already hold an active membership in it. Joining past
    /// `buyers_required` is allowed.
    ///
    /// # Arguments
    /// * `batch_id` - Batch to join
    /// * `user_id` - Buyer joining
    /// * `quantity` - Units ordered, priced at the batch price as of now
    /// * `shipping_address` - Where this membership ships to
    ///
    /// # Returns
    /// The new pending membership. On error nothing is written.
    pub async fn join(
        &self,
        batch_id: BatchId,
        user_id: &str,
        quantity: u32,
        shipping_address: &str,
    ) -> Result<Membership> {
        validation::validate_join(user_id, quantity, shipping_address)?;

        let _guard = self.lifecycle.lock(batch_id).await;
        let store = self.lifecycle.store();
        let mut batch = self.lifecycle.get_batch(batch_id).await?;

        if !batch.is_active {
            warn!(batch_id = %batch_id, user_id, "Join rejected: batch is retired");
            return Err(BatchingError::conflict(format!("batch {batch_id} is not available")));
        }
        if !batch.status.accepts_joins() {
            warn!(batch_id = %batch_id, user_id, "Join rejected: batch is {}", batch.status);
            return Err(BatchingError::conflict(format!(
                "batch {} is {} and not accepting new orders",
                batch_id, batch.status
            )));
        }

        let existing = store.memberships_for_batch(batch_id).await?;
        let mut active = 0usize;
        for m in existing.iter().filter(|m| m.status.is_active()) {
            if m.user_id == user_id {
                warn!(batch_id = %batch_id, user_id, "Join rejected: duplicate membership");
                return Err(BatchingError::conflict(format!(
                    "user {user_id} already in batch {batch_id}"
                )));
            }
            active += 1;
        }

        let now = Utc::now();
        let membership = Membership {
            id: Uuid::new_v4(),
            batch_id,
            user_id: user_id.to_string(),
            product_id: batch.product_id.clone(),
            quantity,
            total_price: batch.price * f64::from(quantity),
            status: MembershipStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_address: shipping_address.to_string(),
            tracking_number: None,
            created_at: now,
            updated_at: now,
        };

        batch.current_buyers = batch.current_buyers.saturating_add(1);
        batch.updated_at = now;
        reconcile_count(&mut batch, active + 1);
        let became_ready = promote_if_ready(&mut batch, now)?;

        store
            .commit(vec![
                Write::Membership(membership.clone()),
                Write::Batch(batch),
            ])
            .await?;
        info!(
            batch_id = %batch_id,
            user_id,
            membership_id = %membership.id,
            "User joined batch with quantity {}",
            quantity
        );

        if became_ready {
            self.lifecycle.announce_ready(batch_id);
        }
        Ok(membership)
    }

    /// Cancel a pending membership owned by `user_id`
    ///
    /// A membership owned by someone else is reported as not found.
    ///
    /// # Returns
    /// The cancelled membership, or `StateConflict` once it left `pending`
    pub async fn cancel(&self, membership_id: MembershipId, user_id: &str) -> Result<Membership> {
        validation::validate_cancel(user_id)?;

        let store = self.lifecycle.store();
        let batch_id = match store.get_membership(membership_id).await? {
            Some(m) if m.user_id == user_id => m.batch_id,
            _ => return Err(BatchingError::not_found("membership", membership_id)),
        };

        let _guard = self.lifecycle.lock(batch_id).await;
        // Re-read under the lock; a concurrent operation may have moved it
        let mut membership = store
            .get_membership(membership_id)
            .await?
            .ok_or_else(|| BatchingError::not_found("membership", membership_id))?;

        if membership.status != MembershipStatus::Pending {
            warn!(
                membership_id = %membership_id,
                "Cancel rejected: membership is {}",
                membership.status
            );
            return Err(BatchingError::conflict(format!(
                "membership {} is {} and cannot be cancelled",
                membership_id, membership.status
            )));
        }

        let now = Utc::now();
        transition_membership(&mut membership, MembershipStatus::Cancelled, now)?;

        let mut batch = self.lifecycle.get_batch(batch_id).await?;
        let remaining = store
            .memberships_for_batch(batch_id)
            .await?
            .iter()
            .filter(|m| m.id != membership_id && m.status.is_active())
            .count();
        batch.current_buyers = batch.current_buyers.saturating_sub(1);
        batch.updated_at = now;
        reconcile_count(&mut batch, remaining);
        regress_if_short(&mut batch, now)?;

        store
            .commit(vec![
                Write::Membership(membership.clone()),
                Write::Batch(batch),
            ])
            .await?;
        info!(batch_id = %batch_id, user_id, membership_id = %membership_id, "Membership cancelled");
        Ok(membership)
    }

    /// Active memberships of a user, newest first, each with its batch
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<MembershipWithBatch>> {
        let store = self.lifecycle.store();
        let memberships = store.memberships_for_user(user_id).await?;

        let mut batches: HashMap<BatchId, Batch> = HashMap::new();
        let mut result = Vec::new();
        for membership in memberships.into_iter().filter(|m| m.status.is_active()) {
            if !batches.contains_key(&membership.batch_id) {
                match store.get_batch(membership.batch_id).await? {
                    Some(batch) => {
                        batches.insert(batch.id, batch);
                    }
                    None => {
                        warn!(
                            membership_id = %membership.id,
                            "Membership references missing batch {}",
                            membership.batch_id
                        );
                        continue;
                    }
                }
            }
            if let Some(batch) = batches.get(&membership.batch_id) {
                result.push(MembershipWithBatch {
                    batch: batch.clone(),
                    membership,
                });
            }
        }
        Ok(result)
    }

    /// Active memberships of one batch, oldest first
    pub async fn list_for_batch(&self, batch_id: BatchId) -> Result<Vec<Membership>> {
        // Surface NotFound for unknown ids instead of an empty list
        self.lifecycle.get_batch(batch_id).await?;
        let memberships = self.lifecycle.store().memberships_for_batch(batch_id).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| m.status.is_active())
            .collect())
    }

    /// Active batches of a product, highest formation-rule priority first,
    /// then oldest first
    pub async fn list_for_batch_product(&self, product_id: &str) -> Result<Vec<Batch>> {
        validation::validate_product_id(product_id)?;
        let store = self.lifecycle.store();
        let batches = store.list_batches(product_id).await?;
        let rules = store.formation_rules(product_id).await?;
        let active = batches.into_iter().filter(|b| b.is_active).collect();
        Ok(order_by_priority(active, &rules))
    }
}
