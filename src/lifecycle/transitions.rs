use crate::{Batch, BatchStatus, Membership, MembershipStatus, error::BatchingError};
use chrono::{DateTime, Utc};

impl BatchStatus {
    /// Statuses reachable in one step
    pub fn successors(&self) -> &'static [BatchStatus] {
        match self {
            BatchStatus::Forming => &[BatchStatus::Ready],
            BatchStatus::Ready => &[BatchStatus::Forming, BatchStatus::Processing],
            BatchStatus::Processing => &[BatchStatus::Shipped],
            BatchStatus::Shipped => &[BatchStatus::Delivered],
            BatchStatus::Delivered => &[],
        }
    }

    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl MembershipStatus {
    pub fn successors(&self) -> &'static [MembershipStatus] {
        match self {
            MembershipStatus::Pending => &[MembershipStatus::Confirmed, MembershipStatus::Cancelled],
            MembershipStatus::Confirmed => &[MembershipStatus::Shipped],
            MembershipStatus::Shipped => &[MembershipStatus::Delivered],
            MembershipStatus::Delivered => &[],
            MembershipStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: MembershipStatus) -> bool {
        self.successors().contains(&next)
    }
}

/// Move a batch to `next`, refusing anything outside the table
pub fn transition_batch(
    batch: &mut Batch,
    next: BatchStatus,
    now: DateTime<Utc>,
) -> Result<(), BatchingError> {
    if !batch.status.can_transition_to(next) {
        return Err(BatchingError::conflict(format!(
            "batch {} cannot move from {} to {}",
            batch.id, batch.status, next
        )));
    }
    batch.status = next;
    batch.updated_at = now;
    Ok(())
}

pub fn transition_membership(
    membership: &mut Membership,
    next: MembershipStatus,
    now: DateTime<Utc>,
) -> Result<(), BatchingError> {
    if !membership.status.can_transition_to(next) {
        return Err(BatchingError::conflict(format!(
            "membership {} cannot move from {} to {}",
            membership.id, membership.status, next
        )));
    }
    membership.status = next;
    membership.updated_at = now;
    Ok(())
}
