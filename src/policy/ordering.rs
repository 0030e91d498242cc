use crate::{Batch, BatchType, FormationRule};
use std::cmp::Reverse;

/// Highest-priority active rule for a batch type
pub fn rule_for(rules: &[FormationRule], batch_type: BatchType) -> Option<&FormationRule> {
    rules
        .iter()
        .filter(|r| r.is_active && r.batch_type == batch_type)
        .max_by_key(|r| r.priority)
}

/// Sort by rule priority (descending, 0 without a rule), then by creation time
pub fn order_by_priority(mut batches: Vec<Batch>, rules: &[FormationRule]) -> Vec<Batch> {
    batches.sort_by_key(|b| {
        let priority = rule_for(rules, b.batch_type).map_or(0, |r| r.priority);
        (Reverse(priority), b.created_at)
    });
    batches
}
