//! Tests for batch policies
//!
//! Covers demand classification, auto-creation and listing order

#[cfg(test)]
mod tests {
    use crate::{
        Batch, BatchType, BatchingError, FormationRule,
        collaborators::StaticCatalog,
        config::DemandConfig,
        policy::{DemandLevel, DemandPolicyEngine, DemandSnapshot, order_by_priority, rule_for},
        registry::{Store, Write},
        testing::{Harness, harness},
    };
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;
    use uuid::Uuid;

    /// Helper function to build a demand engine over the harness with P1 priced at 100
    fn engine(h: &Harness) -> DemandPolicyEngine {
        let catalog = StaticCatalog::new(HashMap::from([("P1".to_string(), 100.0)]));
        DemandPolicyEngine::new(h.lifecycle.clone(), Arc::new(catalog), DemandConfig::default())
    }

    /// Helper function to create a batch and force its cached buyer count
    async fn seeded_batch(h: &Harness, batch_type: BatchType, required: u32, current: u32) -> Batch {
        let mut batch = h
            .lifecycle
            .create_batch("P1", batch_type, 100.0, required)
            .await
            .unwrap();
        batch.current_buyers = current;
        h.store.commit(vec![Write::Batch(batch.clone())]).await.unwrap();
        batch
    }

    /// Helper function to create an active formation rule for P1
    fn rule(batch_type: BatchType, priority: i32, min_buyers: u32, multiplier: f64) -> FormationRule {
        FormationRule {
            id: Uuid::new_v4(),
            product_id: "P1".to_string(),
            batch_type,
            min_buyers,
            max_buyers: min_buyers * 4,
            price_multiplier: multiplier,
            delivery_time_days: 3,
            priority,
            is_active: true,
        }
    }

    fn snapshot(capacity: u64, demand: u64) -> DemandSnapshot {
        DemandSnapshot {
            total_capacity: capacity,
            total_demand: demand,
        }
    }

    #[test]
    fn test_demand_levels() {
        let config = DemandConfig::default();
        assert_eq!(snapshot(100, 85).level(&config), DemandLevel::High);
        assert_eq!(snapshot(100, 80).level(&config), DemandLevel::Balanced);
        assert_eq!(snapshot(100, 30).level(&config), DemandLevel::Balanced);
        assert_eq!(snapshot(100, 29).level(&config), DemandLevel::Low);
        // No capacity: neither strict comparison holds
        assert_eq!(snapshot(0, 0).level(&config), DemandLevel::Balanced);
    }

    #[tokio::test]
    async fn test_high_demand_creates_one_fast_batch() {
        let h = harness();
        seeded_batch(&h, BatchType::Standard, 60, 50).await;
        seeded_batch(&h, BatchType::Economy, 40, 35).await;

        let created = engine(&h).auto_create_batches("P1").await.unwrap().unwrap();
        assert_eq!(created.batch_type, BatchType::Fast);
        assert!((created.price - 120.0).abs() < 1e-9);
        assert_eq!(created.buyers_required, 25);

        let batches = h.store.list_batches("P1").await.unwrap();
        assert_eq!(batches.len(), 3);
        let economy = batches.iter().filter(|b| b.batch_type == BatchType::Economy).count();
        assert_eq!(economy, 1);
    }

    #[tokio::test]
    async fn test_low_demand_creates_economy_batch() {
        let h = harness();
        seeded_batch(&h, BatchType::Standard, 100, 10).await;

        let created = engine(&h).auto_create_batches("P1").await.unwrap().unwrap();
        assert_eq!(created.batch_type, BatchType::Economy);
        assert!((created.price - 80.0).abs() < 1e-9);
        assert_eq!(created.buyers_required, 100);
        assert_eq!(created.delivery_time, "14 days");
    }

    #[tokio::test]
    async fn test_repeated_calls_see_previous_batch() {
        let h = harness();
        seeded_batch(&h, BatchType::Standard, 100, 85).await;
        let engine = engine(&h);

        assert!(engine.auto_create_batches("P1").await.unwrap().is_some());
        // 85 of 125 is inside the band
        assert!(engine.auto_create_batches("P1").await.unwrap().is_none());
        assert_eq!(h.store.list_batches("P1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retired_batches_do_not_count() {
        let h = harness();
        let retired = seeded_batch(&h, BatchType::Standard, 100, 0).await;
        h.lifecycle.deactivate(retired.id).await.unwrap();
        seeded_batch(&h, BatchType::Standard, 10, 5).await;

        assert!(engine(&h).auto_create_batches("P1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_batches_creates_nothing() {
        let h = harness();
        assert!(engine(&h).auto_create_batches("P1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let h = harness();
        let err = engine(&h).auto_create_batches("P404").await.unwrap_err();
        assert!(matches!(err, BatchingError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn test_formation_rule_overrides_fast_defaults() {
        let h = harness();
        seeded_batch(&h, BatchType::Standard, 10, 10).await;
        h.store
            .put_formation_rule(rule(BatchType::Fast, 1, 15, 1.5))
            .await
            .unwrap();

        let created = engine(&h).auto_create_batches("P1").await.unwrap().unwrap();
        assert_eq!(created.buyers_required, 15);
        assert!((created.price - 150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rule_with_bad_multiplier_falls_back_to_defaults() {
        let h = harness();
        seeded_batch(&h, BatchType::Standard, 10, 10).await;
        h.store
            .put_formation_rule(rule(BatchType::Fast, 1, 15, 0.0))
            .await
            .unwrap();

        let created = engine(&h).auto_create_batches("P1").await.unwrap().unwrap();
        assert_eq!(created.buyers_required, 25);
        assert!((created.price - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_rule_for_ignores_inactive_rules() {
        let mut inactive = rule(BatchType::Fast, 99, 10, 2.0);
        inactive.is_active = false;
        let active = rule(BatchType::Fast, 1, 10, 1.1);
        let rules = vec![inactive, active.clone()];

        assert_eq!(rule_for(&rules, BatchType::Fast), Some(&active));
        assert_eq!(rule_for(&rules, BatchType::Economy), None);
    }

    #[tokio::test]
    async fn test_order_by_priority_then_age() {
        let h = harness();
        let mut older = seeded_batch(&h, BatchType::Standard, 10, 0).await;
        older.created_at = Utc::now() - Duration::days(2);
        let newer = seeded_batch(&h, BatchType::Standard, 10, 0).await;
        let boosted = seeded_batch(&h, BatchType::Ultimate, 10, 0).await;

        let ordered = order_by_priority(
            vec![newer.clone(), boosted.clone(), older.clone()],
            &[rule(BatchType::Ultimate, 5, 10, 1.0)],
        );
        let ids: Vec<_> = ordered.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![boosted.id, older.id, newer.id]);
    }

    #[test]
    fn test_empty_batch_list() {
        assert!(order_by_priority(vec![], &[]).is_empty());
    }
}
