#![allow(dead_code)]

use groupbuy::{
    AnalyticsAggregator, BatchLifecycleManager, DemandPolicyEngine, MembershipLedger,
    api::AppState,
    collaborators::{LogNotifier, LogShipper, StaticCatalog},
    config::DemandConfig,
    registry::{MemoryStore, SqliteStore, Store},
};
use std::collections::HashMap;
use std::sync::Arc;

/// Fully wired engine over one store
pub struct Engine {
    pub store: Arc<dyn Store>,
    pub lifecycle: Arc<BatchLifecycleManager>,
    pub ledger: Arc<MembershipLedger>,
    pub demand: Arc<DemandPolicyEngine>,
    pub analytics: Arc<AnalyticsAggregator>,
}

impl Engine {
    pub fn over(store: Arc<dyn Store>) -> Self {
        let lifecycle = Arc::new(BatchLifecycleManager::new(
            store.clone(),
            Arc::new(LogNotifier),
            Arc::new(LogShipper),
        ));
        let catalog = StaticCatalog::new(HashMap::from([("P1".to_string(), 100.0)]));
        Self {
            store: store.clone(),
            ledger: Arc::new(MembershipLedger::new(lifecycle.clone())),
            demand: Arc::new(DemandPolicyEngine::new(
                lifecycle.clone(),
                Arc::new(catalog),
                DemandConfig::default(),
            )),
            analytics: Arc::new(AnalyticsAggregator::new(store)),
            lifecycle,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            lifecycle: self.lifecycle.clone(),
            ledger: self.ledger.clone(),
            demand: self.demand.clone(),
            analytics: self.analytics.clone(),
        }
    }
}

pub fn memory_engine() -> Engine {
    Engine::over(Arc::new(MemoryStore::new()))
}

pub async fn sqlite_engine() -> Engine {
    let store = SqliteStore::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should open");
    Engine::over(Arc::new(store))
}
