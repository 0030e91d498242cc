use groupbuy::{
    AnalyticsAggregator, BatchLifecycleManager, DemandPolicyEngine, MembershipLedger,
    api::{AppState, Server},
    collaborators::{LogNotifier, LogShipper, StaticCatalog},
    config::{Config, LoggingConfig},
    registry::{MemoryStore, SqliteStore, Store},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Loads configuration, opens the store, wires the engine components and
/// serves the JSON-RPC API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    init_logging(&config.logging);
    info!("Batching service starting with config: {:?}", config);

    let store: Arc<dyn Store> = if config.database.is_memory() {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::connect(&config.database.url).await?)
    };

    let lifecycle = Arc::new(BatchLifecycleManager::new(
        store.clone(),
        Arc::new(LogNotifier),
        Arc::new(LogShipper),
    ));
    let ledger = Arc::new(MembershipLedger::new(lifecycle.clone()));
    let catalog = Arc::new(StaticCatalog::new(config.catalog.products.clone()));
    let demand = Arc::new(DemandPolicyEngine::new(
        lifecycle.clone(),
        catalog,
        config.demand.clone(),
    ));
    let analytics = Arc::new(AnalyticsAggregator::new(store));

    let state = AppState {
        lifecycle,
        ledger,
        demand,
        analytics,
    };
    Server::new(config.api, state).start().await?;

    Ok(())
}
