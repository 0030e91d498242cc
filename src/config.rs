//! Configuration Module
//!
//! This module defines all configuration structures for the batching service.
//! Configuration is loaded from TOML files and parsed using serde.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// Main configuration structure
///
/// Loaded from a TOML file (e.g., config/default.toml).
///
/// # Example TOML
/// ```toml
/// [api]
/// host = "127.0.0.1"
/// port = 8080
///
/// [database]
/// url = "sqlite://groupbuy.db"
///
/// [demand]
/// high_demand_ratio = 0.8
/// low_demand_ratio = 0.3
///
/// [catalog.products]
/// P1 = 100.0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub demand: DemandConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Persistence configuration
///
/// `url = "memory"` selects the in-process store; any other value is
/// treated as a SQLite connection URL (e.g., "sqlite://groupbuy.db").
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

/// Demand-driven batch creation thresholds
///
/// The demand ratio is the summed `current_buyers` over the summed
/// `buyers_required` of a product's active batches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    /// Above this ratio a fast batch is opened
    pub high_demand_ratio: f64,
    /// Below this ratio an economy batch is opened
    pub low_demand_ratio: f64,
    pub fast_price_multiplier: f64,
    pub fast_buyers_required: u32,
    pub economy_price_multiplier: f64,
    pub economy_buyers_required: u32,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            high_demand_ratio: 0.8,
            low_demand_ratio: 0.3,
            fast_price_multiplier: 1.2,
            fast_buyers_required: 25,
            economy_price_multiplier: 0.8,
            economy_buyers_required: 100,
        }
    }
}

/// Base prices served by the built-in product catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub products: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
