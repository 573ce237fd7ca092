//! Application configuration loaded from environment variables.

use engine::{
    BatchPolicy, DEFAULT_MAX_BATCH_ITEMS, DEFAULT_MAX_WAIT_MS, DEFAULT_QUEUE_CAPACITY, EngineConfig,
};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string (in-memory store if unset)
/// - `SEED_STOCK` — initial quantities, e.g. `"SKU-001=100,SKU-002=50"`
/// - `QUEUE_CAPACITY` — admission queue bound (default: `4096`)
/// - `BATCH_MAX_ITEMS` — item lines per batch (default: `256`)
/// - `BATCH_MAX_WAIT_MS` — batch close deadline in ms (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub seed_stock: Option<String>,
    pub queue_capacity: usize,
    pub batch_max_items: usize,
    pub batch_max_wait_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            seed_stock: std::env::var("SEED_STOCK").ok(),
            queue_capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            batch_max_items: std::env::var("BATCH_MAX_ITEMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_BATCH_ITEMS),
            batch_max_wait_ms: std::env::var("BATCH_MAX_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_WAIT_MS),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the engine configuration from the tunable knobs.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            queue_capacity: self.queue_capacity,
            policy: BatchPolicy {
                max_batch_items: self.batch_max_items,
                max_wait: std::time::Duration::from_millis(self.batch_max_wait_ms),
            },
            ..EngineConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            seed_stock: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_max_items: DEFAULT_MAX_BATCH_ITEMS,
            batch_max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

/// Parses a `SEED_STOCK` value into product/quantity pairs.
///
/// Malformed pairs are skipped.
pub fn parse_seed(raw: &str) -> Vec<(String, u32)> {
    raw.split(',')
        .filter_map(|pair| {
            let (product, quantity) = pair.split_once('=')?;
            Some((product.trim().to_string(), quantity.trim().parse().ok()?))
        })
        .collect()
}
