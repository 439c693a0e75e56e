use std::env;

// Configuration for the shovel sync engine
#[derive(Clone)]
pub struct Config {
    pub db_url: String,        // Shovel database connection URL
    pub bind_addr: String,     // Address for the HTTP status server
    pub start_block: i64,      // Cursor starting point, one block before the first record of interest
    pub batch_size: i64,       // Max blocks per pass through the indexer layers
    pub slow_lag: i64,         // Fast/slow cursor gap that triggers a slow pass
    pub tick_interval_ms: u64, // Period of the live indexing tick
    pub max_connections: u32,  // Database pool size cap
}

impl Config {
    // Loads configuration from environment variables, with defaults for optional fields
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let config = Config {
            // Required: shovel database connection URL
            db_url: env::var("SHOVEL_DATABASE_URL").map_err(|_| "SHOVEL_DATABASE_URL must be set")?,
            // Optional: HTTP bind address (defaults to 0.0.0.0:8080)
            bind_addr: env::var("BIND_ADDR").unwrap_or("0.0.0.0:8080".to_string()),
            // Optional: starting block (defaults to one block before the first record of interest)
            start_block: env::var("START_BLOCK")
                .unwrap_or("5699999".to_string())
                .parse()
                .unwrap_or(5_699_999),
            // Optional: batch size ceiling (defaults to 100000)
            batch_size: env::var("BATCH_SIZE")
                .unwrap_or("100000".to_string())
                .parse()
                .unwrap_or(100_000),
            // Optional: slow-pass lag threshold in blocks (defaults to 3)
            slow_lag: env::var("SLOW_LAG").unwrap_or("3".to_string()).parse().unwrap_or(3),
            // Optional: live tick period in milliseconds (defaults to 1000)
            tick_interval_ms: env::var("TICK_INTERVAL_MS")
                .unwrap_or("1000".to_string())
                .parse()
                .unwrap_or(1000),
            // Optional: database pool size (defaults to 8)
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or("8".to_string())
                .parse()
                .unwrap_or(8),
        };

        // Validate required fields
        if config.db_url.is_empty() {
            return Err("SHOVEL_DATABASE_URL must be set".into());
        }
        if config.batch_size < 1 {
            return Err("BATCH_SIZE must be a positive number of blocks".into());
        }

        Ok(config)
    }
}
