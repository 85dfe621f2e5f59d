use crate::Interval;

/// Process configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Universe
    pub symbols: Vec<String>,
    pub reference_symbol: String,
    pub interval: Interval,

    // Scheduling
    pub scan_period_secs: u64,
    pub top_n: usize,

    // Exchange
    pub exchange_base_url: String,

    // Pipeline tuning file (optional on disk)
    pub pipeline_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing or malformed required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let symbols: Vec<String> = required_env("SCANNER_SYMBOLS")
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            panic!("SCANNER_SYMBOLS must list at least one symbol");
        }

        let interval = optional_env("SCAN_INTERVAL")
            .unwrap_or_else(|| "4h".to_string())
            .parse::<Interval>()
            .unwrap_or_else(|e| panic!("ERROR: SCAN_INTERVAL is invalid: {e}"));

        Config {
            symbols,
            reference_symbol: optional_env("REFERENCE_SYMBOL")
                .map(|s| s.to_uppercase())
                .unwrap_or_else(|| "BTCUSDT".to_string()),
            interval,
            scan_period_secs: optional_env("SCAN_PERIOD_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            top_n: optional_env("TOP_N")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            exchange_base_url: optional_env("EXCHANGE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            pipeline_config_path: optional_env("PIPELINE_CONFIG_PATH")
                .unwrap_or_else(|| "config/scanner.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
