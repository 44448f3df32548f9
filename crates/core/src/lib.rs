pub mod analysis;
pub mod domain;
pub mod ingest;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const DEFAULT_HISTORY_START: &str = "2024-01-01";
    const DEFAULT_CACHE_TTL_SECS: i64 = 300;
    const DEFAULT_MARKET_DATA_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_MARKET_DATA_RETRIES: u32 = 3;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub market_data_base_url: Option<String>,
        pub market_quote_base_url: Option<String>,
        pub market_data_timeout_secs: Option<String>,
        pub market_data_retries: Option<String>,
        pub history_start_date: Option<String>,
        pub fetch_cache_ttl_secs: Option<String>,
        pub holdings_path: Option<String>,
        pub scan_catalog_path: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                market_quote_base_url: std::env::var("MARKET_QUOTE_BASE_URL").ok(),
                market_data_timeout_secs: std::env::var("MARKET_DATA_TIMEOUT_SECS").ok(),
                market_data_retries: std::env::var("MARKET_DATA_RETRIES").ok(),
                history_start_date: std::env::var("HISTORY_START_DATE").ok(),
                fetch_cache_ttl_secs: std::env::var("FETCH_CACHE_TTL_SECS").ok(),
                holdings_path: std::env::var("HOLDINGS_PATH").ok(),
                scan_catalog_path: std::env::var("SCAN_CATALOG_PATH").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        /// First calendar date requested from the daily-bar endpoint.
        pub fn history_start_date(&self) -> anyhow::Result<NaiveDate> {
            let raw = self
                .history_start_date
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_HISTORY_START);
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("HISTORY_START_DATE must be YYYY-MM-DD (got {raw})"))
        }

        pub fn fetch_cache_ttl(&self) -> anyhow::Result<chrono::Duration> {
            let secs = match self.fetch_cache_ttl_secs.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s
                    .parse::<i64>()
                    .with_context(|| format!("FETCH_CACHE_TTL_SECS must be an integer (got {s})"))?,
                _ => DEFAULT_CACHE_TTL_SECS,
            };
            anyhow::ensure!(secs >= 0, "FETCH_CACHE_TTL_SECS must be >= 0 (got {secs})");
            Ok(chrono::Duration::seconds(secs))
        }

        /// Per-request timeout for the market-data endpoints.
        pub fn market_data_timeout(&self) -> anyhow::Result<std::time::Duration> {
            let secs = match self.market_data_timeout_secs.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.parse::<u64>().with_context(|| {
                    format!("MARKET_DATA_TIMEOUT_SECS must be a positive integer (got {s})")
                })?,
                _ => DEFAULT_MARKET_DATA_TIMEOUT_SECS,
            };
            anyhow::ensure!(secs > 0, "MARKET_DATA_TIMEOUT_SECS must be > 0");
            Ok(std::time::Duration::from_secs(secs))
        }

        /// Total attempts per market-data fetch, including the first.
        pub fn market_data_retries(&self) -> anyhow::Result<u32> {
            let attempts = match self.market_data_retries.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s.parse::<u32>().with_context(|| {
                    format!("MARKET_DATA_RETRIES must be a positive integer (got {s})")
                })?,
                _ => DEFAULT_MARKET_DATA_RETRIES,
            };
            anyhow::ensure!(attempts >= 1, "MARKET_DATA_RETRIES must be >= 1");
            Ok(attempts)
        }

        pub fn holdings_path(&self) -> Option<PathBuf> {
            self.holdings_path
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        }

        pub fn scan_catalog_path(&self) -> Option<PathBuf> {
            self.scan_catalog_path
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        }
    }

}
