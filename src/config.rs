use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use url::Url;

use crate::domain::services::position_tracker::{ScanSettings, SellerTarget};
use crate::persistence::DatabaseConfig;
use crate::retry::RetryPolicy;
use crate::secrets::SecretConfig;

const STATS_API_BASE: &str = "https://statistics-api.wildberries.ru/api/v1/supplier";
const SEARCH_API_URL: &str = "https://search.wb.ru/exactmatch/ru/common/v4/search";

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Errors in user-supplied input that cannot fall back to a default
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Failed to read queries file {path}: {source}")]
    QueriesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queries file {0} contains no queries")]
    EmptyQueries(PathBuf),

    #[error("No search queries given")]
    NoQueries,
}

/// Statistics API settings
#[derive(Debug, Clone)]
pub struct StatsConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Number of records previewed per report bucket
    pub display_limit: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            base_url: STATS_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            display_limit: 8,
        }
    }
}

/// Search API and position tracker settings
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    /// Delivery region the ranking is computed for
    pub dest: String,
    pub sort: String,
    pub spp: u32,
    pub request_timeout: Duration,
    pub user_agents: Vec<String>,
    pub retry: RetryPolicy,
    pub scan: ScanSettings,
    pub target: SellerTarget,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: SEARCH_API_URL.to_string(),
            dest: "-1257786".to_string(),
            sort: "popular".to_string(),
            spp: 24,
            request_timeout: Duration::from_secs(10),
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy {
                max_attempts: 3,
                transport_delay: Duration::ZERO,
                rate_limit_base_delay: Duration::from_secs(2),
                retry_transport: false,
            },
            scan: ScanSettings::default(),
            target: SellerTarget::default(),
        }
    }
}

/// Report cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub report_ttl: Duration,
    pub error_ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            report_ttl: Duration::from_secs(20 * 60),
            error_ttl: Duration::from_secs(5 * 60),
            capacity: 1024,
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub requests_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            requests_per_minute: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Seller account used when none is given explicitly
    pub default_actor: String,
    pub stats: StatsConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    /// Position history database
    pub database: DatabaseConfig,
    pub secrets: SecretConfig,
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    valid: impl Fn(&T) -> bool,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => Some(value),
        Ok(_) => {
            tracing::warn!("Value of {} out of range: {}, using default", key, raw);
            None
        }
        Err(_) => {
            tracing::warn!("Failed to parse {} '{}', using default", key, raw);
            None
        }
    }
}

fn parse_list(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Vec<String>> {
    lookup(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn parse_url(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let raw = lookup(key)?;
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Some(url.as_str().trim_end_matches('/').to_string())
        }
        Ok(url) => {
            tracing::warn!("Unsupported scheme in {}: {}, using default", key, url.scheme());
            None
        }
        Err(e) => {
            tracing::warn!("Invalid URL in {} '{}': {}, using default", key, raw, e);
            None
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source, starting from the
    /// defaults. Invalid values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
        let mut config = AppConfig {
            default_actor: "default".to_string(),
            ..AppConfig::default()
        };

        if let Some(actor) = lookup("WB_ACTOR").filter(|a| !a.trim().is_empty()) {
            config.default_actor = actor.trim().to_string();
        }

        // Statistics API
        if let Some(url) = parse_url(&lookup, "WB_STATS_BASE_URL") {
            config.stats.base_url = url;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "WB_STATS_TIMEOUT_SECONDS", |v| (1..=300).contains(v)) {
            config.stats.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "WB_MAX_RETRIES", |v| (1..=10).contains(v)) {
            config.stats.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "WB_RETRY_DELAY_MS", |v| *v <= 60_000) {
            config.stats.retry.transport_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "WB_RATE_LIMIT_BASE_MS", |v| *v <= 60_000) {
            config.stats.retry.rate_limit_base_delay = Duration::from_millis(ms);
        }
        if let Some(limit) = parse_var::<usize>(&lookup, "WB_DISPLAY_LIMIT", |v| (1..=100).contains(v)) {
            config.stats.display_limit = limit;
        }

        // Search API and tracker
        if let Some(url) = parse_url(&lookup, "WB_SEARCH_URL") {
            config.search.endpoint = url;
        }
        if let Some(dest) = lookup("WB_SEARCH_DEST").filter(|d| !d.trim().is_empty()) {
            config.search.dest = dest.trim().to_string();
        }
        if let Some(sort) = lookup("WB_SEARCH_SORT").filter(|s| !s.trim().is_empty()) {
            config.search.sort = sort.trim().to_string();
        }
        if let Some(spp) = parse_var::<u32>(&lookup, "WB_SEARCH_SPP", |v| *v <= 100) {
            config.search.spp = spp;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "WB_SEARCH_TIMEOUT_SECONDS", |v| (1..=120).contains(v)) {
            config.search.request_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = parse_var::<usize>(&lookup, "WB_PAGE_SIZE", |v| (1..=1000).contains(v)) {
            config.search.scan.page_size = size;
        }
        if let Some(pages) = parse_var::<u32>(&lookup, "WB_MAX_PAGES", |v| (1..=100).contains(v)) {
            config.search.scan.max_pages = pages;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "WB_PAGE_DELAY_MS", |v| *v <= 60_000) {
            config.search.scan.page_delay = Duration::from_millis(ms);
        }
        if let Some(names) = parse_list(&lookup, "WB_SELLER_NAMES") {
            config.search.target.names = names;
        }
        if let Some(ids) = parse_list(&lookup, "WB_SELLER_IDS") {
            config.search.target.ids = ids;
        }
        if let Some(brands) = parse_list(&lookup, "WB_BRANDS") {
            config.search.target.brands = brands;
        }

        // Cache
        if let Some(secs) = parse_var::<u64>(&lookup, "WB_CACHE_TTL_SECONDS", |v| (1..=86_400).contains(v)) {
            config.cache.report_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "WB_ERROR_CACHE_TTL_SECONDS", |v| (1..=86_400).contains(v)) {
            config.cache.error_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "WB_CACHE_CAPACITY", |v| *v > 0) {
            config.cache.capacity = capacity;
        }

        // Server
        if let Some(addr) = parse_var::<SocketAddr>(&lookup, "SERVER_ADDR", |_| true) {
            config.server.bind_addr = addr;
        }
        if let Some(rpm) = parse_var::<u32>(&lookup, "REQUESTS_PER_MINUTE", |v| *v > 0) {
            config.server.requests_per_minute = rpm;
        }

        // Position history
        if let Some(url) = lookup("DATABASE_URL") {
            if url.trim().starts_with("sqlite:") {
                config.database.url = url.trim().to_string();
            } else {
                tracing::warn!("DATABASE_URL is not a sqlite URL: {}, using default", url);
            }
        }
        if let Some(max) = parse_var::<u32>(&lookup, "DATABASE_MAX_CONNECTIONS", |v| (1..=100).contains(v)) {
            config.database.max_connections = max;
        }

        if let Some(reference) = lookup("WB_API_TOKEN_OP_REF").filter(|r| r.starts_with("op://")) {
            config.secrets.op_reference = Some(reference);
        }

        config
    }
}

/// Parse a `YYYY-MM-DD` date given on the command line or in a URL
pub fn parse_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(raw.to_string()))
}

/// Read search queries, one per line. Blank lines are skipped.
pub fn read_queries_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::QueriesFile {
        path: path.to_path_buf(),
        source,
    })?;

    let queries: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if queries.is_empty() {
        return Err(ConfigError::EmptyQueries(path.to_path_buf()));
    }
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.default_actor, "default");
        assert_eq!(config.cache.report_ttl, Duration::from_secs(1200));
        assert_eq!(config.cache.error_ttl, Duration::from_secs(300));
        assert_eq!(config.stats.display_limit, 8);
        assert_eq!(config.stats.retry.max_attempts, 3);
        assert_eq!(config.search.scan.page_size, 100);
        assert_eq!(config.search.scan.max_pages, 5);
        assert!(!config.search.retry.retry_transport);
        assert_eq!(config.stats.base_url, STATS_API_BASE);
        assert_eq!(config.database.url, "sqlite://data/seller_pulse.db");
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_database_settings() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "2"),
        ]);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 2);

        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]);
        assert_eq!(config.database.url, "sqlite://data/seller_pulse.db");
        assert_eq!(config.database.max_connections, 5);

        let config = config_from(&[("DATABASE_MAX_CONNECTIONS", "0")]);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WB_ACTOR", "yalow"),
            ("WB_MAX_PAGES", "10"),
            ("WB_SELLER_NAMES", "YalowShop, Other ,"),
            ("WB_SELLER_IDS", "4242"),
            ("WB_CACHE_TTL_SECONDS", "60"),
            ("WB_STATS_BASE_URL", "http://127.0.0.1:9000/api"),
            ("SERVER_ADDR", "0.0.0.0:8080"),
        ]);
        assert_eq!(config.default_actor, "yalow");
        assert_eq!(config.search.scan.max_pages, 10);
        assert_eq!(config.search.target.names, vec!["YalowShop", "Other"]);
        assert_eq!(config.search.target.ids, vec!["4242"]);
        assert_eq!(config.cache.report_ttl, Duration::from_secs(60));
        assert_eq!(config.stats.base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.server.bind_addr.port(), 8080);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("WB_MAX_PAGES", "0"),
            ("WB_PAGE_SIZE", "lots"),
            ("WB_STATS_BASE_URL", "not a url"),
            ("WB_SEARCH_URL", "ftp://example.com"),
            ("WB_API_TOKEN_OP_REF", "plain-token"),
        ]);
        assert_eq!(config.search.scan.max_pages, 5);
        assert_eq!(config.search.scan.page_size, 100);
        assert_eq!(config.stats.base_url, STATS_API_BASE);
        assert_eq!(config.search.endpoint, SEARCH_API_URL);
        assert_eq!(config.secrets.op_reference, None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(matches!(parse_date("01.03.2024"), Err(ConfigError::InvalidDate(_))));
    }

    #[test]
    fn test_read_queries_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "airpods case\n\n  airpods case 2  \n").unwrap();

        let queries = read_queries_file(file.path()).unwrap();
        assert_eq!(queries, vec!["airpods case", "airpods case 2"]);
    }

    #[test]
    fn test_empty_queries_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            read_queries_file(file.path()),
            Err(ConfigError::EmptyQueries(_))
        ));
        assert!(matches!(
            read_queries_file(Path::new("/nonexistent/queries.txt")),
            Err(ConfigError::QueriesFile { .. })
        ));
    }
}
