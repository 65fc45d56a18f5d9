use crate::catalog::Store;
use serde::Deserialize;

/// Main configuration structure for shelfmap
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub planner: PlannerConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub skip: SkipConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of store lanes crawling concurrently
    #[serde(rename = "max-concurrent-stores")]
    pub max_concurrent_stores: u32,

    /// Minimum time between requests on one store lane (milliseconds)
    #[serde(rename = "min-request-delay-ms")]
    pub min_request_delay_ms: u64,

    /// Maximum retry attempts before a unit is permanently failed
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Enforced upper bound on one page fetch (milliseconds)
    #[serde(rename = "fetch-timeout-ms")]
    pub fetch_timeout_ms: u64,

    /// Log a progress line every this many completed page fetches
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    25
}

/// Set-cover planning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Fraction of the sampled product universe the selection must cover
    #[serde(rename = "target-coverage")]
    pub target_coverage: f64,

    /// Number of leading pages fetched per category during sampling
    #[serde(rename = "sample-pages")]
    pub sample_pages: u32,

    /// Store the sampling pass runs against; defaults to the roster's first
    #[serde(rename = "sample-store", default)]
    pub sample_store: Option<crate::catalog::StoreId>,
}

/// Fetch port configuration for the HTTP reference adapter
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Base URL of the listing endpoint
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User agent string presented by the HTTP adapter
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown run report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

/// One category URL of the crawl universe
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    /// Raw category URL; filter variants of the same pool are collapsed
    pub url: String,
}

/// Operator exclusions
///
/// Excluded pairs are recorded as skipped so the checkpoint accounts for
/// every pair of the cross product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkipConfig {
    /// Store ids to exclude from the crawl
    #[serde(default)]
    pub stores: Vec<crate::catalog::StoreId>,

    /// Canonical category ids to exclude from the crawl
    #[serde(default)]
    pub categories: Vec<u64>,
}
