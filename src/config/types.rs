use serde::Deserialize;

/// Main configuration structure for docmirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub policy: PolicyConfig,
    pub output: OutputConfig,
    /// Seed URLs the crawl starts from (depth 0)
    pub seeds: Vec<String>,
    /// User agent strings, one picked at random per request
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of concurrent page worker tasks
    #[serde(rename = "page-workers", default = "default_page_workers")]
    pub page_workers: usize,

    /// Number of concurrent image worker tasks
    #[serde(rename = "image-workers", default = "default_image_workers")]
    pub image_workers: usize,

    /// How long a worker waits on an empty queue before re-checking shutdown
    /// (milliseconds)
    #[serde(rename = "claim-wait-ms", default = "default_claim_wait_ms")]
    pub claim_wait_ms: u64,
}

/// Rate limiting and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Starting inter-request delay (milliseconds)
    #[serde(rename = "initial-delay-ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Floor for the adaptive delay (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Ceiling for the adaptive delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum fetch attempts per URL
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_ms")]
    pub retry_base_delay_ms: u64,

    /// Cap on a single backoff wait (milliseconds)
    #[serde(rename = "retry-delay-ceiling-ms", default = "default_retry_ceiling_ms")]
    pub retry_delay_ceiling_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Completion monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// How often progress is sampled (seconds)
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// No-progress interval after which the stall escape hatch applies
    /// (seconds)
    #[serde(rename = "stall-threshold-secs", default = "default_stall_threshold")]
    pub stall_threshold_secs: u64,

    /// Minimum fraction of discovered images that must be done before a
    /// stall is allowed to terminate the run
    #[serde(rename = "min-image-fraction", default = "default_min_image_fraction")]
    pub min_image_fraction: f64,

    /// No-progress interval after which the run stops unconditionally
    /// (seconds)
    #[serde(rename = "hard-stall-threshold-secs", default = "default_hard_stall")]
    pub hard_stall_threshold_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            stall_threshold_secs: default_stall_threshold(),
            min_image_fraction: default_min_image_fraction(),
            hard_stall_threshold_secs: default_hard_stall(),
        }
    }
}

/// URL admission policy
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Hosts that may be crawled (exact match against the normalized host)
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// File extensions that are never crawled (e.g. ".pdf")
    #[serde(rename = "excluded-extensions", default)]
    pub excluded_extensions: Vec<String>,

    /// Substring patterns that reject a URL (e.g. "/legal", "?q=")
    #[serde(rename = "excluded-patterns", default)]
    pub excluded_patterns: Vec<String>,

    /// Path prefixes that are admitted; empty means every path is admitted
    #[serde(rename = "allowed-path-prefixes", default)]
    pub allowed_path_prefixes: Vec<String>,
}

/// Output location configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for all crawl artifacts
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Metadata file path, relative to `output_dir` unless absolute
    #[serde(rename = "metadata-file", default = "default_metadata_file")]
    pub metadata_file: String,
}

fn default_page_workers() -> usize {
    6
}

fn default_image_workers() -> usize {
    4
}

fn default_claim_wait_ms() -> u64 {
    1000
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_min_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_retry_ceiling_ms() -> u64 {
    15_000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    10
}

fn default_stall_threshold() -> u64 {
    300
}

fn default_min_image_fraction() -> f64 {
    0.9
}

fn default_hard_stall() -> u64 {
    600
}

fn default_metadata_file() -> String {
    "page_metadata.json".to_string()
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
    ]
}
