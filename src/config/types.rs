//! Configuration types.
//!
//! `Config` is consumed by the checker as an immutable value per run. Every
//! field has a fallback default: missing fields come from `Default`, and
//! zero/invalid values are replaced by `Config::normalized()`.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::constants::*;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Output format for single-domain and batch results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Text tables
    #[default]
    Table,
    /// One JSON document
    Json,
}

/// Serde helper: durations are written as (fractional) seconds.
///
/// Negative or non-finite values deserialize to zero so that `normalized()`
/// replaces them with the fallback.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if secs.is_finite() && secs > 0.0 {
            Ok(Duration::from_secs_f64(secs))
        } else {
            Ok(Duration::ZERO)
        }
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Timeout for a single network operation
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Extra attempts for HTTP requests after the first one
    pub retries: i32,
    /// DNS servers (IP addresses) used by the resolver
    pub dns_servers: Vec<String>,
    /// HTTP User-Agent header value
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retries: 1,
            dns_servers: FALLBACK_DNS_SERVERS.iter().map(|s| s.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// TLS protocol range offered by the handshake probe (wire versions, 0x0303 = TLS 1.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub min_version: u16,
    pub max_version: u16,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: TLS12_VERSION,
            max_version: TLS13_VERSION,
        }
    }
}

/// Worker pool and per-domain deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Worker pool size (maximum pipelines running at once)
    pub max_concurrent: usize,
    /// Floor applied to the pool size
    pub min_concurrent: usize,
    /// Deadline for a single stage
    #[serde(with = "duration_secs")]
    pub check_timeout: Duration,
    /// Deadline for one domain's whole pipeline
    #[serde(with = "duration_secs")]
    pub domain_timeout: Duration,
    /// TTL applied to the DNS and CDN caches
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            min_concurrent: 1,
            check_timeout: Duration::from_secs(10),
            domain_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Output settings for the report consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub color: bool,
    /// Log at Debug or finer regardless of the requested level
    pub verbose: bool,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            verbose: false,
            format: OutputFormat::Table,
        }
    }
}

/// Cache switches and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dns_enabled: bool,
    pub cdn_enabled: bool,
    pub result_enabled: bool,
    /// TTL of the full-result cache
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Capacity of each cache
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dns_enabled: true,
            cdn_enabled: true,
            result_enabled: true,
            ttl: Duration::from_secs(5 * 60),
            max_size: 1000,
        }
    }
}

/// Batch engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Print results as they arrive instead of one final report
    pub stream_output: bool,
    /// Report progress as each result lands
    pub progress_bar: bool,
    /// Report format for batch runs; single checks use `output.format`
    pub report_format: OutputFormat,
    /// Global deadline for a whole batch
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            stream_output: false,
            progress_bar: true,
            report_format: OutputFormat::Table,
            timeout: FALLBACK_BATCH_TIMEOUT,
        }
    }
}

/// Detection policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// ISO country code whose sites count as domestic
    pub home_country: String,
    /// Extra blocked domains on top of the built-in list
    pub blocked_domains: Vec<String>,
    /// Extra popular domains on top of the built-in list
    pub hot_domains: Vec<String>,
    /// IP geolocation endpoint
    pub geo_endpoint: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            home_country: DEFAULT_HOME_COUNTRY.to_string(),
            blocked_domains: Vec::new(),
            hot_domains: Vec::new(),
            geo_endpoint: DEFAULT_GEO_ENDPOINT.to_string(),
        }
    }
}

/// Library configuration (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use reality_checker::Config;
///
/// let mut config = Config::default();
/// config.concurrency.max_concurrent = 4;
/// let config = config.normalized();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub tls: TlsConfig,
    pub concurrency: ConcurrencyConfig,
    pub output: OutputConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub detection: DetectionConfig,
}

impl Config {
    /// Replaces zero, negative or otherwise invalid values with their fallbacks.
    pub fn normalized(mut self) -> Self {
        if self.network.timeout.is_zero() {
            self.network.timeout = FALLBACK_NETWORK_TIMEOUT;
        }
        if self.network.retries < 0 {
            self.network.retries = FALLBACK_RETRIES as i32;
        }
        self.network
            .dns_servers
            .retain(|server| server.trim().parse::<std::net::IpAddr>().is_ok());
        if self.network.dns_servers.is_empty() {
            self.network.dns_servers =
                FALLBACK_DNS_SERVERS.iter().map(|s| s.to_string()).collect();
        }
        if self.network.user_agent.trim().is_empty() {
            self.network.user_agent = DEFAULT_USER_AGENT.to_string();
        }

        if !(TLS12_VERSION..=TLS13_VERSION).contains(&self.tls.min_version) {
            self.tls.min_version = TLS12_VERSION;
        }
        if !(TLS12_VERSION..=TLS13_VERSION).contains(&self.tls.max_version) {
            self.tls.max_version = TLS13_VERSION;
        }
        if self.tls.min_version > self.tls.max_version {
            self.tls.min_version = self.tls.max_version;
        }

        if self.concurrency.max_concurrent == 0 {
            self.concurrency.max_concurrent = FALLBACK_MAX_CONCURRENT;
        }
        if self.concurrency.min_concurrent == 0 {
            self.concurrency.min_concurrent = 1;
        }
        if self.concurrency.check_timeout.is_zero() {
            self.concurrency.check_timeout = FALLBACK_CHECK_TIMEOUT;
        }
        if self.concurrency.domain_timeout.is_zero() {
            self.concurrency.domain_timeout = FALLBACK_DOMAIN_TIMEOUT;
        }
        if self.concurrency.cache_ttl.is_zero() {
            self.concurrency.cache_ttl = FALLBACK_CACHE_TTL;
        }

        if self.cache.ttl.is_zero() {
            self.cache.ttl = FALLBACK_CACHE_TTL;
        }
        if self.cache.max_size == 0 {
            self.cache.max_size = FALLBACK_CACHE_MAX_SIZE;
        }

        if self.batch.timeout.is_zero() {
            self.batch.timeout = FALLBACK_BATCH_TIMEOUT;
        }

        self.detection.home_country = self.detection.home_country.trim().to_uppercase();
        if self.detection.geo_endpoint.trim().is_empty() {
            self.detection.geo_endpoint = DEFAULT_GEO_ENDPOINT.to_string();
        }
        self
    }

    /// Report format for a run of `batch` or single-domain checks.
    pub fn report_format(&self, batch: bool) -> OutputFormat {
        if batch {
            self.batch.report_format
        } else {
            self.output.format
        }
    }

    /// Effective log level: `requested`, raised to Debug when `output.verbose` is set.
    pub fn log_level(&self, requested: log::LevelFilter) -> log::LevelFilter {
        if self.output.verbose {
            requested.max(log::LevelFilter::Debug)
        } else {
            requested
        }
    }

    /// Worker pool size: `max_concurrent`, floored at `min_concurrent`.
    pub fn pool_size(&self) -> usize {
        self.concurrency
            .max_concurrent
            .max(self.concurrency.min_concurrent)
            .max(1)
    }
}
