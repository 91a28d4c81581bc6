//! Configuration constants.
//!
//! This module defines the constants used throughout the checker: fallback
//! defaults for configuration fields, network limits and retry policy.

use std::time::Duration;

// Fallback defaults applied by `Config::normalized()`
/// Network timeout used when the configured value is zero
pub const FALLBACK_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);
/// Retry count used when the configured value is out of range
pub const FALLBACK_RETRIES: u32 = 3;
/// DNS servers used when none are configured
pub const FALLBACK_DNS_SERVERS: &[&str] = &["8.8.8.8", "1.1.1.1"];
/// Worker pool size used when the configured value is zero
pub const FALLBACK_MAX_CONCURRENT: usize = 8;
/// Per-stage timeout used when the configured value is zero
pub const FALLBACK_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-domain pipeline deadline used when the configured value is zero
pub const FALLBACK_DOMAIN_TIMEOUT: Duration = Duration::from_secs(60);
/// Cache TTL used when the configured value is zero
pub const FALLBACK_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// Result cache capacity used when the configured value is zero
pub const FALLBACK_CACHE_MAX_SIZE: usize = 1000;
/// Batch deadline used when the configured value is zero
pub const FALLBACK_BATCH_TIMEOUT: Duration = Duration::from_secs(1200);

/// TLS 1.2 wire version
pub const TLS12_VERSION: u16 = 0x0303;
/// TLS 1.3 wire version
pub const TLS13_VERSION: u16 = 0x0304;

// Network operation limits
/// TCP connection timeout in seconds (upper bound, also capped by the network timeout)
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;
/// TLS handshake timeout in seconds (upper bound, also capped by the network timeout)
pub const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 5;
/// Upper bound on TTLs kept by the resolver's own answer cache
pub const DNS_ANSWER_MAX_TTL: Duration = Duration::from_secs(60);
/// Number of answers kept by the resolver's own cache
pub const DNS_ANSWER_CACHE_SIZE: usize = 256;

/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default IP geolocation endpoint (ip-api.com JSON API, `/{ip}` is appended)
pub const DEFAULT_GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Country code treated as "domestic" by the location stage
pub const DEFAULT_HOME_COUNTRY: &str = "CN";

// Redirect handling
/// Maximum number of redirect hops to follow
pub const MAX_REDIRECT_HOPS: usize = 10;

/// Maximum HTTP header value length kept on a network result
pub const MAX_HEADER_VALUE_LENGTH: usize = 1000;

// Retry strategy
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 200;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 2;

// Scoring
/// Handshake time (inclusive) that earns the latency star
pub const FAST_HANDSHAKE_MS: u128 = 10;
/// Top-level domains that earn the TLD star
pub const PREFERRED_TLDS: &[&str] = &[".com", ".net"];

// Report
/// Valid certificates expiring in fewer days than this are flagged
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 30;
/// Handshake time (ms) at or below which the report shows green
pub const HANDSHAKE_GOOD_MS: u128 = 200;
/// Handshake time (ms) at or below which the report shows yellow
pub const HANDSHAKE_FAIR_MS: u128 = 500;
/// Days until expiry at or above which the report shows green
pub const CERT_GOOD_DAYS: i64 = 60;
/// Days until expiry at or above which the report shows yellow
pub const CERT_FAIR_DAYS: i64 = 30;
