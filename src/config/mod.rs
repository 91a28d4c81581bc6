//! Checker configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, limits, fallback defaults)
//! - HTTP header name constants
//! - The `Config` value and its sections

mod constants;
mod headers;
mod types;

// Re-export all constants
pub use constants::*;
pub use headers::*;
pub use types::{
    BatchConfig, CacheConfig, ConcurrencyConfig, Config, DetectionConfig, LogFormat, LogLevel,
    NetworkConfig, OutputConfig, OutputFormat, TlsConfig,
};
