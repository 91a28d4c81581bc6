//! Error handling and retry policy.
//!
//! This module provides:
//! - Error type definitions (initialization, batch-level, per-domain probe)
//! - The HTTP retry strategy
//!
//! Probe errors are categorized into:
//! - **Verdicts**: the domain was inspected and found unsuitable
//! - **Failures**: the inspection itself could not complete

mod types;

use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

pub use types::{CheckerError, InitializationError, ProbeError, ProbeErrorKind};

/// Builds the retry strategy for HTTP requests.
///
/// Exponential backoff from `RETRY_INITIAL_DELAY_MS`, capped per delay, yielding
/// `retries` delays (so `retries + 1` attempts in total).
///
/// # Returns
///
/// A retry strategy iterator ready for use with `tokio_retry::Retry`.
pub fn get_retry_strategy(retries: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(retries)
}
