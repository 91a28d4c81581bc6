//! Per-domain pipeline state.

use std::net::IpAddr;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::connection::Connections;
use crate::error_handling::ProbeError;
use crate::models::DetectionResult;
use crate::tls::TlsHandshake;

/// Mutable state threaded through the stages of one pipeline run.
///
/// Owned by exactly one run; stages see it one at a time, in priority order.
pub struct PipelineContext<'a> {
    /// Normalized domain the stages probe
    pub domain: String,
    pub start: Instant,
    /// Result under construction
    pub result: DetectionResult,
    pub connections: &'a dyn Connections,
    pub cache: &'a CacheManager,
    pub config: &'a Config,
    pub cancel: CancellationToken,
    /// Per-domain deadline
    pub deadline: Instant,
    /// Set by a stage that wants the run to stop without returning an error
    pub early_exit: bool,
    pub error: Option<ProbeError>,

    // Artifacts handed from earlier stages to later ones
    pub ip: Option<IpAddr>,
    pub handshake: Option<TlsHandshake>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        domain: &str,
        index: usize,
        connections: &'a dyn Connections,
        cache: &'a CacheManager,
        config: &'a Config,
        cancel: CancellationToken,
    ) -> Self {
        let start = Instant::now();
        Self {
            domain: normalize_domain(domain),
            start,
            result: DetectionResult::new(domain, index),
            connections,
            cache,
            config,
            cancel,
            deadline: start + config.concurrency.domain_timeout,
            early_exit: false,
            error: None,
            ip: None,
            handshake: None,
        }
    }

    /// Closes the run and hands back the result with the pipeline flags copied in.
    pub fn into_result(self) -> DetectionResult {
        let mut result = self.result;
        result.early_exit = self.early_exit;
        result.error = self.error;
        result.duration = self.start.elapsed();
        result
    }
}

/// Lowercases and strips surrounding whitespace, a scheme, a path and a
/// trailing dot, so `https://Example.COM./x` probes `example.com`.
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    host.trim_end_matches('.').to_ascii_lowercase()
}
