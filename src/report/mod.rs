//! Batch report: aggregate statistics over a finished batch.
//!
//! [`BatchReport::new`] is the consumer boundary of a batch. It is a pure
//! function of the results and the batch's wall-clock bounds; rendering
//! lives in [`render_text`] (tables) or goes through `serde_json` (JSON).

mod text;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DEFAULT_EXPIRY_WARNING_DAYS;
use crate::models::{serialize_duration_ms, DetectionResult, StatusCodeCategory};
use crate::scoring::{self, Recommendation};

pub use text::{format_duration, render_text};

/// Domain counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_domains: usize,
    /// Results without error, or whose error is a verdict
    pub successful_checks: usize,
    /// Results carrying a technical failure
    pub failed_checks: usize,
    pub suitable_domains: usize,
    pub blocked_domains: usize,
    pub excluded_domains: usize,
}

/// Timing over every result that carries a duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    #[serde(serialize_with = "serialize_duration_ms")]
    pub total_time: Duration,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub average_time: Duration,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub min_time: Duration,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub max_time: Duration,
    pub throughput_per_second: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CdnStats {
    pub cdn_domains: usize,
    pub providers: BTreeMap<String, usize>,
    pub confidence_levels: BTreeMap<String, usize>,
    pub hot_websites: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeographicStats {
    /// Country code to domain count
    pub countries: BTreeMap<String, usize>,
    pub domestic: usize,
    pub foreign: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TlsStats {
    pub probed: usize,
    pub tls13: usize,
    pub x25519: usize,
    pub http2: usize,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub average_handshake: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CertificateStats {
    pub valid: usize,
    pub invalid: usize,
    /// Valid certificates expiring within the warning window
    pub expiring_soon: usize,
    pub average_days_until_expiry: i64,
}

/// Rates (0.0 to 1.0) plus short human-readable notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub success_rate: f64,
    pub suitability_rate: f64,
    pub blocking_rate: f64,
    pub cdn_rate: f64,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Everything known about one finished batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub total_duration: Duration,
    pub statistics: Statistics,
    pub performance: PerformanceStats,
    pub cdn: CdnStats,
    pub geographic: GeographicStats,
    pub tls: TlsStats,
    pub certificates: CertificateStats,
    pub summary: BatchSummary,
    pub results: Vec<DetectionResult>,
}

/// Recommendations list at most this many domains.
const MAX_RECOMMENDATIONS: usize = 5;

impl BatchReport {
    /// Builds the report for `results` collected between `start` and `end`.
    pub fn new(results: Vec<DetectionResult>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let total_duration = (end - start).to_std().unwrap_or_default();
        let statistics = statistics(&results);
        let performance = performance(&results, total_duration);
        let cdn = cdn_stats(&results);
        let summary = summary(&results, &statistics, &cdn);

        Self {
            start_time: start,
            end_time: end,
            total_duration,
            performance,
            geographic: geographic(&results),
            tls: tls_stats(&results),
            certificates: certificate_stats(&results),
            statistics,
            cdn,
            summary,
            results,
        }
    }

    /// Suitable, error-free results, fewest stars first.
    pub fn suitable(&self) -> Vec<&DetectionResult> {
        let mut suitable: Vec<_> = self
            .results
            .iter()
            .filter(|r| r.suitable && r.error.is_none())
            .collect();
        suitable.sort_by_key(|r| scoring::star_count(r));
        suitable
    }

    /// Results rejected for an excluded status code.
    pub fn excluded(&self) -> Vec<&DetectionResult> {
        self.results
            .iter()
            .filter(|r| r.status_code_category == Some(StatusCodeCategory::Excluded))
            .collect()
    }

    /// Everything neither suitable nor excluded.
    pub fn unsuitable(&self) -> Vec<&DetectionResult> {
        self.results
            .iter()
            .filter(|r| !(r.suitable && r.error.is_none()))
            .filter(|r| r.status_code_category != Some(StatusCodeCategory::Excluded))
            .collect()
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn statistics(results: &[DetectionResult]) -> Statistics {
    let successful_checks = results
        .iter()
        .filter(|r| r.error.as_ref().map_or(true, |e| e.is_verdict()))
        .count();
    Statistics {
        total_domains: results.len(),
        successful_checks,
        failed_checks: results.len() - successful_checks,
        suitable_domains: results.iter().filter(|r| r.suitable).count(),
        blocked_domains: results.iter().filter(|r| scoring::is_blocked(r)).count(),
        excluded_domains: results
            .iter()
            .filter(|r| r.status_code_category == Some(StatusCodeCategory::Excluded))
            .count(),
    }
}

fn performance(results: &[DetectionResult], total_time: Duration) -> PerformanceStats {
    let durations: Vec<Duration> = results
        .iter()
        .map(|r| r.duration)
        .filter(|d| !d.is_zero())
        .collect();
    let sum: Duration = durations.iter().sum();
    let secs = total_time.as_secs_f64();

    PerformanceStats {
        total_time,
        average_time: average(sum, durations.len()),
        min_time: durations.iter().min().copied().unwrap_or_default(),
        max_time: durations.iter().max().copied().unwrap_or_default(),
        throughput_per_second: if secs > 0.0 { results.len() as f64 / secs } else { 0.0 },
    }
}

fn average(sum: Duration, count: usize) -> Duration {
    match u32::try_from(count) {
        Ok(0) | Err(_) => Duration::ZERO,
        Ok(n) => sum / n,
    }
}

fn cdn_stats(results: &[DetectionResult]) -> CdnStats {
    let mut stats = CdnStats::default();
    for cdn in results.iter().filter_map(|r| r.cdn.as_ref()) {
        if cdn.is_hot_website {
            stats.hot_websites += 1;
        }
        if !cdn.is_cdn {
            continue;
        }
        stats.cdn_domains += 1;
        if let Some(provider) = &cdn.provider {
            *stats.providers.entry(provider.clone()).or_default() += 1;
        }
        if let Some(confidence) = cdn.confidence {
            *stats.confidence_levels.entry(confidence.to_string()).or_default() += 1;
        }
    }
    stats
}

fn geographic(results: &[DetectionResult]) -> GeographicStats {
    let mut stats = GeographicStats::default();
    for location in results.iter().filter_map(|r| r.location.as_ref()) {
        let code = if location.country_code.is_empty() {
            "unknown".to_string()
        } else {
            location.country_code.clone()
        };
        *stats.countries.entry(code).or_default() += 1;
        if location.is_domestic {
            stats.domestic += 1;
        } else {
            stats.foreign += 1;
        }
    }
    stats
}

fn tls_stats(results: &[DetectionResult]) -> TlsStats {
    let probes: Vec<_> = results.iter().filter_map(|r| r.tls.as_ref()).collect();
    let handshakes: Duration = probes.iter().map(|t| t.handshake_time).sum();
    TlsStats {
        probed: probes.len(),
        tls13: probes.iter().filter(|t| t.supports_tls13).count(),
        x25519: probes.iter().filter(|t| t.supports_x25519).count(),
        http2: probes.iter().filter(|t| t.supports_http2).count(),
        average_handshake: average(handshakes, probes.len()),
    }
}

fn certificate_stats(results: &[DetectionResult]) -> CertificateStats {
    let mut stats = CertificateStats::default();
    let mut days = Vec::new();
    for cert in results.iter().filter_map(|r| r.certificate.as_ref()) {
        if cert.valid {
            stats.valid += 1;
            days.push(cert.days_until_expiry);
            if cert.days_until_expiry < DEFAULT_EXPIRY_WARNING_DAYS {
                stats.expiring_soon += 1;
            }
        } else {
            stats.invalid += 1;
        }
    }
    if !days.is_empty() {
        stats.average_days_until_expiry = days.iter().sum::<i64>() / days.len() as i64;
    }
    stats
}

fn summary(results: &[DetectionResult], statistics: &Statistics, cdn: &CdnStats) -> BatchSummary {
    let total = statistics.total_domains;

    let mut ranked: Vec<_> = results
        .iter()
        .filter(|r| r.suitable && r.error.is_none())
        .map(|r| (scoring::recommendation(r), r))
        .collect();
    ranked.sort_by_key(|(rec, _)| std::cmp::Reverse(stars(*rec)));
    let recommendations = ranked
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(rec, r)| format!("{} ({rec})", r.final_domain()))
        .collect();

    let mut warnings = Vec::new();
    let timed_out = results
        .iter()
        .filter(|r| matches!(r.error, Some(crate::error_handling::ProbeError::Timeout)))
        .count();
    if timed_out > 0 {
        warnings.push(format!("{timed_out} domain(s) timed out"));
    }
    let technical = statistics.failed_checks - timed_out.min(statistics.failed_checks);
    if technical > 0 {
        warnings.push(format!("{technical} domain(s) failed with network or TLS errors"));
    }
    if total > 0 && statistics.suitable_domains == 0 {
        warnings.push("no suitable domain found".to_string());
    }

    BatchSummary {
        success_rate: ratio(statistics.successful_checks, total),
        suitability_rate: ratio(statistics.suitable_domains, total),
        blocking_rate: ratio(statistics.blocked_domains, total),
        cdn_rate: ratio(cdn.cdn_domains, total),
        recommendations,
        warnings,
    }
}

fn stars(rec: Recommendation) -> u8 {
    match rec {
        Recommendation::Invalid => 0,
        Recommendation::Stars(n) => n,
    }
}
