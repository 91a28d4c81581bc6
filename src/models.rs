//! Detection result model.
//!
//! One [`DetectionResult`] is produced per input domain. Each detection
//! dimension has its own immutable sub-result, stored as an `Option` so that
//! "stage never ran" (`None`) stays distinguishable from "stage ran and failed".

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumIter};

use crate::error_handling::ProbeError;

pub(crate) fn serialize_duration_ms<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Status-code bucket used to gate suitability and group report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusCodeCategory {
    /// A plain 200 page
    Safe,
    /// Redirects, auth walls, errors and anything else unnatural for a cover site
    Excluded,
    /// No HTTP response at all
    Network,
}

/// Classifies an HTTP status code.
///
/// `200` is safe; every other reachable status (including the explicitly
/// listed 301/302/401/403/404/407/408/429 and all of 5xx) is excluded; an
/// unreachable site is `Network` regardless of the code.
pub fn classify_status_code(status_code: u16, accessible: bool) -> StatusCodeCategory {
    if !accessible {
        return StatusCodeCategory::Network;
    }
    match status_code {
        200 => StatusCodeCategory::Safe,
        301 | 302 | 401 | 403 | 404 | 407 | 408 | 429 => StatusCodeCategory::Excluded,
        500..=599 => StatusCodeCategory::Excluded,
        _ => StatusCodeCategory::Excluded,
    }
}

/// True when a reachable site with this status counts as safe.
pub fn is_status_code_safe(status_code: u16) -> bool {
    classify_status_code(status_code, true) == StatusCodeCategory::Safe
}

/// True when a reachable site with this status is excluded.
pub fn is_status_code_excluded(status_code: u16) -> bool {
    classify_status_code(status_code, true) == StatusCodeCategory::Excluded
}

/// HTTP reachability of the domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkResult {
    pub accessible: bool,
    pub status_code: u16,
    /// Host of the last URL in the redirect chain
    pub final_domain: String,
    pub redirect_chain: Vec<String>,
    pub is_redirected: bool,
    pub redirect_count: usize,
    /// First URL requested
    pub url: String,
    /// Total time spent on the request chain
    #[serde(serialize_with = "serialize_duration_ms")]
    pub response_time: Duration,
    /// Time until the first response head (connect + TLS + first byte)
    #[serde(serialize_with = "serialize_duration_ms")]
    pub handshake_time: Duration,
    /// Selected response headers, lowercase names
    pub headers: BTreeMap<String, String>,
}

/// TLS capabilities negotiated by the raw handshake probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsResult {
    pub protocol_version: String,
    pub supports_tls13: bool,
    pub supports_x25519: bool,
    pub supports_http2: bool,
    pub cipher_suite: String,
    pub key_exchange_group: Option<String>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub handshake_time: Duration,
}

/// Leaf certificate validity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateResult {
    pub valid: bool,
    pub issuer: String,
    pub subject: String,
    pub days_until_expiry: i64,
    pub sans: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub error: Option<String>,
}

/// Whether the certificate served for our SNI covers the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SniResult {
    pub supports_sni: bool,
    pub sni_match: bool,
    pub server_name: String,
}

/// Confidence of a CDN verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CdnConfidence {
    Low,
    Medium,
    High,
}

/// CDN and popularity verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CdnResult {
    pub is_cdn: bool,
    pub provider: Option<String>,
    pub confidence: Option<CdnConfidence>,
    pub evidence: Vec<String>,
    pub is_hot_website: bool,
}

/// Page status as seen by the network stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageStatusResult {
    pub status_code: u16,
    pub is_accessible: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

/// How a blocked domain matched the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockMatch {
    Exact,
    Suffix,
}

/// Block-list verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedResult {
    pub is_blocked: bool,
    pub blocked_reasons: Vec<String>,
    pub match_type: Option<BlockMatch>,
}

/// Where the domain's server is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationResult {
    pub country: String,
    pub country_code: String,
    pub is_domestic: bool,
    pub ip_address: String,
    pub isp: String,
    pub asn: String,
    pub city: String,
    pub region: String,
}

/// Aggregate per-domain detection result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub domain: String,
    pub index: usize,
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
    pub suitable: bool,
    pub hard_requirements_met: bool,
    pub early_exit: bool,
    pub status_code_category: Option<StatusCodeCategory>,
    pub error: Option<ProbeError>,

    pub network: Option<NetworkResult>,
    pub tls: Option<TlsResult>,
    pub certificate: Option<CertificateResult>,
    pub sni: Option<SniResult>,
    pub cdn: Option<CdnResult>,
    pub page_status: Option<PageStatusResult>,
    pub blocked: Option<BlockedResult>,
    pub location: Option<LocationResult>,
}

/// Detection dimensions, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Detector {
    Blocked,
    Location,
    Network,
    Tls,
    Sni,
    Certificate,
    Cdn,
    /// Popularity check, reported on the CDN sub-result
    Hot,
}

impl DetectionResult {
    /// Creates an empty result for a domain about to be checked.
    pub fn new(domain: impl Into<String>, index: usize) -> Self {
        Self {
            domain: domain.into(),
            index,
            start_time: Utc::now(),
            duration: Duration::ZERO,
            suitable: false,
            hard_requirements_met: false,
            early_exit: false,
            status_code_category: None,
            error: None,
            network: None,
            tls: None,
            certificate: None,
            sni: None,
            cdn: None,
            page_status: None,
            blocked: None,
            location: None,
        }
    }

    /// Synthetic result for a domain whose detection never completed.
    ///
    /// Marked as an early exit: no detector ran, so none may read as passed.
    pub fn timed_out(domain: impl Into<String>, index: usize) -> Self {
        let mut result = Self::new(domain, index);
        result.error = Some(ProbeError::Timeout);
        result.early_exit = true;
        result
    }

    /// Whether the given detector produced its sub-result.
    ///
    /// Without early exit every detector ran, so this is always true.
    pub fn is_detector_executed(&self, detector: Detector) -> bool {
        if !self.early_exit {
            return true;
        }
        match detector {
            Detector::Blocked => self.blocked.is_some(),
            Detector::Location => self.location.is_some(),
            Detector::Network => self.network.is_some(),
            Detector::Tls => self.tls.is_some(),
            Detector::Sni => self.sni.is_some(),
            Detector::Certificate => self.certificate.is_some(),
            Detector::Cdn | Detector::Hot => self.cdn.is_some(),
        }
    }

    /// True when the result carries a technical failure rather than a verdict.
    pub fn is_technical_failure(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_verdict())
    }

    /// Final domain after redirects, falling back to the input domain.
    pub fn final_domain(&self) -> &str {
        self.network
            .as_ref()
            .map(|n| n.final_domain.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_classify_status_code_examples() {
        assert_eq!(classify_status_code(200, true), StatusCodeCategory::Safe);
        assert_eq!(classify_status_code(301, true), StatusCodeCategory::Excluded);
        assert_eq!(classify_status_code(503, true), StatusCodeCategory::Excluded);
        assert_eq!(classify_status_code(200, false), StatusCodeCategory::Network);
        assert_eq!(classify_status_code(0, false), StatusCodeCategory::Network);
    }

    #[test]
    fn test_classify_listed_excluded_codes() {
        for code in [301, 302, 401, 403, 404, 407, 408, 429] {
            assert!(is_status_code_excluded(code), "{code} should be excluded");
        }
        for code in 500..600 {
            assert!(is_status_code_excluded(code), "{code} should be excluded");
        }
        assert!(is_status_code_safe(200));
        assert!(!is_status_code_safe(204));
    }

    #[test]
    fn test_status_code_category_display() {
        assert_eq!(StatusCodeCategory::Safe.to_string(), "safe");
        assert_eq!(StatusCodeCategory::Excluded.to_string(), "excluded");
        assert_eq!(StatusCodeCategory::Network.to_string(), "network");
    }

    #[test]
    fn test_new_result_has_no_sub_results() {
        let result = DetectionResult::new("example.com", 3);
        assert_eq!(result.index, 3);
        assert!(!result.suitable);
        assert!(result.network.is_none());
        assert!(result.tls.is_none());
        assert!(result.cdn.is_none());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_timed_out_result() {
        let result = DetectionResult::timed_out("slow.example", 1);
        assert!(!result.suitable);
        assert!(result.early_exit);
        assert_eq!(result.error, Some(ProbeError::Timeout));
        assert!(result.is_technical_failure());
        for detector in Detector::iter() {
            assert!(!result.is_detector_executed(detector), "{detector} reported as run");
        }
    }

    #[test]
    fn test_is_detector_executed_without_early_exit() {
        let result = DetectionResult::new("example.com", 0);
        for detector in Detector::iter() {
            assert!(result.is_detector_executed(detector));
        }
    }

    #[test]
    fn test_is_detector_executed_with_early_exit() {
        let mut result = DetectionResult::new("example.com", 0);
        result.early_exit = true;
        result.blocked = Some(BlockedResult {
            is_blocked: false,
            blocked_reasons: Vec::new(),
            match_type: None,
        });
        assert!(result.is_detector_executed(Detector::Blocked));
        assert!(!result.is_detector_executed(Detector::Tls));
        assert!(!result.is_detector_executed(Detector::Hot));
    }

    #[test]
    fn test_serialize_error_as_message() {
        let mut result = DetectionResult::new("example.com", 0);
        result.error = Some(ProbeError::StatusCode(403));
        let json = serde_json::to_value(&result).expect("result should serialize");
        assert_eq!(json["error"], "unnatural status code 403");
        assert_eq!(json["domain"], "example.com");
        assert!(json["tls"].is_null());
    }
}
