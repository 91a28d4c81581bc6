//! Suitability and star recommendation.
//!
//! Stars are four independent predicates, one star each:
//! 1. hard requirements met (TLS 1.3, X25519, HTTP/2, SNI match)
//! 2. TLS handshake completed in at most `FAST_HANDSHAKE_MS`
//! 3. not served by a CDN
//! 4. `.com` or `.net` top-level domain
//!
//! A result that stopped early is [`Recommendation::Invalid`]: its later
//! fields are unknown, not negative.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::{FAST_HANDSHAKE_MS, PREFERRED_TLDS};
use crate::models::{DetectionResult, StatusCodeCategory};

/// Star recommendation for one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Invalid,
    Stars(u8),
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Invalid => write!(f, "Invalid"),
            Recommendation::Stars(0) => write!(f, "-"),
            Recommendation::Stars(n) => write!(f, "{}", "★".repeat(usize::from(*n))),
        }
    }
}

/// TLS 1.3 ∧ X25519 ∧ HTTP/2 ∧ SNI match.
pub fn hard_requirements_met(result: &DetectionResult) -> bool {
    let tls_ok = result
        .tls
        .as_ref()
        .is_some_and(|tls| tls.supports_tls13 && tls.supports_x25519 && tls.supports_http2);
    let sni_ok = result.sni.as_ref().is_some_and(|sni| sni.sni_match);
    tls_ok && sni_ok
}

pub fn is_blocked(result: &DetectionResult) -> bool {
    result.blocked.as_ref().is_some_and(|b| b.is_blocked)
}

pub fn is_cdn(result: &DetectionResult) -> bool {
    result.cdn.as_ref().is_some_and(|c| c.is_cdn)
}

/// Hard requirements, not blocked, not a CDN and no excluded status code.
///
/// A technical failure anywhere also rules the domain out, since some of
/// these facts are then unknown.
pub fn is_suitable(result: &DetectionResult) -> bool {
    hard_requirements_met(result)
        && !is_blocked(result)
        && !is_cdn(result)
        && result.status_code_category != Some(StatusCodeCategory::Excluded)
        && !result.is_technical_failure()
}

/// Fills `hard_requirements_met` and `suitable` from the sub-results.
pub fn apply(result: &mut DetectionResult) {
    result.hard_requirements_met = hard_requirements_met(result);
    result.suitable = is_suitable(result);
}

pub fn is_fast_handshake(handshake_time: Duration) -> bool {
    !handshake_time.is_zero() && handshake_time.as_millis() <= FAST_HANDSHAKE_MS
}

pub fn has_preferred_tld(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    PREFERRED_TLDS.iter().any(|tld| domain.ends_with(tld))
}

/// Number of satisfied star predicates, ignoring early exit.
pub fn star_count(result: &DetectionResult) -> u8 {
    let fast = result
        .tls
        .as_ref()
        .is_some_and(|tls| is_fast_handshake(tls.handshake_time));
    [
        hard_requirements_met(result),
        fast,
        !is_cdn(result),
        has_preferred_tld(&result.domain),
    ]
    .into_iter()
    .map(u8::from)
    .sum()
}

pub fn recommendation(result: &DetectionResult) -> Recommendation {
    if result.early_exit {
        Recommendation::Invalid
    } else {
        Recommendation::Stars(star_count(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ProbeError;
    use crate::models::{BlockedResult, CdnResult, SniResult, TlsResult};
    use proptest::prelude::*;

    fn full_result(domain: &str) -> DetectionResult {
        let mut result = DetectionResult::new(domain, 0);
        result.blocked = Some(BlockedResult {
            is_blocked: false,
            blocked_reasons: Vec::new(),
            match_type: None,
        });
        result.tls = Some(TlsResult {
            protocol_version: "TLS 1.3".to_string(),
            supports_tls13: true,
            supports_x25519: true,
            supports_http2: true,
            cipher_suite: "TLS13_AES_128_GCM_SHA256".to_string(),
            key_exchange_group: Some("X25519".to_string()),
            handshake_time: Duration::from_millis(8),
        });
        result.sni = Some(SniResult {
            supports_sni: true,
            sni_match: true,
            server_name: domain.to_string(),
        });
        result.cdn = Some(CdnResult {
            is_cdn: false,
            provider: None,
            confidence: None,
            evidence: Vec::new(),
            is_hot_website: false,
        });
        result.status_code_category = Some(StatusCodeCategory::Safe);
        result
    }

    #[test]
    fn test_full_result_is_suitable_with_four_stars() {
        let mut result = full_result("example.com");
        apply(&mut result);
        assert!(result.hard_requirements_met);
        assert!(result.suitable);
        assert_eq!(recommendation(&result), Recommendation::Stars(4));
    }

    #[test]
    fn test_early_exit_is_invalid() {
        let mut result = full_result("example.com");
        result.early_exit = true;
        assert_eq!(recommendation(&result), Recommendation::Invalid);
        assert_eq!(star_count(&result), 4);
    }

    #[test]
    fn test_handshake_star_boundaries() {
        assert!(is_fast_handshake(Duration::from_millis(10)));
        assert!(is_fast_handshake(Duration::from_micros(300)));
        assert!(!is_fast_handshake(Duration::from_millis(11)));
        assert!(!is_fast_handshake(Duration::ZERO));
    }

    #[test]
    fn test_preferred_tld() {
        assert!(has_preferred_tld("example.com"));
        assert!(has_preferred_tld("EXAMPLE.NET."));
        assert!(!has_preferred_tld("example.org"));
        assert!(!has_preferred_tld("example.co"));
    }

    #[test]
    fn test_hot_website_does_not_affect_suitability() {
        let mut result = full_result("example.com");
        if let Some(cdn) = result.cdn.as_mut() {
            cdn.is_hot_website = true;
        }
        apply(&mut result);
        assert!(result.suitable);
    }

    #[test]
    fn test_technical_failure_is_not_suitable() {
        let mut result = full_result("example.com");
        result.error = Some(ProbeError::Timeout);
        apply(&mut result);
        assert!(result.hard_requirements_met);
        assert!(!result.suitable);
    }

    #[test]
    fn test_recommendation_display() {
        assert_eq!(Recommendation::Invalid.to_string(), "Invalid");
        assert_eq!(Recommendation::Stars(0).to_string(), "-");
        assert_eq!(Recommendation::Stars(3).to_string(), "★★★");
    }

    proptest! {
        #[test]
        fn prop_suitability_matches_its_predicates(
            tls13 in any::<bool>(),
            x25519 in any::<bool>(),
            h2 in any::<bool>(),
            sni in any::<bool>(),
            blocked in any::<bool>(),
            cdn in any::<bool>(),
            excluded in any::<bool>(),
            fast in any::<bool>(),
            com in any::<bool>(),
        ) {
            let mut result = full_result(if com { "example.com" } else { "example.org" });
            if let Some(tls) = result.tls.as_mut() {
                tls.supports_tls13 = tls13;
                tls.supports_x25519 = x25519;
                tls.supports_http2 = h2;
                tls.handshake_time = if fast { Duration::from_millis(5) } else { Duration::from_millis(50) };
            }
            if let Some(s) = result.sni.as_mut() {
                s.sni_match = sni;
            }
            if let Some(b) = result.blocked.as_mut() {
                b.is_blocked = blocked;
            }
            if let Some(c) = result.cdn.as_mut() {
                c.is_cdn = cdn;
            }
            if excluded {
                result.status_code_category = Some(StatusCodeCategory::Excluded);
            }
            apply(&mut result);

            let hard = tls13 && x25519 && h2 && sni;
            prop_assert_eq!(result.hard_requirements_met, hard);
            prop_assert_eq!(result.suitable, hard && !blocked && !cdn && !excluded);

            let expected = [hard, fast, !cdn, com].into_iter().filter(|p| *p).count() as u8;
            prop_assert_eq!(recommendation(&result), Recommendation::Stars(expected));
        }
    }
}
