//! Certificate extraction utilities.

use chrono::{DateTime, Utc};
use serde::Serialize;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// Leaf certificate fields needed by the SNI and certificate stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerCertificate {
    pub subject: String,
    pub issuer: String,
    pub common_name: Option<String>,
    pub sans: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl PeerCertificate {
    /// Names the certificate vouches for: SAN DNS names, or the subject CN
    /// when the certificate carries no SAN extension.
    pub fn names(&self) -> Vec<&str> {
        if self.sans.is_empty() {
            self.common_name.iter().map(String::as_str).collect()
        } else {
            self.sans.iter().map(String::as_str).collect()
        }
    }

    /// True when any certificate name covers `host`.
    pub fn matches_host(&self, host: &str) -> bool {
        self.names()
            .into_iter()
            .any(|pattern| dns_name_matches(pattern, host))
    }

    /// True when `at` lies inside the validity window.
    pub fn is_within_validity(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// Matches a certificate DNS name against a host, RFC 6125 style.
///
/// A wildcard is only honored as the complete left-most label and covers
/// exactly one label (`*.example.com` matches `www.example.com`, not
/// `example.com` or `a.b.example.com`).
pub fn dns_name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}

/// Parses a DER-encoded leaf certificate.
///
/// # Errors
///
/// Returns a description of the failure when the DER cannot be parsed or the
/// validity timestamps are out of range.
pub fn parse_leaf_certificate(der: &[u8]) -> Result<PeerCertificate, String> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(der).map_err(|e| format!("parse error: {e}"))?;

    let validity = cert.validity();
    let not_before = DateTime::<Utc>::from_timestamp(validity.not_before.timestamp(), 0)
        .ok_or_else(|| "not_before out of range".to_string())?;
    let not_after = DateTime::<Utc>::from_timestamp(validity.not_after.timestamp(), 0)
        .ok_or_else(|| "not_after out of range".to_string())?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);

    Ok(PeerCertificate {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        common_name,
        sans: extract_certificate_sans(&cert),
        not_before,
        not_after,
    })
}

/// Extracts DNS names from the Subject Alternative Name extension.
///
/// IP addresses, e-mail addresses and other name types are ignored.
fn extract_certificate_sans(cert: &x509_parser::certificate::X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(ref san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    sans.push(dns_name.to_string());
                }
            }
        }
    }

    sans
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn certificate(sans: &[&str], cn: Option<&str>) -> PeerCertificate {
        PeerCertificate {
            subject: "CN=test".to_string(),
            issuer: "CN=Test CA".to_string(),
            common_name: cn.map(str::to_string),
            sans: sans.iter().map(|s| s.to_string()).collect(),
            not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        assert!(dns_name_matches("Example.COM", "example.com"));
        assert!(dns_name_matches("example.com.", "example.com"));
        assert!(!dns_name_matches("example.com", "example.org"));
    }

    #[test]
    fn test_wildcard_covers_one_label() {
        assert!(dns_name_matches("*.example.com", "www.example.com"));
        assert!(!dns_name_matches("*.example.com", "example.com"));
        assert!(!dns_name_matches("*.example.com", "a.b.example.com"));
        assert!(!dns_name_matches("*.example.com", ".example.com"));
    }

    #[test]
    fn test_empty_names_never_match() {
        assert!(!dns_name_matches("", "example.com"));
        assert!(!dns_name_matches("example.com", ""));
    }

    #[test]
    fn test_sans_take_precedence_over_cn() {
        let cert = certificate(&["www.example.com"], Some("example.com"));
        assert!(cert.matches_host("www.example.com"));
        assert!(!cert.matches_host("example.com"));
    }

    #[test]
    fn test_cn_fallback_without_sans() {
        let cert = certificate(&[], Some("example.com"));
        assert!(cert.matches_host("example.com"));
    }

    #[test]
    fn test_validity_window() {
        let cert = certificate(&["example.com"], None);
        assert!(cert.is_within_validity(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        assert!(!cert.is_within_validity(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()));
        assert!(!cert.is_within_validity(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = parse_leaf_certificate(&[0x30, 0x03, 0x01, 0x02]).unwrap_err();
        assert!(err.starts_with("parse error"), "unexpected error: {err}");
    }
}
