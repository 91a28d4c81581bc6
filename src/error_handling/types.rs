//! Error type definitions.
//!
//! Three layers of errors exist:
//! - [`InitializationError`]: shared resources could not be built
//! - [`CheckerError`]: batch-level failures (pool not started, cancellation)
//! - [`ProbeError`]: per-domain, per-stage outcomes captured on a result

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use serde::{Serialize, Serializer};
use strum_macros::{AsRefStr, EnumIter as EnumIterMacro};
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Error initializing the DNS resolver.
    #[error("DNS resolver initialization error: {0}")]
    DnsResolverError(String),

    /// Error building the TLS probe configuration.
    #[error("TLS client initialization error: {0}")]
    TlsClientError(String),
}

/// Batch-level errors. Per-domain failures never surface here.
#[derive(Error, Debug)]
pub enum CheckerError {
    /// `check_domains` was called before `start()`.
    #[error("batch manager is not running")]
    NotStarted,

    /// `start()` was called twice.
    #[error("batch manager is already running")]
    AlreadyRunning,

    /// The external cancellation token fired.
    #[error("detection cancelled")]
    Cancelled,

    /// Shared resources could not be built.
    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

/// Broad kind of a [`ProbeError`], used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProbeErrorKind {
    Blocked,
    Domestic,
    StatusCode,
    TlsRequirement,
    SniMismatch,
    CertificateInvalid,
    CdnDetected,
    Dns,
    Connect,
    TlsHandshake,
    Http,
    Certificate,
    Unreachable,
    Timeout,
}

/// Per-domain probe outcome that ends or taints a detection.
///
/// Classification verdicts (blocked, domestic, unnatural status code, missing
/// TLS capability, SNI mismatch, rejected certificate, CDN) are successful
/// detections with a negative answer; the remaining variants are technical
/// failures. `Certificate` covers a leaf that was never obtained or could not
/// be parsed, `CertificateInvalid` a leaf that was read and rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("domain is blocked ({0})")]
    Blocked(String),

    #[error("domestic website ({0})")]
    Domestic(String),

    #[error("unnatural status code {0}")]
    StatusCode(u16),

    #[error("{0}")]
    TlsRequirement(String),

    #[error("certificate does not match SNI {0}")]
    SniMismatch(String),

    #[error("certificate rejected: {0}")]
    CertificateInvalid(String),

    #[error("uses CDN ({0})")]
    CdnDetected(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid certificate: {0}")]
    Certificate(String),

    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("detection timed out")]
    Timeout,
}

impl ProbeError {
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            ProbeError::Blocked(_) => ProbeErrorKind::Blocked,
            ProbeError::Domestic(_) => ProbeErrorKind::Domestic,
            ProbeError::StatusCode(_) => ProbeErrorKind::StatusCode,
            ProbeError::TlsRequirement(_) => ProbeErrorKind::TlsRequirement,
            ProbeError::SniMismatch(_) => ProbeErrorKind::SniMismatch,
            ProbeError::CertificateInvalid(_) => ProbeErrorKind::CertificateInvalid,
            ProbeError::CdnDetected(_) => ProbeErrorKind::CdnDetected,
            ProbeError::Dns(_) => ProbeErrorKind::Dns,
            ProbeError::Connect(_) => ProbeErrorKind::Connect,
            ProbeError::TlsHandshake(_) => ProbeErrorKind::TlsHandshake,
            ProbeError::Http(_) => ProbeErrorKind::Http,
            ProbeError::Certificate(_) => ProbeErrorKind::Certificate,
            ProbeError::Unreachable(_) => ProbeErrorKind::Unreachable,
            ProbeError::Timeout => ProbeErrorKind::Timeout,
        }
    }

    /// True for classification outcomes, false for technical failures.
    pub fn is_verdict(&self) -> bool {
        matches!(
            self,
            ProbeError::Blocked(_)
                | ProbeError::Domestic(_)
                | ProbeError::StatusCode(_)
                | ProbeError::TlsRequirement(_)
                | ProbeError::SniMismatch(_)
                | ProbeError::CertificateInvalid(_)
                | ProbeError::CdnDetected(_)
        )
    }

    /// Short reason without per-domain details, used to group report lines.
    pub fn reason(&self) -> String {
        match self {
            ProbeError::Blocked(_) => "domain is blocked".to_string(),
            ProbeError::Domestic(_) => "domestic website".to_string(),
            ProbeError::StatusCode(code) => format!("unnatural status code {code}"),
            ProbeError::TlsRequirement(requirement) => requirement.clone(),
            ProbeError::SniMismatch(_) => "certificate does not match SNI".to_string(),
            ProbeError::CertificateInvalid(_) => "certificate rejected".to_string(),
            ProbeError::CdnDetected(_) => "uses CDN".to_string(),
            ProbeError::Dns(_) => "DNS resolution failed".to_string(),
            ProbeError::Connect(_) => "connection failed".to_string(),
            ProbeError::TlsHandshake(_) => "TLS handshake failed".to_string(),
            ProbeError::Http(_) => "HTTP request failed".to_string(),
            ProbeError::Certificate(_) => "invalid certificate".to_string(),
            ProbeError::Unreachable(_) => "network unreachable".to_string(),
            ProbeError::Timeout => "detection timed out".to_string(),
        }
    }
}

impl Serialize for ProbeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<&ReqwestError> for ProbeError {
    fn from(error: &ReqwestError) -> Self {
        if error.is_timeout() {
            ProbeError::Timeout
        } else if error.is_connect() {
            ProbeError::Unreachable(error.to_string())
        } else {
            ProbeError::Http(error.to_string())
        }
    }
}
