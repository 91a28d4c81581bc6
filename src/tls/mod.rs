//! Raw TLS handshake probe.
//!
//! This module connects to port 443 and reports what the server negotiates:
//! - Protocol version and cipher suite
//! - ALPN protocol (HTTP/2 support)
//! - Key exchange group (X25519 support)
//! - Leaf certificate details and the WebPKI verification outcome
//!
//! Uses `tokio-rustls` for async TLS connections and `x509-parser` for certificate parsing.
//! The handshake never fails on certificate problems; those are recorded on the
//! returned [`TlsHandshake`] instead.

mod extract;
mod verifier;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{NamedGroup, ProtocolVersion, SupportedProtocolVersion};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::config::{Config, TCP_CONNECT_TIMEOUT_SECS, TLS12_VERSION, TLS13_VERSION, TLS_HANDSHAKE_TIMEOUT_SECS};
use crate::error_handling::{InitializationError, ProbeError};

pub use extract::{dns_name_matches, parse_leaf_certificate, PeerCertificate};
use verifier::RecordingVerifier;

const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// What a completed handshake negotiated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsHandshake {
    /// Human-readable protocol version ("TLS 1.3")
    pub protocol_version: String,
    pub is_tls13: bool,
    pub cipher_suite: String,
    /// Negotiated ALPN protocol, if any
    pub alpn_protocol: Option<String>,
    pub key_exchange_group: Option<String>,
    /// True when X25519 was negotiated, possibly by the follow-up probe
    pub supports_x25519: bool,
    #[serde(skip)]
    pub handshake_time: Duration,
    pub leaf_certificate: Option<PeerCertificate>,
    /// Leaf certificate missing or unparseable
    pub certificate_error: Option<String>,
    /// WebPKI rejection of the presented chain for this name
    pub verification_error: Option<String>,
}

impl TlsHandshake {
    pub fn supports_http2(&self) -> bool {
        self.alpn_protocol.as_deref() == Some("h2")
    }
}

/// Reusable handshake prober. Built once per checker and shared by all workers.
#[derive(Debug)]
pub struct TlsProber {
    provider: Arc<CryptoProvider>,
    x25519_provider: Arc<CryptoProvider>,
    webpki: Arc<WebPkiServerVerifier>,
    versions: Vec<&'static SupportedProtocolVersion>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl TlsProber {
    /// Builds the prober from the TLS and network settings.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::TlsClientError` if the root store cannot
    /// back a verifier or the configured version range is empty.
    pub fn new(config: &Config) -> Result<Self, InitializationError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut x25519_only = rustls::crypto::ring::default_provider();
        x25519_only.kx_groups = vec![rustls::crypto::ring::kx_group::X25519];

        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let webpki =
            WebPkiServerVerifier::builder_with_provider(Arc::new(root_store), provider.clone())
                .build()
                .map_err(|e| InitializationError::TlsClientError(e.to_string()))?;

        let versions = protocol_versions(config.tls.min_version, config.tls.max_version);
        if versions.is_empty() {
            return Err(InitializationError::TlsClientError(format!(
                "no TLS version in range {:#06x}..={:#06x}",
                config.tls.min_version, config.tls.max_version
            )));
        }

        Ok(Self {
            provider,
            x25519_provider: Arc::new(x25519_only),
            webpki,
            versions,
            connect_timeout: config
                .network
                .timeout
                .min(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS)),
            handshake_timeout: config
                .network
                .timeout
                .min(Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS)),
        })
    }

    /// Handshakes with `domain` (SNI = `domain`), connecting to `ip` when the
    /// address is already known.
    ///
    /// When the first handshake lands on TLS 1.3 with another group, a second
    /// TLS 1.3 handshake offering only X25519 decides X25519 support.
    pub async fn handshake(&self, domain: &str, ip: Option<IpAddr>) -> Result<TlsHandshake, ProbeError> {
        let verifier = Arc::new(RecordingVerifier::new(self.webpki.clone()));
        let (stream, handshake_time) = self
            .connect(domain, ip, self.provider.clone(), &self.versions, verifier.clone())
            .await?;
        let (_, conn) = stream.get_ref();

        let protocol = conn.protocol_version();
        let is_tls13 = protocol == Some(ProtocolVersion::TLSv1_3);
        let group = conn.negotiated_key_exchange_group().map(|g| g.name());
        let mut supports_x25519 = group == Some(NamedGroup::X25519);

        let (leaf_certificate, certificate_error) = match conn
            .peer_certificates()
            .and_then(|certs| certs.first())
        {
            Some(der) => match parse_leaf_certificate(der.as_ref()) {
                Ok(cert) => (Some(cert), None),
                Err(e) => (None, Some(e)),
            },
            None => (None, Some("server presented no certificate".to_string())),
        };

        let mut handshake = TlsHandshake {
            protocol_version: protocol.map(describe_version).unwrap_or_else(|| "Unknown".to_string()),
            is_tls13,
            cipher_suite: conn
                .negotiated_cipher_suite()
                .map(|cs| format!("{:?}", cs.suite()))
                .unwrap_or_default(),
            alpn_protocol: conn
                .alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
            key_exchange_group: group.map(|g| format!("{g:?}")),
            supports_x25519,
            handshake_time,
            leaf_certificate,
            certificate_error,
            verification_error: verifier.verification_error(),
        };
        drop(stream);

        if is_tls13 && !supports_x25519 {
            supports_x25519 = self.probe_x25519(domain, ip).await;
            debug!("X25519 follow-up probe for {domain}: {supports_x25519}");
            handshake.supports_x25519 = supports_x25519;
        }

        Ok(handshake)
    }

    async fn probe_x25519(&self, domain: &str, ip: Option<IpAddr>) -> bool {
        let verifier = Arc::new(RecordingVerifier::new(self.webpki.clone()));
        match self
            .connect(
                domain,
                ip,
                self.x25519_provider.clone(),
                &[&rustls::version::TLS13],
                verifier,
            )
            .await
        {
            Ok((stream, _)) => {
                stream.get_ref().1.negotiated_key_exchange_group().map(|g| g.name())
                    == Some(NamedGroup::X25519)
            }
            Err(_) => false,
        }
    }

    async fn connect(
        &self,
        domain: &str,
        ip: Option<IpAddr>,
        provider: Arc<CryptoProvider>,
        versions: &[&'static SupportedProtocolVersion],
        verifier: Arc<RecordingVerifier>,
    ) -> Result<(TlsStream<TcpStream>, Duration), ProbeError> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| ProbeError::TlsHandshake(format!("invalid server name {domain}: {e}")))?;

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(versions)
            .map_err(|e| ProbeError::TlsHandshake(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();
        config.alpn_protocols = vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()];

        let connect = async {
            match ip {
                Some(ip) => TcpStream::connect((ip, 443)).await,
                None => TcpStream::connect((domain, 443)).await,
            }
        };
        let sock = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(sock)) => sock,
            Ok(Err(e)) => {
                debug!("Failed to connect to {domain}:443 - {e}");
                return Err(ProbeError::Connect(format!("{domain}:443: {e}")));
            }
            Err(_) => {
                return Err(ProbeError::Connect(format!(
                    "TCP connection timeout for {domain}:443 ({}ms)",
                    self.connect_timeout.as_millis()
                )));
            }
        };

        let connector = TlsConnector::from(Arc::new(config));
        let started = Instant::now();
        match tokio::time::timeout(self.handshake_timeout, connector.connect(server_name, sock)).await {
            Ok(Ok(stream)) => Ok((stream, started.elapsed())),
            Ok(Err(e)) => {
                debug!("TLS handshake failed for {domain}: {e}");
                Err(ProbeError::TlsHandshake(e.to_string()))
            }
            Err(_) => Err(ProbeError::TlsHandshake(format!(
                "handshake timeout ({}ms)",
                self.handshake_timeout.as_millis()
            ))),
        }
    }
}

/// Protocol versions offered for a wire-version range.
fn protocol_versions(min: u16, max: u16) -> Vec<&'static SupportedProtocolVersion> {
    let mut versions = Vec::new();
    if min <= TLS13_VERSION && max >= TLS13_VERSION {
        versions.push(&rustls::version::TLS13);
    }
    if min <= TLS12_VERSION && max >= TLS12_VERSION {
        versions.push(&rustls::version::TLS12);
    }
    versions
}

fn describe_version(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLS 1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLS 1.2".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_versions_default_range() {
        let versions = protocol_versions(TLS12_VERSION, TLS13_VERSION);
        assert_eq!(versions.len(), 2);
    }

    #[test]
    fn test_protocol_versions_tls13_only() {
        let versions = protocol_versions(TLS13_VERSION, TLS13_VERSION);
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, ProtocolVersion::TLSv1_3);
    }

    #[test]
    fn test_protocol_versions_empty_range() {
        assert!(protocol_versions(TLS13_VERSION, TLS12_VERSION).is_empty());
    }

    #[test]
    fn test_describe_version() {
        assert_eq!(describe_version(ProtocolVersion::TLSv1_3), "TLS 1.3");
        assert_eq!(describe_version(ProtocolVersion::TLSv1_2), "TLS 1.2");
    }

    #[test]
    fn test_prober_builds_from_default_config() {
        let prober = TlsProber::new(&Config::default()).expect("prober should build");
        assert_eq!(prober.versions.len(), 2);
        assert!(prober.connect_timeout <= Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS));
    }

    #[test]
    fn test_supports_http2_from_alpn() {
        let mut handshake = TlsHandshake {
            protocol_version: "TLS 1.3".to_string(),
            is_tls13: true,
            cipher_suite: "TLS13_AES_128_GCM_SHA256".to_string(),
            alpn_protocol: Some("h2".to_string()),
            key_exchange_group: Some("X25519".to_string()),
            supports_x25519: true,
            handshake_time: Duration::from_millis(5),
            leaf_certificate: None,
            certificate_error: None,
            verification_error: None,
        };
        assert!(handshake.supports_http2());
        handshake.alpn_protocol = Some("http/1.1".to_string());
        assert!(!handshake.supports_http2());
    }
}
