// Shared test helpers: an in-memory `Connections` implementation.
//
// Every domain behaves like a healthy foreign cover site unless a `FakeHost`
// override says otherwise. Delays use `tokio::time`, so tests running with a
// paused clock finish instantly.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use reality_checker::tls::PeerCertificate;
use reality_checker::{Config, Connections, GeoLocation, PageFetch, ProbeError, TlsHandshake};

/// How one fake domain answers.
#[derive(Debug, Clone)]
#[allow(dead_code)] // Not every test file overrides every field
pub struct FakeHost {
    pub ip: IpAddr,
    pub country_code: String,
    pub isp: String,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub tls13: bool,
    pub x25519: bool,
    pub http2: bool,
    pub certificate_names: Option<Vec<String>>,
    pub certificate_expired: bool,
    pub handshake_time: Duration,
    pub fetch_delay: Duration,
    pub hang_fetch: bool,
    pub dns_fails: bool,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
            country_code: "US".to_string(),
            isp: "Example Hosting".to_string(),
            status_code: 200,
            headers: BTreeMap::new(),
            tls13: true,
            x25519: true,
            http2: true,
            certificate_names: None,
            certificate_expired: false,
            handshake_time: Duration::from_millis(5),
            fetch_delay: Duration::ZERO,
            hang_fetch: false,
            dns_fails: false,
        }
    }
}

/// Counting fake of the network layer.
#[derive(Default)]
pub struct FakeConnections {
    hosts: HashMap<String, FakeHost>,
    default_host: FakeHost,
    pub resolve_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub handshake_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

#[allow(dead_code)] // Used by other test files
impl FakeConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, domain: &str, host: FakeHost) -> Self {
        self.hosts.insert(domain.to_string(), host);
        self
    }

    /// Applies `host` to every domain without an explicit override.
    pub fn with_default(mut self, host: FakeHost) -> Self {
        self.default_host = host;
        self
    }

    fn host(&self, domain: &str) -> &FakeHost {
        self.hosts.get(domain).unwrap_or(&self.default_host)
    }

    fn host_by_ip(&self, ip: IpAddr) -> &FakeHost {
        self.hosts
            .values()
            .find(|h| h.ip == ip)
            .unwrap_or(&self.default_host)
    }
}

#[async_trait]
impl Connections for FakeConnections {
    async fn resolve(&self, domain: &str) -> Result<IpAddr, ProbeError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let host = self.host(domain);
        if host.dns_fails {
            return Err(ProbeError::Dns(format!("{domain}: NXDOMAIN")));
        }
        Ok(host.ip)
    }

    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation, ProbeError> {
        let host = self.host_by_ip(ip);
        Ok(GeoLocation {
            country: host.country_code.clone(),
            country_code: host.country_code.clone(),
            region: String::new(),
            city: String::new(),
            isp: host.isp.clone(),
            asn: "AS64500".to_string(),
        })
    }

    async fn fetch_page(&self, domain: &str) -> Result<PageFetch, ProbeError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let host = self.host(domain);
        if host.hang_fetch {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(host.fetch_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let url = format!("https://{domain}/");
        Ok(PageFetch {
            status_code: host.status_code,
            url: url.clone(),
            final_url: url.clone(),
            redirect_chain: vec![url],
            headers: host.headers.clone(),
            response_time: host.fetch_delay,
            first_response_time: host.fetch_delay,
        })
    }

    async fn tls_handshake(&self, domain: &str, _ip: Option<IpAddr>) -> Result<TlsHandshake, ProbeError> {
        self.handshake_calls.fetch_add(1, Ordering::SeqCst);
        let host = self.host(domain);
        let names = host
            .certificate_names
            .clone()
            .unwrap_or_else(|| vec![domain.to_string()]);
        let now = Utc::now();
        let not_after = if host.certificate_expired {
            now - chrono::Duration::days(1)
        } else {
            now + chrono::Duration::days(90)
        };
        Ok(TlsHandshake {
            protocol_version: if host.tls13 { "TLS 1.3" } else { "TLS 1.2" }.to_string(),
            is_tls13: host.tls13,
            cipher_suite: "TLS13_AES_128_GCM_SHA256".to_string(),
            alpn_protocol: Some(if host.http2 { "h2" } else { "http/1.1" }.to_string()),
            key_exchange_group: Some(if host.x25519 { "X25519" } else { "secp256r1" }.to_string()),
            supports_x25519: host.x25519,
            handshake_time: host.handshake_time,
            leaf_certificate: Some(PeerCertificate {
                subject: format!("CN={}", names[0]),
                issuer: "CN=Example Test CA".to_string(),
                common_name: Some(names[0].clone()),
                sans: names,
                not_before: now - chrono::Duration::days(30),
                not_after,
            }),
            certificate_error: None,
            verification_error: None,
        })
    }
}

/// Config with caches off, so every check exercises the fake.
#[allow(dead_code)]
pub fn uncached_config() -> Config {
    let mut config = Config::default();
    config.cache.dns_enabled = false;
    config.cache.cdn_enabled = false;
    config.cache.result_enabled = false;
    config
}

#[allow(dead_code)]
pub fn domains(names: &[&str]) -> Vec<String> {
    names.iter().map(|d| d.to_string()).collect()
}
