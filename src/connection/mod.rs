//! Network capabilities used by the detection stages.
//!
//! Stages never open sockets themselves; they go through a [`Connections`]
//! implementation. [`ConnectionManager`] is the real one, built once per
//! checker from the configuration and shared by every worker:
//! - DNS resolution through the configured name servers
//! - IP geolocation
//! - HTTPS page fetch with redirect tracking
//! - Raw TLS handshake probing

mod geo;
mod page;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;

use crate::config::Config;
use crate::dns::resolve_host_to_ip;
use crate::error_handling::{InitializationError, ProbeError};
use crate::initialization::{init_client, init_crypto_provider, init_resolver};
use crate::tls::{TlsHandshake, TlsProber};

pub use geo::GeoLocation;
pub use page::PageFetch;

/// Network operations a pipeline needs.
#[async_trait]
pub trait Connections: Send + Sync {
    /// Resolves a domain to one IP address (IPv4 preferred).
    async fn resolve(&self, domain: &str) -> Result<IpAddr, ProbeError>;

    /// Geolocates an IP address.
    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation, ProbeError>;

    /// Requests `https://<domain>/` and follows redirects.
    async fn fetch_page(&self, domain: &str) -> Result<PageFetch, ProbeError>;

    /// Performs a raw TLS handshake with SNI `domain`.
    async fn tls_handshake(&self, domain: &str, ip: Option<IpAddr>) -> Result<TlsHandshake, ProbeError>;
}

/// Production [`Connections`] over reqwest, hickory and rustls.
pub struct ConnectionManager {
    client: Arc<reqwest::Client>,
    resolver: Arc<TokioAsyncResolver>,
    prober: TlsProber,
    geo_endpoint: String,
    retries: usize,
}

impl ConnectionManager {
    /// Builds the HTTP client, resolver and TLS prober.
    ///
    /// # Errors
    ///
    /// Returns an `InitializationError` if any of the three cannot be built.
    pub fn new(config: &Config) -> Result<Self, InitializationError> {
        init_crypto_provider();
        let resolver = init_resolver(config)?;
        Ok(Self {
            client: init_client(config, Arc::clone(&resolver))?,
            resolver,
            prober: TlsProber::new(config)?,
            geo_endpoint: config.detection.geo_endpoint.clone(),
            retries: usize::try_from(config.network.retries).unwrap_or(0),
        })
    }
}

#[async_trait]
impl Connections for ConnectionManager {
    async fn resolve(&self, domain: &str) -> Result<IpAddr, ProbeError> {
        resolve_host_to_ip(domain, &self.resolver).await
    }

    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation, ProbeError> {
        geo::lookup_ip(&self.client, &self.geo_endpoint, ip).await
    }

    async fn fetch_page(&self, domain: &str) -> Result<PageFetch, ProbeError> {
        page::fetch_page(&self.client, domain, self.retries).await
    }

    async fn tls_handshake(&self, domain: &str, ip: Option<IpAddr>) -> Result<TlsHandshake, ProbeError> {
        self.prober.handshake(domain, ip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_manager_builds_from_defaults() {
        let manager = ConnectionManager::new(&Config::default()).expect("manager should build");
        assert_eq!(manager.retries, 1);
    }

    #[tokio::test]
    async fn test_resolve_ip_literal_skips_dns() {
        let manager = ConnectionManager::new(&Config::default()).expect("manager should build");
        let ip = manager.resolve("127.0.0.1").await.expect("literal resolves");
        assert_eq!(ip, "127.0.0.1".parse::<IpAddr>().unwrap());
    }
}
