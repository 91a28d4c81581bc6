//! HTTP client initialization.

use std::sync::Arc;

use hickory_resolver::TokioAsyncResolver;
use reqwest::ClientBuilder;

use crate::config::Config;
use crate::dns::HickoryResolve;

/// Initializes the HTTP client used by the network and location probes.
///
/// Redirects are disabled so the network stage can record every hop of the
/// redirect chain itself. The client-wide timeout is `network.timeout`.
/// Host names are looked up through `resolver`, the same hickory resolver the
/// resolution stage uses, so fetches honor `network.dns_servers`.
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(
    config: &Config,
    resolver: Arc<TokioAsyncResolver>,
) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .dns_resolver(Arc::new(HickoryResolve::new(resolver)))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.network.timeout)
        .connect_timeout(config.network.timeout)
        .user_agent(config.network.user_agent.clone())
        .build()?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::init_resolver;

    #[tokio::test]
    async fn test_init_client_with_defaults() {
        let config = Config::default();
        let resolver = init_resolver(&config).expect("resolver");
        assert!(init_client(&config, resolver).is_ok());
    }
}
