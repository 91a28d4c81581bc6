//! HTTPS page fetch with manual redirect tracking.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::StatusCode;
use serde::Serialize;
use tokio_retry::Retry;
use url::Url;

use crate::config::{HTTP_HEADERS, MAX_HEADER_VALUE_LENGTH, MAX_REDIRECT_HOPS};
use crate::error_handling::{get_retry_strategy, ProbeError};

/// Outcome of requesting `https://<domain>/`, after redirects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFetch {
    /// Status of the last response in the chain
    pub status_code: u16,
    /// First URL requested
    pub url: String,
    pub final_url: String,
    /// Every URL requested, in order (the first entry is `url`)
    pub redirect_chain: Vec<String>,
    /// Selected headers of the last response, lowercase names
    pub headers: BTreeMap<String, String>,
    /// Total time across the chain
    #[serde(skip)]
    pub response_time: Duration,
    /// Time until the first response head arrived
    #[serde(skip)]
    pub first_response_time: Duration,
}

impl PageFetch {
    pub fn redirect_count(&self) -> usize {
        self.redirect_chain.len().saturating_sub(1)
    }

    /// Host of the final URL, empty if it does not parse.
    pub fn final_host(&self) -> String {
        Url::parse(&self.final_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Applies browser-like request headers.
fn apply_request_headers(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    builder
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .header(reqwest::header::ACCEPT_ENCODING, "identity")
        .header(reqwest::header::CACHE_CONTROL, "max-age=0")
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Keeps the headers of interest, lowercased and truncated.
fn capture_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    HTTP_HEADERS
        .iter()
        .filter_map(|name| {
            headers.get(*name).and_then(|value| value.to_str().ok()).map(|value| {
                let value: String = value.chars().take(MAX_HEADER_VALUE_LENGTH).collect();
                (name.to_string(), value)
            })
        })
        .collect()
}

/// Fetches `https://<domain>/`, following up to `MAX_REDIRECT_HOPS` redirects.
///
/// Each hop is retried `retries` times on transport errors. A redirect without
/// a usable `Location` ends the chain with the redirect status as the final
/// status.
pub(crate) async fn fetch_page(
    client: &reqwest::Client,
    domain: &str,
    retries: usize,
) -> Result<PageFetch, ProbeError> {
    let start_url = format!("https://{domain}/");
    let mut current = Url::parse(&start_url)
        .map_err(|e| ProbeError::Http(format!("invalid URL {start_url}: {e}")))?;
    let mut chain: Vec<String> = Vec::new();
    let mut first_response_time = None;
    let started = Instant::now();

    loop {
        chain.push(current.to_string());
        let request_url = current.clone();
        let resp = Retry::spawn(get_retry_strategy(retries), || {
            apply_request_headers(client.get(request_url.clone())).send()
        })
        .await
        .map_err(|e| {
            debug!("request to {request_url} failed: {e}");
            ProbeError::from(&e)
        })?;
        first_response_time.get_or_insert_with(|| started.elapsed());

        let status = resp.status();
        if is_redirect(status) && chain.len() <= MAX_REDIRECT_HOPS {
            let location = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|loc| loc.to_str().ok())
                .and_then(|loc| current.join(loc).ok());
            match location {
                Some(next) => {
                    current = next;
                    continue;
                }
                None => {
                    warn!("Redirect status {} for {} but no usable Location header", status, current);
                }
            }
        }

        return Ok(PageFetch {
            status_code: status.as_u16(),
            url: start_url,
            final_url: current.to_string(),
            redirect_chain: chain,
            headers: capture_headers(resp.headers()),
            response_time: started.elapsed(),
            first_response_time: first_response_time.unwrap_or_default(),
        });
    }
}
