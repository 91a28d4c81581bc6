//! CDN and popularity stage.
//!
//! Signals are collected from the response headers, the network owner found
//! by the location stage and the leaf certificate. Each signal carries a
//! weight; the verdict's confidence follows the strongest and the sum.

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::debug;

use crate::config::{
    HEADER_CF_CACHE_STATUS, HEADER_CF_RAY, HEADER_SERVER, HEADER_VIA, HEADER_X_AKAMAI_TRANSFORMED,
    HEADER_X_AMZ_CF_ID, HEADER_X_AZURE_REF, HEADER_X_CACHE, HEADER_X_CDN,
    HEADER_X_FASTLY_REQUEST_ID, HEADER_X_SERVED_BY,
};
use crate::detection::stages::blocked::is_subdomain_of;
use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::{CdnConfidence, CdnResult, LocationResult};
use crate::tls::PeerCertificate;

/// Popular sites that make poor, conspicuous cover.
const HOT_DOMAINS: &[&str] = &[
    "apple.com",
    "icloud.com",
    "microsoft.com",
    "live.com",
    "office.com",
    "bing.com",
    "amazon.com",
    "aws.amazon.com",
    "yahoo.com",
    "baidu.com",
    "qq.com",
    "taobao.com",
    "tmall.com",
    "jd.com",
    "weibo.com",
    "bilibili.com",
    "github.com",
    "linkedin.com",
    "zoom.us",
    "adobe.com",
    "cloudflare.com",
    "akamai.com",
    "tesla.com",
    "samsung.com",
    "nvidia.com",
    "intel.com",
    "paypal.com",
    "ebay.com",
    "spotify.com",
    "tiktok.com",
];

const STRONG: u8 = 3;
const MEDIUM: u8 = 2;
const WEAK: u8 = 1;

/// Header name, value fragment (empty = presence is enough), provider, weight.
const HEADER_SIGNATURES: &[(&str, &str, &str, u8)] = &[
    (HEADER_CF_RAY, "", "Cloudflare", STRONG),
    (HEADER_CF_CACHE_STATUS, "", "Cloudflare", STRONG),
    (HEADER_SERVER, "cloudflare", "Cloudflare", STRONG),
    (HEADER_X_AMZ_CF_ID, "", "Amazon CloudFront", STRONG),
    (HEADER_VIA, "cloudfront", "Amazon CloudFront", STRONG),
    (HEADER_X_CACHE, "cloudfront", "Amazon CloudFront", STRONG),
    (HEADER_SERVER, "cloudfront", "Amazon CloudFront", STRONG),
    (HEADER_X_FASTLY_REQUEST_ID, "", "Fastly", STRONG),
    (HEADER_X_SERVED_BY, "cache-", "Fastly", MEDIUM),
    (HEADER_VIA, "varnish", "Fastly", WEAK),
    (HEADER_X_AKAMAI_TRANSFORMED, "", "Akamai", STRONG),
    (HEADER_SERVER, "akamaighost", "Akamai", STRONG),
    (HEADER_X_AZURE_REF, "", "Azure Front Door", STRONG),
    (HEADER_SERVER, "bunnycdn", "BunnyCDN", STRONG),
    (HEADER_SERVER, "cdn77", "CDN77", STRONG),
    (HEADER_SERVER, "ecacc", "Edgecast", MEDIUM),
    (HEADER_SERVER, "tengine", "Alibaba Cloud CDN", WEAK),
    (HEADER_X_CDN, "", "", MEDIUM),
    (HEADER_VIA, "", "", WEAK),
];

/// Lowercase fragment of an ISP/ASN name, provider.
const NETWORK_SIGNATURES: &[(&str, &str)] = &[
    ("cloudflare", "Cloudflare"),
    ("akamai", "Akamai"),
    ("fastly", "Fastly"),
    ("cloudfront", "Amazon CloudFront"),
    ("incapsula", "Imperva"),
    ("imperva", "Imperva"),
    ("edgecast", "Edgecast"),
    ("stackpath", "StackPath"),
    ("cdn77", "CDN77"),
    ("bunny", "BunnyCDN"),
    ("limelight", "Limelight"),
];

/// Certificate SAN suffix or issuer fragment, provider.
const CERTIFICATE_SIGNATURES: &[(&str, &str)] = &[
    ("cloudflaressl.com", "Cloudflare"),
    ("cloudflare", "Cloudflare"),
    ("akamaized.net", "Akamai"),
    ("akamaiedge.net", "Akamai"),
    ("fastly.net", "Fastly"),
    ("fastly", "Fastly"),
    ("cloudfront.net", "Amazon CloudFront"),
    ("incapsula.com", "Imperva"),
];

#[derive(Debug)]
struct Signal {
    provider: String,
    weight: u8,
    evidence: String,
}

fn header_signals(headers: &BTreeMap<String, String>) -> Vec<Signal> {
    HEADER_SIGNATURES
        .iter()
        .filter_map(|&(name, fragment, provider, weight)| {
            let value = headers.get(name)?;
            let lower = value.to_ascii_lowercase();
            if !fragment.is_empty() && !lower.contains(fragment) {
                return None;
            }
            let provider = if provider.is_empty() {
                value.trim().to_string()
            } else {
                provider.to_string()
            };
            Some(Signal {
                provider,
                weight,
                evidence: format!("header {name}: {value}"),
            })
        })
        .collect()
}

fn network_signals(location: &LocationResult) -> Vec<Signal> {
    let owner = format!("{} {}", location.isp, location.asn).to_ascii_lowercase();
    NETWORK_SIGNATURES
        .iter()
        .filter(|(fragment, _)| owner.contains(fragment))
        .map(|&(_, provider)| Signal {
            provider: provider.to_string(),
            weight: MEDIUM,
            evidence: format!("network owner {}", owner.trim()),
        })
        .take(1)
        .collect()
}

fn certificate_signals(leaf: &PeerCertificate) -> Vec<Signal> {
    let issuer = leaf.issuer.to_ascii_lowercase();
    CERTIFICATE_SIGNATURES
        .iter()
        .find_map(|&(fragment, provider)| {
            let san = leaf
                .sans
                .iter()
                .find(|san| san.to_ascii_lowercase().ends_with(fragment));
            match san {
                Some(san) => Some(Signal {
                    provider: provider.to_string(),
                    weight: MEDIUM,
                    evidence: format!("certificate SAN {san}"),
                }),
                None if issuer.contains(fragment) => Some(Signal {
                    provider: provider.to_string(),
                    weight: MEDIUM,
                    evidence: format!("certificate issuer {}", leaf.issuer),
                }),
                None => None,
            }
        })
        .into_iter()
        .collect()
}

/// Folds signals into a verdict.
///
/// Confidence is high with a strong signal or a total weight of four, medium
/// from a total weight of two and low otherwise. Only medium or high
/// confidence marks the site as a CDN.
fn verdict_from_signals(signals: Vec<Signal>, is_hot_website: bool) -> CdnResult {
    let total: u32 = signals.iter().map(|s| u32::from(s.weight)).sum();
    let strongest = signals.iter().max_by_key(|s| s.weight).map(|s| s.weight);
    let confidence = match strongest {
        None => None,
        Some(w) if w >= STRONG || total >= 4 => Some(CdnConfidence::High),
        Some(_) if total >= 2 => Some(CdnConfidence::Medium),
        Some(_) => Some(CdnConfidence::Low),
    };
    // First signal of the highest weight names the provider
    let provider = signals
        .iter()
        .filter(|s| Some(s.weight) == strongest)
        .map(|s| s.provider.clone())
        .find(|p| !p.is_empty());

    CdnResult {
        is_cdn: matches!(confidence, Some(CdnConfidence::High | CdnConfidence::Medium)),
        provider,
        confidence,
        evidence: signals.into_iter().map(|s| s.evidence).collect(),
        is_hot_website,
    }
}

pub struct CdnStage {
    hot: Vec<String>,
}

impl CdnStage {
    /// Built-in popular list plus `extra` entries.
    pub fn new(extra: &[String]) -> Self {
        let mut hot: Vec<String> = HOT_DOMAINS.iter().map(|d| d.to_string()).collect();
        hot.extend(
            extra
                .iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        );
        Self { hot }
    }

    pub fn is_hot_website(&self, domain: &str) -> bool {
        self.hot
            .iter()
            .any(|entry| entry == domain || is_subdomain_of(domain, entry))
    }

    fn record(ctx: &mut PipelineContext<'_>, verdict: CdnResult) -> Result<(), ProbeError> {
        let outcome = if verdict.is_cdn {
            Err(ProbeError::CdnDetected(
                verdict
                    .provider
                    .clone()
                    .unwrap_or_else(|| "unknown provider".to_string()),
            ))
        } else {
            Ok(())
        };
        ctx.result.cdn = Some(verdict);
        outcome
    }
}

#[async_trait]
impl DetectionStage for CdnStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let mut signals = Vec::new();
        if let Some(network) = &ctx.result.network {
            signals.extend(header_signals(&network.headers));
        }
        if let Some(location) = &ctx.result.location {
            signals.extend(network_signals(location));
        }
        if let Some(leaf) = ctx.handshake.as_ref().and_then(|h| h.leaf_certificate.as_ref()) {
            signals.extend(certificate_signals(leaf));
        }

        let verdict = verdict_from_signals(signals, self.is_hot_website(&ctx.domain));
        debug!(
            "CDN verdict for {}: cdn={} provider={:?} confidence={:?}",
            ctx.domain, verdict.is_cdn, verdict.provider, verdict.confidence
        );
        ctx.cache.put_cdn(&ctx.domain, verdict.clone());
        Self::record(ctx, verdict)
    }

    fn can_early_exit(&self) -> bool {
        false
    }

    fn priority(&self) -> u32 {
        70
    }

    fn name(&self) -> &'static str {
        "cdn"
    }

    fn restore_cached(&self, ctx: &mut PipelineContext<'_>) -> Option<Result<(), ProbeError>> {
        let verdict = ctx.cache.get_cdn(&ctx.domain)?;
        debug!("CDN cache hit for {}", ctx.domain);
        Some(Self::record(ctx, verdict))
    }
}
