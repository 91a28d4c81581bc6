//! HTTP header name constants.
//!
//! Headers captured on a network result. The CDN stage reads the CDN/proxy
//! identification headers back out of that map, so every name here is stored
//! lowercase.

// Infrastructure/Server identification
/// Server header (identifies server software)
pub const HEADER_SERVER: &str = "server";
/// X-Powered-By header (identifies server framework)
pub const HEADER_X_POWERED_BY: &str = "x-powered-by";

// CDN/Proxy identification
/// CF-Ray header (Cloudflare request ID)
pub const HEADER_CF_RAY: &str = "cf-ray";
/// CF-Cache-Status header (Cloudflare cache status)
pub const HEADER_CF_CACHE_STATUS: &str = "cf-cache-status";
/// X-Served-By header (Fastly server identification)
pub const HEADER_X_SERVED_BY: &str = "x-served-by";
/// X-Fastly-Request-ID header
pub const HEADER_X_FASTLY_REQUEST_ID: &str = "x-fastly-request-id";
/// X-Amz-Cf-Id header (Amazon CloudFront request ID)
pub const HEADER_X_AMZ_CF_ID: &str = "x-amz-cf-id";
/// X-Akamai-Transformed header
pub const HEADER_X_AKAMAI_TRANSFORMED: &str = "x-akamai-transformed";
/// X-Azure-Ref header (Azure Front Door)
pub const HEADER_X_AZURE_REF: &str = "x-azure-ref";
/// X-CDN header (generic CDN marker)
pub const HEADER_X_CDN: &str = "x-cdn";
/// Via header (proxy chain information)
pub const HEADER_VIA: &str = "via";

// Performance/Monitoring
/// X-Cache header (cache status)
pub const HEADER_X_CACHE: &str = "x-cache";

/// List of HTTP headers to capture on a network result.
pub const HTTP_HEADERS: &[&str] = &[
    HEADER_SERVER,
    HEADER_X_POWERED_BY,
    HEADER_CF_RAY,
    HEADER_CF_CACHE_STATUS,
    HEADER_X_SERVED_BY,
    HEADER_X_FASTLY_REQUEST_ID,
    HEADER_X_AMZ_CF_ID,
    HEADER_X_AKAMAI_TRANSFORMED,
    HEADER_X_AZURE_REF,
    HEADER_X_CDN,
    HEADER_VIA,
    HEADER_X_CACHE,
];
