//! DNS resolution.
//!
//! This module provides async forward lookups using `hickory-resolver`. The
//! resolver is built once by `initialization::init_resolver` and shared by all
//! pipeline runs; it keeps its own short-TTL answer cache internally. The same
//! resolver backs the HTTP client through [`HickoryResolve`].

mod http_resolver;
mod resolution;

// Re-export public API
pub use http_resolver::HickoryResolve;
pub use resolution::resolve_host_to_ip;
