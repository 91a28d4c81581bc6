//! reality_checker library: camouflage-target suitability checks
//!
//! This library checks whether domains make good camouflage targets for a
//! Reality-style TLS proxy. Each domain runs through an ordered detection
//! pipeline (block list, location, HTTP reachability, TLS 1.3 / X25519 /
//! HTTP/2, SNI, certificate, CDN) that stops early once a verdict is final.
//! Batches run on a bounded worker pool and always return one result per
//! input domain, in input order.
//!
//! # Example
//!
//! ```no_run
//! use reality_checker::report::{render_text, BatchReport};
//! use reality_checker::{BatchManager, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! reality_checker::initialization::init_crypto_provider();
//!
//! let mut manager = BatchManager::new(Config::default());
//! manager.start()?;
//!
//! let domains = vec!["www.microsoft.com".to_string(), "www.apple.com".to_string()];
//! let start = chrono::Utc::now();
//! let results = manager.check_domains(&domains, &CancellationToken::new()).await?;
//! let report = BatchReport::new(results, start, chrono::Utc::now());
//! println!("{}", render_text(&report, true));
//!
//! manager.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod batch;
pub mod cache;
pub mod config;
pub mod connection;
pub mod detection;
mod dns;
pub mod error_handling;
pub mod initialization;
pub mod models;
pub mod report;
pub mod scoring;
pub mod tls;

// Re-export public API
pub use batch::{BatchManager, ProgressEvent, ProgressObserver, ProgressOutcome};
pub use config::{Config, LogFormat, LogLevel, OutputFormat};
pub use connection::{ConnectionManager, Connections, GeoLocation, PageFetch};
pub use error_handling::{CheckerError, InitializationError, ProbeError};
pub use models::{DetectionResult, StatusCodeCategory};
pub use report::BatchReport;
pub use scoring::Recommendation;
pub use tls::TlsHandshake;
