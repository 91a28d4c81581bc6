//! Shared resource setup.
//!
//! This module provides functions to initialize all shared resources:
//! - HTTP client (redirects disabled)
//! - DNS resolver
//! - Logger
//! - Worker semaphore
//! - Process-wide rustls crypto provider

mod client;
mod logger;
mod resolver;

use std::sync::Arc;

use rustls::crypto::{ring::default_provider, CryptoProvider};
use tokio::sync::Semaphore;

pub use client::init_client;
pub use logger::init_logger_with;
pub use resolver::init_resolver;

/// Initializes a semaphore for controlling concurrency.
///
/// Each running pipeline holds one permit, so `count` is the worker pool size.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count))
}

/// Installs `ring` as the process-wide crypto provider for `rustls`.
///
/// Must run before the HTTP client is built. Reinstalling is harmless, so the
/// result is ignored.
pub fn init_crypto_provider() {
    let _ = CryptoProvider::install_default(default_provider());
}
