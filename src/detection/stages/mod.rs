//! Concrete detection stages, in pipeline order.

mod blocked;
mod cdn;
mod certificate;
mod location;
mod network;
mod sni;
mod tls;

pub use blocked::BlockedStage;
pub use cdn::CdnStage;
pub use certificate::{evaluate_certificate, CertificateStage};
pub use location::LocationStage;
pub use network::NetworkStage;
pub use sni::SniStage;
pub use tls::{missing_capabilities, TlsStage};

use crate::config::Config;
use crate::detection::DetectionStage;

/// The full stage set for a configuration.
pub fn default_stages(config: &Config) -> Vec<Box<dyn DetectionStage>> {
    vec![
        Box::new(BlockedStage::new(&config.detection.blocked_domains)),
        Box::new(LocationStage),
        Box::new(NetworkStage),
        Box::new(TlsStage),
        Box::new(SniStage),
        Box::new(CertificateStage),
        Box::new(CdnStage::new(&config.detection.hot_domains)),
    ]
}
