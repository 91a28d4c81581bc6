//! TLS capability stage.

use async_trait::async_trait;

use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::TlsResult;

/// Handshakes with the domain and requires TLS 1.3, X25519 and HTTP/2.
pub struct TlsStage;

/// Names of the capabilities a result lacks, in a fixed order.
pub fn missing_capabilities(tls: &TlsResult) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !tls.supports_tls13 {
        missing.push("TLS 1.3");
    }
    if !tls.supports_x25519 {
        missing.push("X25519");
    }
    if !tls.supports_http2 {
        missing.push("HTTP/2");
    }
    missing
}

#[async_trait]
impl DetectionStage for TlsStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let handshake = ctx.connections.tls_handshake(&ctx.domain, ctx.ip).await?;
        let tls = TlsResult {
            protocol_version: handshake.protocol_version.clone(),
            supports_tls13: handshake.is_tls13,
            supports_x25519: handshake.supports_x25519,
            supports_http2: handshake.supports_http2(),
            cipher_suite: handshake.cipher_suite.clone(),
            key_exchange_group: handshake.key_exchange_group.clone(),
            handshake_time: handshake.handshake_time,
        };
        let missing = missing_capabilities(&tls);
        ctx.result.tls = Some(tls);
        ctx.handshake = Some(handshake);

        if !missing.is_empty() {
            return Err(ProbeError::TlsRequirement(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn priority(&self) -> u32 {
        40
    }

    fn name(&self) -> &'static str {
        "tls"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_capabilities() {
        let mut tls = TlsResult {
            protocol_version: "TLS 1.2".to_string(),
            supports_tls13: false,
            supports_x25519: true,
            supports_http2: false,
            cipher_suite: String::new(),
            key_exchange_group: None,
            handshake_time: Duration::from_millis(3),
        };
        assert_eq!(missing_capabilities(&tls), vec!["TLS 1.3", "HTTP/2"]);

        tls.supports_tls13 = true;
        tls.supports_http2 = true;
        assert!(missing_capabilities(&tls).is_empty());
    }
}
