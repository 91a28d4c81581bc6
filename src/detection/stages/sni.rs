//! SNI match stage.

use async_trait::async_trait;

use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::SniResult;

/// Checks that the certificate served for our SNI covers the domain.
pub struct SniStage;

#[async_trait]
impl DetectionStage for SniStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let handshake = ctx
            .handshake
            .as_ref()
            .ok_or_else(|| ProbeError::TlsHandshake("no handshake recorded".to_string()))?;
        let leaf = handshake.leaf_certificate.as_ref().ok_or_else(|| {
            ProbeError::Certificate(
                handshake
                    .certificate_error
                    .clone()
                    .unwrap_or_else(|| "no leaf certificate".to_string()),
            )
        })?;

        let sni_match = leaf.matches_host(&ctx.domain);
        ctx.result.sni = Some(SniResult {
            supports_sni: true,
            sni_match,
            server_name: ctx.domain.clone(),
        });

        if !sni_match {
            return Err(ProbeError::SniMismatch(ctx.domain.clone()));
        }
        Ok(())
    }

    fn priority(&self) -> u32 {
        50
    }

    fn name(&self) -> &'static str {
        "sni"
    }
}
