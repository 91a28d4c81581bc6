//! Certificate validity stage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::CertificateResult;
use crate::tls::{PeerCertificate, TlsHandshake};

/// Requires a chain that verified against the WebPKI roots and a validity
/// window that contains the current time.
pub struct CertificateStage;

/// Builds the certificate verdict for a leaf at time `now`.
pub fn evaluate_certificate(
    leaf: &PeerCertificate,
    verification_error: Option<&str>,
    now: DateTime<Utc>,
) -> CertificateResult {
    let error = if now > leaf.not_after {
        Some("certificate expired".to_string())
    } else if now < leaf.not_before {
        Some("certificate not yet valid".to_string())
    } else {
        verification_error.map(str::to_string)
    };

    CertificateResult {
        valid: error.is_none(),
        issuer: leaf.issuer.clone(),
        subject: leaf.subject.clone(),
        days_until_expiry: (leaf.not_after - now).num_days(),
        sans: leaf.sans.clone(),
        not_before: leaf.not_before,
        not_after: leaf.not_after,
        error,
    }
}

fn leaf_of(handshake: Option<&TlsHandshake>) -> Result<&PeerCertificate, ProbeError> {
    let handshake =
        handshake.ok_or_else(|| ProbeError::TlsHandshake("no handshake recorded".to_string()))?;
    handshake.leaf_certificate.as_ref().ok_or_else(|| {
        ProbeError::Certificate(
            handshake
                .certificate_error
                .clone()
                .unwrap_or_else(|| "no leaf certificate".to_string()),
        )
    })
}

#[async_trait]
impl DetectionStage for CertificateStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let leaf = leaf_of(ctx.handshake.as_ref())?;
        let verification_error = ctx
            .handshake
            .as_ref()
            .and_then(|h| h.verification_error.as_deref());
        let verdict = evaluate_certificate(leaf, verification_error, Utc::now());

        let outcome = match &verdict.error {
            Some(error) => Err(ProbeError::CertificateInvalid(error.clone())),
            None => Ok(()),
        };
        ctx.result.certificate = Some(verdict);
        outcome
    }

    fn priority(&self) -> u32 {
        60
    }

    fn name(&self) -> &'static str {
        "certificate"
    }
}
