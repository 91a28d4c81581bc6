//! HTTP reachability stage.

use async_trait::async_trait;

use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::{classify_status_code, NetworkResult, PageStatusResult, StatusCodeCategory};

/// Fetches `https://<domain>/` and classifies the final status code.
pub struct NetworkStage;

#[async_trait]
impl DetectionStage for NetworkStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let page = match ctx.connections.fetch_page(&ctx.domain).await {
            Ok(page) => page,
            Err(e) => {
                let detail = match e {
                    ProbeError::Unreachable(detail) => detail,
                    other => other.to_string(),
                };
                ctx.result.network = Some(NetworkResult {
                    accessible: false,
                    status_code: 0,
                    final_domain: ctx.domain.clone(),
                    redirect_chain: Vec::new(),
                    is_redirected: false,
                    redirect_count: 0,
                    url: format!("https://{}/", ctx.domain),
                    response_time: ctx.start.elapsed(),
                    handshake_time: Default::default(),
                    headers: Default::default(),
                });
                ctx.result.page_status = Some(PageStatusResult {
                    status_code: 0,
                    is_accessible: false,
                    response_time_ms: 0,
                    error: Some(detail.clone()),
                });
                ctx.result.status_code_category = Some(StatusCodeCategory::Network);
                return Err(ProbeError::Unreachable(detail));
            }
        };

        let category = classify_status_code(page.status_code, true);
        let redirect_count = page.redirect_count();
        ctx.result.page_status = Some(PageStatusResult {
            status_code: page.status_code,
            is_accessible: true,
            response_time_ms: u64::try_from(page.response_time.as_millis()).unwrap_or(u64::MAX),
            error: None,
        });
        ctx.result.network = Some(NetworkResult {
            accessible: true,
            status_code: page.status_code,
            final_domain: page.final_host(),
            is_redirected: redirect_count > 0,
            redirect_count,
            redirect_chain: page.redirect_chain,
            url: page.url,
            response_time: page.response_time,
            handshake_time: page.first_response_time,
            headers: page.headers,
        });
        ctx.result.status_code_category = Some(category);

        if category == StatusCodeCategory::Excluded {
            return Err(ProbeError::StatusCode(page.status_code));
        }
        Ok(())
    }

    fn priority(&self) -> u32 {
        30
    }

    fn name(&self) -> &'static str {
        "network"
    }
}
