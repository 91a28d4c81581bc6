//! The detection stage abstraction.

use async_trait::async_trait;

use crate::detection::PipelineContext;
use crate::error_handling::ProbeError;

/// One probe in the detection pipeline.
///
/// `execute` fills the stage's sub-result on `ctx.result`. Returning an error
/// (or setting `ctx.early_exit`) stops the pipeline when `can_early_exit()` is
/// true; otherwise the error is only remembered on the result.
#[async_trait]
pub trait DetectionStage: Send + Sync {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError>;

    fn can_early_exit(&self) -> bool {
        true
    }

    /// Lower runs first.
    fn priority(&self) -> u32;

    fn name(&self) -> &'static str;

    /// Fills the sub-result from a cache instead of probing.
    ///
    /// Returns `None` on a miss; otherwise the outcome `execute` would have had.
    fn restore_cached(&self, _ctx: &mut PipelineContext<'_>) -> Option<Result<(), ProbeError>> {
        None
    }
}
