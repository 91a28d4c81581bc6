//! Single-domain pipeline engine.

use std::sync::Arc;

use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::connection::Connections;
use crate::detection::stages::default_stages;
use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::{CheckerError, ProbeError};
use crate::models::DetectionResult;
use crate::scoring;

/// Runs the ordered stage list for one domain at a time.
///
/// Shared by every worker of a batch; all per-run state lives in the
/// [`PipelineContext`] created by [`check_domain`](Self::check_domain).
pub struct DetectionPipeline {
    stages: Vec<Box<dyn DetectionStage>>,
    connections: Arc<dyn Connections>,
    cache: Arc<CacheManager>,
    config: Arc<Config>,
}

impl DetectionPipeline {
    /// Pipeline with the default stage set for `config`.
    pub fn new(
        config: Arc<Config>,
        connections: Arc<dyn Connections>,
        cache: Arc<CacheManager>,
    ) -> Self {
        let stages = default_stages(&config);
        Self::with_stages(config, connections, cache, stages)
    }

    /// Pipeline with a custom stage set. Stages are stably sorted by priority.
    pub fn with_stages(
        config: Arc<Config>,
        connections: Arc<dyn Connections>,
        cache: Arc<CacheManager>,
        mut stages: Vec<Box<dyn DetectionStage>>,
    ) -> Self {
        stages.sort_by_key(|stage| stage.priority());
        Self {
            stages,
            connections,
            cache,
            config,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks one domain.
    ///
    /// Probe failures, verdicts and timeouts all end up on the returned
    /// result. The run never outlives `concurrency.domain_timeout`; a single
    /// stage never outlives `concurrency.check_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CheckerError::Cancelled` when `cancel` fires before the run
    /// completes.
    pub async fn check_domain(
        &self,
        domain: &str,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<DetectionResult, CheckerError> {
        if cancel.is_cancelled() {
            return Err(CheckerError::Cancelled);
        }

        let mut ctx = PipelineContext::new(
            domain,
            index,
            self.connections.as_ref(),
            &self.cache,
            &self.config,
            cancel.clone(),
        );

        if let Some(mut cached) = self.cache.get_result(&ctx.domain) {
            debug!("Result cache hit for {domain}");
            cached.domain = domain.to_string();
            cached.index = index;
            return Ok(cached);
        }

        let check_timeout = self.config.concurrency.check_timeout;
        for stage in &self.stages {
            let outcome = match stage.restore_cached(&mut ctx) {
                Some(outcome) => outcome,
                None => {
                    let stage_deadline = ctx.deadline.min(Instant::now() + check_timeout);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(CheckerError::Cancelled),
                        res = tokio::time::timeout_at(stage_deadline, stage.execute(&mut ctx)) => {
                            res.unwrap_or_else(|_| {
                                warn!("Stage {} timed out for {domain}", stage.name());
                                Err(ProbeError::Timeout)
                            })
                        }
                    }
                }
            };

            let domain_expired = Instant::now() >= ctx.deadline;
            match outcome {
                Ok(()) if ctx.early_exit && stage.can_early_exit() => {
                    debug!("Stage {} requested early exit for {domain}", stage.name());
                    break;
                }
                Ok(()) => {
                    ctx.early_exit = false;
                }
                Err(e) if stage.can_early_exit() || domain_expired => {
                    debug!("Stage {} stopped {domain}: {e}", stage.name());
                    ctx.early_exit = true;
                    ctx.error = Some(e);
                    break;
                }
                Err(e) => {
                    debug!("Stage {} failed for {domain}: {e}", stage.name());
                    if ctx.error.is_none() {
                        ctx.error = Some(e);
                    }
                }
            }

            if domain_expired {
                ctx.early_exit = true;
                ctx.error.get_or_insert(ProbeError::Timeout);
                break;
            }
        }

        let mut result = ctx.into_result();
        scoring::apply(&mut result);

        if !result.is_technical_failure() {
            self.cache.put_result(&crate::detection::normalize_domain(domain), result.clone());
        }
        Ok(result)
    }
}
