//! Batch execution engine.
//!
//! [`BatchManager`] fans a domain list out across a bounded worker pool and
//! returns exactly one [`DetectionResult`] per input domain, in input order.
//!
//! # Lifecycle
//!
//! Shared resources (connections, caches, the pipeline) are built by
//! [`BatchManager::start`] and dropped by [`BatchManager::stop`]. Checking
//! domains on a stopped manager fails with [`CheckerError::NotStarted`].
//!
//! # Timeouts and cancellation
//!
//! - `batch.timeout` bounds a whole batch; domains still running when it
//!   passes get a synthetic timeout result and their runs are cancelled.
//! - The caller's `CancellationToken` aborts the batch with
//!   [`CheckerError::Cancelled`]; in-flight runs stop at their next await.

mod dispatch;
mod progress;

use std::sync::Arc;

use futures::Stream;
use log::info;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheManager, CacheStats};
use crate::config::Config;
use crate::connection::{ConnectionManager, Connections};
use crate::detection::DetectionPipeline;
use crate::error_handling::CheckerError;
use crate::models::DetectionResult;

pub use dispatch::ProgressResult;
pub use progress::{LogProgressObserver, ProgressEvent, ProgressObserver, ProgressOutcome};

/// Owner of the worker pool and its shared resources.
pub struct BatchManager {
    config: Arc<Config>,
    connections: Option<Arc<dyn Connections>>,
    pipeline: Option<Arc<DetectionPipeline>>,
}

impl BatchManager {
    /// Manager that builds a [`ConnectionManager`] on start.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config.normalized()),
            connections: None,
            pipeline: None,
        }
    }

    /// Manager that probes through `connections` instead of the network.
    pub fn with_connections(config: Config, connections: Arc<dyn Connections>) -> Self {
        Self {
            connections: Some(connections),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Builds the connection layer, the caches and the pipeline.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` on a second start; `Initialization` when the
    /// resolver, HTTP client or TLS prober cannot be built.
    pub fn start(&mut self) -> Result<(), CheckerError> {
        if self.pipeline.is_some() {
            return Err(CheckerError::AlreadyRunning);
        }

        let connections: Arc<dyn Connections> = match &self.connections {
            Some(connections) => Arc::clone(connections),
            None => Arc::new(ConnectionManager::new(&self.config)?),
        };
        let cache = Arc::new(CacheManager::new(&self.config));
        self.pipeline = Some(Arc::new(DetectionPipeline::new(
            Arc::clone(&self.config),
            connections,
            cache,
        )));
        info!(
            "Batch manager started with {} worker(s)",
            self.config.pool_size()
        );
        Ok(())
    }

    /// Drops the shared resources. Batches already running keep their own
    /// handle and finish normally.
    pub fn stop(&mut self) -> Result<(), CheckerError> {
        match self.pipeline.take() {
            Some(_) => {
                info!("Batch manager stopped");
                Ok(())
            }
            None => Err(CheckerError::NotStarted),
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.pipeline.as_ref().map(|p| p.cache().stats())
    }

    fn pipeline(&self) -> Result<Arc<DetectionPipeline>, CheckerError> {
        self.pipeline.as_ref().map(Arc::clone).ok_or(CheckerError::NotStarted)
    }

    /// Checks every domain; `results[i].domain == domains[i]`.
    ///
    /// # Errors
    ///
    /// `NotStarted` before `start()`, `Cancelled` when `cancel` fires.
    pub async fn check_domains(
        &self,
        domains: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<DetectionResult>, CheckerError> {
        dispatch::run_batch(self.pipeline()?, domains.to_vec(), cancel, None, None).await
    }

    /// Like [`check_domains`](Self::check_domains), reporting each result to
    /// `observer` as it lands.
    pub async fn check_domains_with_progress(
        &self,
        domains: &[String],
        cancel: &CancellationToken,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<Vec<DetectionResult>, CheckerError> {
        dispatch::run_batch(self.pipeline()?, domains.to_vec(), cancel, Some(observer), None).await
    }

    /// Yields results in completion order as they land.
    ///
    /// The stream is finite (one item per domain, synthetic timeouts
    /// included) and ends early if `cancel` fires. The batch runs on a
    /// spawned task, so it progresses even while the stream is not polled.
    ///
    /// # Errors
    ///
    /// `NotStarted` before `start()`.
    pub fn check_domains_stream(
        &self,
        domains: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = DetectionResult>, CheckerError> {
        let pipeline = self.pipeline()?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Err(e) = dispatch::run_batch(pipeline, domains, &cancel, None, Some(tx)).await {
                info!("Streaming batch ended early: {e}");
            }
        });

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|result| (result, rx))
        }))
    }
}
