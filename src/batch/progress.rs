//! Batch progress reporting.
//!
//! The batch engine emits one [`ProgressEvent`] per landed result, in
//! completion order. Consumers plug in through [`ProgressObserver`]; the
//! engine itself never prints.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::models::DetectionResult;

/// How a landed result is classified for progress purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "lowercase")]
pub enum ProgressOutcome {
    Suitable,
    /// Inspected and rejected
    Unsuitable(String),
    /// Could not be inspected
    Failed(String),
}

impl ProgressOutcome {
    pub fn classify(result: &DetectionResult) -> Self {
        if result.suitable {
            return ProgressOutcome::Suitable;
        }
        match &result.error {
            Some(error) if !error.is_verdict() => ProgressOutcome::Failed(error.reason()),
            Some(error) => ProgressOutcome::Unsuitable(error.reason()),
            None => ProgressOutcome::Unsuitable("requirements not met".to_string()),
        }
    }
}

/// One landed result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    /// Results landed so far, this one included
    pub completed: usize,
    pub total: usize,
    pub index: usize,
    pub domain: String,
    pub outcome: ProgressOutcome,
}

impl ProgressEvent {
    pub fn new(result: &DetectionResult, completed: usize, total: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            completed,
            total,
            index: result.index,
            domain: result.domain.clone(),
            outcome: ProgressOutcome::classify(result),
        }
    }
}

/// Receives progress as results land.
pub trait ProgressObserver: Send + Sync {
    fn on_result(&self, event: &ProgressEvent);

    /// Called once after the last result, including synthetic timeouts.
    fn on_finish(&self, _total: usize, _elapsed: Duration) {}
}

/// Logs each event at `info`, failures at `warn`.
#[derive(Debug, Default)]
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_result(&self, event: &ProgressEvent) {
        let ts = event.timestamp.format("%H:%M:%S");
        match &event.outcome {
            ProgressOutcome::Suitable => {
                info!("[{ts}] [{}/{}] {} suitable", event.completed, event.total, event.domain)
            }
            ProgressOutcome::Unsuitable(reason) => info!(
                "[{ts}] [{}/{}] {} unsuitable: {reason}",
                event.completed, event.total, event.domain
            ),
            ProgressOutcome::Failed(reason) => warn!(
                "[{ts}] [{}/{}] {} failed: {reason}",
                event.completed, event.total, event.domain
            ),
        }
    }

    fn on_finish(&self, total: usize, elapsed: Duration) {
        info!("Checked {total} domain(s) in {:.1}s", elapsed.as_secs_f64());
    }
}

pub(crate) type SharedObserver = Option<Arc<dyn ProgressObserver>>;
