//! Coordinator, workers and result collection for one batch.

use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::batch::progress::{ProgressEvent, SharedObserver};
use crate::detection::DetectionPipeline;
use crate::error_handling::CheckerError;
use crate::initialization::init_semaphore;
use crate::models::DetectionResult;

/// What a worker sends back for one domain.
#[derive(Debug)]
pub struct ProgressResult {
    pub index: usize,
    pub domain: String,
    pub result: Option<DetectionResult>,
    pub error: Option<CheckerError>,
}

/// Runs one batch to completion.
///
/// A coordinator task admits domains through a semaphore of `pool_size`
/// permits and spawns one worker per admitted domain. The caller's task
/// collects results by index until every slot is filled or the batch
/// deadline passes; unfilled slots become synthetic timeout results. Every
/// landed result is also pushed to `sink` (if any) as it arrives.
pub(crate) async fn run_batch(
    pipeline: Arc<DetectionPipeline>,
    domains: Vec<String>,
    cancel: &CancellationToken,
    observer: SharedObserver,
    sink: Option<mpsc::UnboundedSender<DetectionResult>>,
) -> Result<Vec<DetectionResult>, CheckerError> {
    let total = domains.len();
    let started = Instant::now();
    if total == 0 {
        return Ok(Vec::new());
    }
    if cancel.is_cancelled() {
        return Err(CheckerError::Cancelled);
    }

    let pool_size = pipeline.config().pool_size();
    let batch_timeout = pipeline.config().batch.timeout;
    let batch_cancel = cancel.child_token();
    let (tx, mut rx) = mpsc::channel::<ProgressResult>(total);

    debug!("Dispatching {total} domain(s) across {pool_size} worker(s)");
    tokio::spawn(coordinate(
        Arc::clone(&pipeline),
        domains.clone(),
        pool_size,
        batch_cancel.clone(),
        tx,
    ));

    let mut slots: Vec<Option<DetectionResult>> = vec![None; total];
    let mut completed = 0usize;
    let deadline = tokio::time::sleep(batch_timeout);
    tokio::pin!(deadline);

    let land = |result: DetectionResult, completed: usize| {
        if let Some(observer) = &observer {
            observer.on_result(&ProgressEvent::new(&result, completed, total));
        }
        if let Some(sink) = &sink {
            // A dropped stream consumer only loses the live copy
            let _ = sink.send(result.clone());
        }
        result
    };

    while completed < total {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                batch_cancel.cancel();
                return Err(CheckerError::Cancelled);
            }
            _ = &mut deadline => {
                warn!(
                    "Batch timeout after {}s with {}/{} result(s)",
                    batch_timeout.as_secs(),
                    completed,
                    total
                );
                break;
            }
            message = rx.recv() => {
                let Some(message) = message else { break };
                let result = match (message.result, message.error) {
                    (Some(result), _) => result,
                    (None, Some(CheckerError::Cancelled)) if cancel.is_cancelled() => {
                        batch_cancel.cancel();
                        return Err(CheckerError::Cancelled);
                    }
                    (None, error) => {
                        warn!("No result for {}: {:?}", message.domain, error);
                        DetectionResult::timed_out(message.domain, message.index)
                    }
                };
                if message.index < total && slots[message.index].is_none() {
                    completed += 1;
                    slots[message.index] = Some(land(result, completed));
                }
            }
        }
    }

    // Stops workers still running past the deadline
    batch_cancel.cancel();

    let results = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| match slot {
            Some(result) => result,
            None => {
                completed += 1;
                land(DetectionResult::timed_out(domains[index].clone(), index), completed)
            }
        })
        .collect::<Vec<_>>();

    if let Some(observer) = &observer {
        observer.on_finish(total, started.elapsed());
    }
    Ok(results)
}

/// Admits domains in input order, at most `pool_size` at a time.
async fn coordinate(
    pipeline: Arc<DetectionPipeline>,
    domains: Vec<String>,
    pool_size: usize,
    cancel: CancellationToken,
    tx: mpsc::Sender<ProgressResult>,
) {
    let semaphore = init_semaphore(pool_size);
    let mut workers = FuturesUnordered::new();

    for (index, domain) in domains.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Semaphore closed, skipping {domain}");
                    break;
                }
            },
        };

        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        let tx = tx.clone();
        workers.push(tokio::spawn(async move {
            let _permit = permit;
            let outcome = pipeline.check_domain(&domain, index, &cancel).await;
            let (result, error) = match outcome {
                Ok(result) => (Some(result), None),
                Err(e) => (None, Some(e)),
            };
            // The collector may already have given up on this batch
            let _ = tx
                .send(ProgressResult {
                    index,
                    domain,
                    result,
                    error,
                })
                .await;
        }));
    }
    drop(tx);

    while let Some(joined) = workers.next().await {
        if let Err(e) = joined {
            warn!("Worker task failed: {e}");
        }
    }
}
