//! Batch engine guarantees: ordering, bounded concurrency, deadlines,
//! cancellation and streaming.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use helpers::{domains, uncached_config, FakeConnections, FakeHost};
use reality_checker::models::Detector;
use reality_checker::scoring::{self, Recommendation};
use reality_checker::{
    BatchManager, CheckerError, Config, ProbeError, ProgressEvent, ProgressObserver, ProgressOutcome,
};

fn slow(ms: u64) -> FakeHost {
    FakeHost {
        fetch_delay: Duration::from_millis(ms),
        ..FakeHost::default()
    }
}

fn hanging() -> FakeHost {
    FakeHost {
        hang_fetch: true,
        ..FakeHost::default()
    }
}

fn started(config: Config, fake: FakeConnections) -> (BatchManager, Arc<FakeConnections>) {
    let fake = Arc::new(fake);
    let mut manager = BatchManager::with_connections(config, fake.clone());
    manager.start().expect("start");
    (manager, fake)
}

#[tokio::test(start_paused = true)]
async fn test_results_follow_input_order() {
    // Later domains finish first
    let fake = FakeConnections::new()
        .with_host("a.example.com", slow(900))
        .with_host("b.example.com", slow(500))
        .with_host("c.example.com", slow(100))
        .with_host("d.example.com", slow(0));
    let (manager, _) = started(uncached_config(), fake);

    let input = domains(&["a.example.com", "b.example.com", "c.example.com", "d.example.com"]);
    let results = manager
        .check_domains(&input, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(results.len(), input.len());
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.domain, input[i]);
        assert_eq!(result.index, i);
    }
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_domains_keep_their_slots() {
    let (manager, _) = started(uncached_config(), FakeConnections::new());
    let input = domains(&["x.example.com", "y.example.com", "x.example.com"]);
    let results = manager
        .check_domains(&input, &CancellationToken::new())
        .await
        .expect("batch");
    let got: Vec<_> = results.iter().map(|r| (r.index, r.domain.clone())).collect();
    assert_eq!(
        got,
        vec![
            (0, "x.example.com".to_string()),
            (1, "y.example.com".to_string()),
            (2, "x.example.com".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded_by_pool_size() {
    let mut config = uncached_config();
    config.concurrency.max_concurrent = 3;
    let (manager, fake) = started(config, FakeConnections::new().with_default(slow(50)));

    let input: Vec<String> = (0..12).map(|i| format!("host{i}.example.com")).collect();
    let results = manager
        .check_domains(&input, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(results.len(), 12);
    let peak = fake.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeded the pool");
    assert!(peak > 1, "domains never overlapped");
    assert_eq!(fake.fetch_calls.load(Ordering::SeqCst), 12);
}

#[tokio::test(start_paused = true)]
async fn test_batch_timeout_fills_missing_slots() {
    let mut config = uncached_config();
    config.batch.timeout = Duration::from_secs(2);
    let fake = FakeConnections::new().with_host("stuck.example.com", hanging());
    let (manager, _) = started(config, fake);

    let input = domains(&["ok.example.com", "stuck.example.com", "fine.example.net"]);
    let results = manager
        .check_domains(&input, &CancellationToken::new())
        .await
        .expect("a batch timeout is not an error");

    assert_eq!(results.len(), 3);
    assert!(results[0].suitable);
    assert!(results[2].suitable);

    let stuck = &results[1];
    assert_eq!(stuck.domain, "stuck.example.com");
    assert_eq!(stuck.index, 1);
    assert_eq!(stuck.error, Some(ProbeError::Timeout));
    assert!(!stuck.suitable);
    assert!(stuck.network.is_none());
    assert!(stuck.early_exit);
    assert!(!stuck.is_detector_executed(Detector::Tls));
    assert_eq!(scoring::recommendation(stuck), Recommendation::Invalid);
    assert_eq!(scoring::recommendation(&results[0]), Recommendation::Stars(4));
}

#[tokio::test(start_paused = true)]
async fn test_stage_timeout_ends_hanging_domain() {
    let fake = FakeConnections::new().with_host("stuck.example.com", hanging());
    let (manager, _) = started(uncached_config(), fake);

    let results = manager
        .check_domains(&domains(&["stuck.example.com"]), &CancellationToken::new())
        .await
        .expect("batch");

    assert!(results[0].early_exit);
    assert_eq!(results[0].error, Some(ProbeError::Timeout));
    assert!(results[0].location.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_batch() {
    let fake = FakeConnections::new().with_default(hanging());
    let (manager, _) = started(uncached_config(), fake);
    let cancel = CancellationToken::new();

    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let input = domains(&["a.example.com", "b.example.com"]);
            manager.check_domains(&input, &cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();

    let outcome = handle.await.expect("batch task should not panic");
    assert!(matches!(outcome, Err(CheckerError::Cancelled)));
}

#[tokio::test]
async fn test_already_cancelled_token() {
    let (manager, fake) = started(uncached_config(), FakeConnections::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = manager.check_domains(&domains(&["a.example.com"]), &cancel).await;
    assert!(matches!(outcome, Err(CheckerError::Cancelled)));
    assert_eq!(fake.resolve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_not_started_and_restart() {
    let mut manager = BatchManager::with_connections(uncached_config(), Arc::new(FakeConnections::new()));
    let input = domains(&["a.example.com"]);
    let cancel = CancellationToken::new();

    assert!(matches!(
        manager.check_domains(&input, &cancel).await,
        Err(CheckerError::NotStarted)
    ));

    manager.start().expect("start");
    assert_eq!(manager.check_domains(&input, &cancel).await.expect("batch").len(), 1);

    manager.stop().expect("stop");
    assert!(matches!(
        manager.check_domains(&input, &cancel).await,
        Err(CheckerError::NotStarted)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stream_yields_one_result_per_domain() {
    let fake = FakeConnections::new()
        .with_host("slow.example.com", slow(800))
        .with_host("fast.example.com", slow(10));
    let (manager, _) = started(uncached_config(), fake);

    let input = domains(&["slow.example.com", "fast.example.com", "mid.example.com"]);
    let stream = manager
        .check_domains_stream(input.clone(), CancellationToken::new())
        .expect("stream");
    futures::pin_mut!(stream);

    let mut seen = Vec::new();
    while let Some(result) = stream.next().await {
        assert_eq!(result.domain, input[result.index]);
        seen.push(result.index);
    }
    assert_eq!(seen.len(), input.len());
    // Completion order, so the slow domain lands last
    assert_eq!(seen.last(), Some(&0));
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2]);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
    finished: Mutex<Option<usize>>,
}

impl ProgressObserver for Recorder {
    fn on_result(&self, event: &ProgressEvent) {
        self.events.lock().expect("lock").push(event.clone());
    }

    fn on_finish(&self, total: usize, _elapsed: Duration) {
        *self.finished.lock().expect("lock") = Some(total);
    }
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_count_up() {
    let fake = FakeConnections::new().with_host("missing.example.com", FakeHost {
        dns_fails: true,
        ..FakeHost::default()
    });
    let (manager, _) = started(uncached_config(), fake);
    let recorder = Arc::new(Recorder::default());

    let input = domains(&["a.example.com", "missing.example.com", "www.google.com"]);
    manager
        .check_domains_with_progress(&input, &CancellationToken::new(), recorder.clone())
        .await
        .expect("batch");

    let events = recorder.events.lock().expect("lock");
    let completed: Vec<_> = events.iter().map(|e| e.completed).collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert!(events.iter().all(|e| e.total == 3));

    let outcome_of = |domain: &str| {
        events
            .iter()
            .find(|e| e.domain == domain)
            .map(|e| e.outcome.clone())
            .expect("event for domain")
    };
    assert_eq!(outcome_of("a.example.com"), ProgressOutcome::Suitable);
    assert!(matches!(outcome_of("missing.example.com"), ProgressOutcome::Failed(_)));
    assert!(matches!(outcome_of("www.google.com"), ProgressOutcome::Unsuitable(_)));
    assert_eq!(*recorder.finished.lock().expect("lock"), Some(3));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_output_order_matches_input(
        delays in proptest::collection::vec(0u64..200, 1..16),
        pool in 1usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("runtime");

        let mut fake = FakeConnections::new();
        let input: Vec<String> = (0..delays.len()).map(|i| format!("d{i}.example.com")).collect();
        for (domain, ms) in input.iter().zip(&delays) {
            fake = fake.with_host(domain, slow(*ms));
        }
        let mut config = uncached_config();
        config.concurrency.max_concurrent = pool;

        let results = runtime.block_on(async {
            let (manager, _) = started(config, fake);
            manager.check_domains(&input, &CancellationToken::new()).await
        }).expect("batch");

        prop_assert_eq!(results.len(), input.len());
        for (i, result) in results.iter().enumerate() {
            prop_assert_eq!(&result.domain, &input[i]);
            prop_assert_eq!(result.index, i);
        }
    }
}
