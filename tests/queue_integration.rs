//! Integration tests for the download queue.
//!
//! These tests drive `DownloadQueue` with in-process fetchers so outcomes,
//! timing, and concurrency are fully controlled.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fetchq_core::{
    DownloadQueue, FetchError, Fetcher, QueueConfig, QueueError, QueueState, RecordingPolicy,
};
use tokio::sync::Semaphore;

// ==================== Test Fetchers ====================

/// Error type of the scripted fetcher; unrelated to HTTP.
#[derive(Debug, thiserror::Error)]
#[error("scripted failure for {url}")]
struct ScriptedError {
    url: String,
}

/// Fails any URL listed in `failing`, counts every call per URL.
#[derive(Default)]
struct ScriptedFetcher {
    failing: HashSet<String>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    completions: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| (*u).to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> HashMap<String, usize> {
        self.calls.lock().unwrap().clone()
    }

    fn completions(&self) -> Vec<(String, Instant)> {
        self.completions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _destination: &Path) -> Result<(), FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completions
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        if self.failing.contains(url) {
            Err(FetchError::new(ScriptedError {
                url: url.to_string(),
            }))
        } else {
            Ok(())
        }
    }
}

/// Panics on URLs starting with "panic", succeeds otherwise.
struct PanickyFetcher;

#[async_trait]
impl Fetcher for PanickyFetcher {
    async fn fetch(&self, url: &str, _destination: &Path) -> Result<(), FetchError> {
        assert!(!url.starts_with("panic"), "fetcher exploded on {url}");
        Ok(())
    }
}

/// Holds URLs starting with "slow" until a permit is released.
struct GatedFetcher {
    gate: Semaphore,
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, url: &str, _destination: &Path) -> Result<(), FetchError> {
        if url.starts_with("slow") {
            let _permit = self.gate.acquire().await.map_err(FetchError::new)?;
        }
        Ok(())
    }
}

fn record_all(workers: usize) -> QueueConfig {
    QueueConfig::with_workers(workers).with_recording_policy(RecordingPolicy::all())
}

fn sorted_urls(results: &[fetchq_core::JobResult]) -> Vec<String> {
    let mut urls: Vec<String> = results.iter().map(|r| r.url().to_string()).collect();
    urls.sort();
    urls
}

// ==================== Drain Guarantees ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_job_processed_exactly_once() {
    let fetcher = Arc::new(ScriptedFetcher::default().with_delay(Duration::from_millis(2)));
    let queue = DownloadQueue::new(record_all(4), Arc::clone(&fetcher)).unwrap();

    for i in 0..50 {
        queue.enqueue(format!("job-{i}"), format!("out/{i}")).unwrap();
    }
    queue.wait_until_done().await;

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 50);
    assert!(calls.values().all(|&n| n == 1), "duplicate fetch: {calls:?}");
    assert_eq!(queue.all_results().len(), 50);
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(queue.state(), QueueState::Done);
}

#[tokio::test]
async fn test_enqueue_after_close_returns_closed() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let queue = DownloadQueue::new(record_all(2), Arc::clone(&fetcher)).unwrap();
    queue.enqueue("before", "out/before").unwrap();
    queue.close();

    assert_eq!(queue.enqueue("after", "out/after"), Err(QueueError::Closed));

    queue.wait_until_done().await;
    assert_eq!(sorted_urls(&queue.all_results()), vec!["before"]);
    assert!(!fetcher.calls().contains_key("after"));

    // Still closed after draining.
    assert_eq!(queue.enqueue("later", "out/later"), Err(QueueError::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_default_policy_keeps_only_failures() {
    let ok: Vec<String> = (0..7).map(|i| format!("ok-{i}")).collect();
    let bad: Vec<String> = (0..4).map(|i| format!("bad-{i}")).collect();
    let bad_refs: Vec<&str> = bad.iter().map(String::as_str).collect();

    let fetcher = ScriptedFetcher::failing(&bad_refs);
    let queue = DownloadQueue::new(QueueConfig::with_workers(3), fetcher).unwrap();
    for url in ok.iter().chain(bad.iter()) {
        queue.enqueue(url.clone(), "out").unwrap();
    }
    queue.wait_until_done().await;

    let all = queue.all_results();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(fetchq_core::JobResult::is_failure));
    assert!(queue.successes().is_empty());
    assert_eq!(sorted_urls(&queue.failures()), {
        let mut expected = bad.clone();
        expected.sort();
        expected
    });
}

#[tokio::test]
async fn test_policy_none_records_nothing_but_still_fetches() {
    let fetcher = Arc::new(ScriptedFetcher::failing(&["b"]));
    let config = QueueConfig::with_workers(2).with_recording_policy(RecordingPolicy::none());
    let queue = DownloadQueue::new(config, Arc::clone(&fetcher)).unwrap();
    queue.enqueue("a", "out/a").unwrap();
    queue.enqueue("b", "out/b").unwrap();
    queue.wait_until_done().await;

    assert!(queue.all_results().is_empty());
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn test_wait_until_done_is_idempotent() {
    let fetcher = Arc::new(ScriptedFetcher::failing(&["x"]));
    let queue = DownloadQueue::new(record_all(2), Arc::clone(&fetcher)).unwrap();
    queue.enqueue("x", "out/x").unwrap();
    queue.enqueue("y", "out/y").unwrap();

    queue.wait_until_done().await;
    let first = queue.all_results().len();

    tokio::time::timeout(Duration::from_secs(1), queue.wait_until_done())
        .await
        .expect("second wait must not hang");

    assert_eq!(first, 2);
    assert_eq!(queue.all_results().len(), 2);
    assert_eq!(fetcher.calls().values().sum::<usize>(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_waiters_all_return_after_drain() {
    let fetcher = Arc::new(ScriptedFetcher::default().with_delay(Duration::from_millis(20)));
    let queue = Arc::new(DownloadQueue::new(record_all(2), Arc::clone(&fetcher)).unwrap());
    for i in 0..6 {
        queue.enqueue(format!("j{i}"), "out").unwrap();
    }

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.wait_until_done().await;
                queue.all_results().len()
            })
        })
        .collect();

    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), 6);
    }
    assert_eq!(queue.state(), QueueState::Done);
}

// ==================== Concurrency ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_producers_no_lost_or_duplicated_jobs() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let queue = Arc::new(DownloadQueue::new(record_all(6), Arc::clone(&fetcher)).unwrap());

    // Workers are already running and draining while producers enqueue.
    let producers: Vec<_> = (0..10)
        .map(|p| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for i in 0..100 {
                    queue
                        .enqueue(format!("token-{p}-{i}"), format!("out/{p}/{i}"))
                        .unwrap();
                    if i % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    queue.wait_until_done().await;

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 1000);
    assert!(calls.values().all(|&n| n == 1));

    let results = queue.all_results();
    let unique: HashSet<&str> = results.iter().map(|r| r.url()).collect();
    assert_eq!(results.len(), 1000);
    assert_eq!(unique.len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_racing_close_is_either_rejected_or_processed() {
    for round in 0..20 {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let queue = Arc::new(DownloadQueue::new(record_all(2), Arc::clone(&fetcher)).unwrap());

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut accepted = Vec::new();
                for i in 0..200 {
                    let url = format!("r{round}-{i}");
                    match queue.enqueue(url.clone(), "out") {
                        Ok(()) => accepted.push(url),
                        Err(QueueError::Closed) => break,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                accepted
            })
        };
        tokio::task::yield_now().await;
        queue.wait_until_done().await;
        let accepted = producer.await.unwrap();

        let processed = sorted_urls(&queue.all_results());
        let mut expected = accepted;
        expected.sort();
        assert_eq!(processed, expected, "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_count_bounds_in_flight_fetches() {
    let fetcher = Arc::new(ScriptedFetcher::default().with_delay(Duration::from_millis(30)));
    let queue = DownloadQueue::new(record_all(3), Arc::clone(&fetcher)).unwrap();
    for i in 0..12 {
        queue.enqueue(format!("j{i}"), "out").unwrap();
    }
    queue.wait_until_done().await;

    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(queue.all_results().len(), 12);
}

// ==================== Scenarios ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_outcomes_split_into_successes_and_failures() {
    let fetcher = ScriptedFetcher::failing(&["b", "d"]);
    let queue = DownloadQueue::new(record_all(3), fetcher).unwrap();
    for url in ["a", "b", "c", "d", "e"] {
        queue.enqueue(url, format!("out/{url}")).unwrap();
    }
    queue.wait_until_done().await;

    assert_eq!(sorted_urls(&queue.successes()), vec!["a", "c", "e"]);
    assert_eq!(sorted_urls(&queue.failures()), vec!["b", "d"]);

    let failure = &queue.failures()[0];
    let error = failure.outcome().error().unwrap();
    let scripted = error.downcast_ref::<ScriptedError>().unwrap();
    assert_eq!(scripted.url, failure.url());
    assert_eq!(
        error.to_string(),
        format!("scripted failure for {}", failure.url())
    );
    assert_eq!(failure.destination(), Path::new(&format!("out/{}", failure.url())));
}

#[tokio::test]
async fn test_inter_job_delay_spaces_completions() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let config = record_all(1).with_inter_job_delay(Duration::from_millis(50));
    let queue = DownloadQueue::new(config, Arc::clone(&fetcher)).unwrap();
    queue.enqueue("first", "out/1").unwrap();
    queue.enqueue("second", "out/2").unwrap();
    queue.wait_until_done().await;

    let completions = fetcher.completions();
    assert_eq!(completions.len(), 2);
    assert_eq!(completions[0].0, "first");
    assert_eq!(completions[1].0, "second");
    let gap = completions[1].1.duration_since(completions[0].1);
    assert!(gap >= Duration::from_millis(50), "gap was {gap:?}");
}

#[tokio::test]
async fn test_close_wakes_idle_workers_without_waiting_for_backoff() {
    let config = record_all(3).with_idle_backoff(Duration::from_secs(60));
    let queue = DownloadQueue::new(config, ScriptedFetcher::default()).unwrap();

    // Let the workers go idle first.
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.enqueue("late", "out/late").unwrap();

    let started = Instant::now();
    tokio::time::timeout(Duration::from_secs(5), queue.wait_until_done())
        .await
        .expect("drain should not wait for the idle backoff");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sorted_urls(&queue.successes()), vec!["late"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_job_enqueued_while_one_worker_is_busy_starts_promptly() {
    let fetcher = Arc::new(GatedFetcher {
        gate: Semaphore::new(0),
    });
    let config = record_all(2).with_idle_backoff(Duration::from_secs(60));
    let queue = DownloadQueue::new(config, Arc::clone(&fetcher)).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.enqueue("slow", "out/slow").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.enqueue("fast", "out/fast").unwrap();

    // The idle worker must pick up "fast" while "slow" is still held.
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.successes().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second job should not wait for the idle backoff");
    assert_eq!(sorted_urls(&queue.successes()), vec!["fast"]);

    fetcher.gate.add_permits(1);
    queue.wait_until_done().await;
    assert_eq!(sorted_urls(&queue.successes()), vec!["fast", "slow"]);
}

// ==================== Failure Containment ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetcher_panic_is_recorded_as_failure() {
    let queue = DownloadQueue::new(record_all(1), PanickyFetcher).unwrap();
    queue.enqueue("ok-1", "out/1").unwrap();
    queue.enqueue("panic-now", "out/2").unwrap();
    queue.enqueue("ok-2", "out/3").unwrap();
    queue.wait_until_done().await;

    assert_eq!(sorted_urls(&queue.successes()), vec!["ok-1", "ok-2"]);
    let failures = queue.failures();
    assert_eq!(failures.len(), 1);
    let error = failures[0].outcome().error().unwrap();
    assert!(error.is_panic());
    assert!(error.to_string().contains("fetcher exploded on panic-now"));
}

#[tokio::test]
async fn test_snapshots_available_while_draining() {
    let fetcher = Arc::new(ScriptedFetcher::default().with_delay(Duration::from_millis(10)));
    let queue = DownloadQueue::new(record_all(1), Arc::clone(&fetcher)).unwrap();
    for i in 0..5 {
        queue.enqueue(format!("j{i}"), "out").unwrap();
    }

    let early = queue.all_results();
    assert!(early.len() <= 5);

    queue.wait_until_done().await;
    assert_eq!(queue.all_results().len(), 5);
    assert!(early.len() <= queue.all_results().len());
}
