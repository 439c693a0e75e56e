use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use shovelwatch::sync::{IndexError, Indexer, UpstreamSource, Watcher};

// Shared record of every load call and its ordering-relevant events
#[derive(Default)]
struct CallLog {
    events: Mutex<Vec<String>>,
    ranges: Mutex<Vec<(&'static str, i64, i64)>>,
}

impl CallLog {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn ranges(&self) -> Vec<(&'static str, i64, i64)> {
        self.ranges.lock().unwrap().clone()
    }
}

// Scripted indexer: records calls, optionally sleeps, blocks on a gate, or
// fails
struct MockIndexer {
    name: &'static str,
    log: Arc<CallLog>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    fail: bool,
}

impl MockIndexer {
    fn recorder(name: &'static str, log: Arc<CallLog>) -> Arc<Self> {
        Arc::new(MockIndexer { name, log, delay: None, gate: None, fail: false })
    }

    fn delayed(name: &'static str, log: Arc<CallLog>, delay: Duration) -> Arc<Self> {
        Arc::new(MockIndexer { name, log, delay: Some(delay), gate: None, fail: false })
    }

    fn gated(name: &'static str, log: Arc<CallLog>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(MockIndexer { name, log, delay: None, gate: Some(gate), fail: false })
    }

    fn failing(name: &'static str, log: Arc<CallLog>) -> Arc<Self> {
        Arc::new(MockIndexer { name, log, delay: None, gate: None, fail: true })
    }
}

#[async_trait]
impl Indexer<()> for MockIndexer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self, _store: &(), start: i64, stop: i64) -> Result<(), IndexError> {
        self.log.events.lock().unwrap().push(format!("{}:start", self.name));
        self.log.ranges.lock().unwrap().push((self.name, start, stop));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }
        if self.fail {
            return Err(format!("{} exploded", self.name).into());
        }
        self.log.events.lock().unwrap().push(format!("{}:end", self.name));
        Ok(())
    }
}

// Upstream stub with a settable tip and a failure switch
struct MockUpstream {
    latest: AtomicI64,
    fail: AtomicBool,
}

impl MockUpstream {
    fn at(latest: i64) -> Arc<Self> {
        Arc::new(MockUpstream { latest: AtomicI64::new(latest), fail: AtomicBool::new(false) })
    }
}

#[async_trait]
impl UpstreamSource for MockUpstream {
    async fn latest_block(&self) -> Result<i64, IndexError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("upstream unavailable".into());
        }
        Ok(self.latest.load(Ordering::SeqCst))
    }
}

const START: i64 = 5_699_999;
const BATCH: i64 = 100_000;
const SLOW_LAG: i64 = 3;

fn watcher_at(start: i64, upstream: Arc<MockUpstream>) -> Watcher<()> {
    Watcher::new((), upstream, start, BATCH, SLOW_LAG)
}

// Bounded wait for a fire-and-forget slow pass to land
async fn wait_for_slow_cursor(watcher: &Watcher<()>, target: i64) {
    for _ in 0..1000 {
        if watcher.slow_latest() == target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("slow cursor never reached {}, still on {}", target, watcher.slow_latest());
}

#[tokio::test]
async fn test_batch_clamps_to_available_blocks() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(5_700_050));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);

    // 51 available blocks, well under the batch ceiling
    let new_fast = watcher.index_batch(5_700_000, 5_700_050, BATCH).await.unwrap();
    assert_eq!(new_fast, Some(5_700_050));
    assert_eq!(log.ranges(), vec![("a", 5_700_000, 5_700_050)]);
}

#[tokio::test]
async fn test_batch_clamps_to_batch_size() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(5_850_000));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);

    // 150001 available blocks get clamped to exactly batch_size blocks
    let new_fast = watcher.index_batch(5_700_000, 5_850_000, BATCH).await.unwrap();
    assert_eq!(new_fast, Some(5_700_000 + BATCH - 1));
    assert_eq!(log.ranges(), vec![("a", 5_700_000, 5_799_999)]);
}

#[tokio::test]
async fn test_empty_range_is_a_noop() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(START));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);

    let new_fast = watcher.index_batch(10, 5, BATCH).await.unwrap();
    assert_eq!(new_fast, None);
    assert!(log.ranges().is_empty());
    assert_eq!(watcher.fast_latest(), START);
}

#[tokio::test]
async fn test_catch_up_batches_to_target() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(5_850_000));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);
    watcher.slow_add(MockIndexer::recorder("slow", log.clone()));

    watcher.catch_up_to(5_850_000).await.unwrap();

    assert_eq!(watcher.fast_latest(), 5_850_000);
    // Two bounded batches, then one slow pass over the whole gap
    assert_eq!(
        log.ranges(),
        vec![
            ("a", 5_700_000, 5_799_999),
            ("a", 5_800_000, 5_850_000),
            ("slow", 5_700_000, 5_850_000),
        ]
    );
    assert_eq!(watcher.slow_latest(), 5_850_000);
}

#[tokio::test]
async fn test_catch_up_is_idempotent() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(5_700_010));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);

    watcher.catch_up_to(5_700_010).await.unwrap();
    let calls_after_first = log.ranges().len();

    // Same target again: no batch runs, cursors stay put
    watcher.catch_up_to(5_700_010).await.unwrap();
    watcher.catch_up_to(5_700_005).await.unwrap();
    assert_eq!(log.ranges().len(), calls_after_first);
    assert_eq!(watcher.fast_latest(), 5_700_010);
}

#[tokio::test]
async fn test_failed_layer_does_not_advance_cursor() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(5_700_010));
    watcher.add(vec![MockIndexer::recorder("ok", log.clone())]);
    watcher.add(vec![MockIndexer::failing("broken", log.clone())]);
    let watcher = Arc::new(watcher);

    let result = Arc::clone(&watcher).tick().await;
    assert!(result.is_err());
    assert_eq!(watcher.fast_latest(), START);

    // The same range is retried verbatim on the next tick
    let _ = Arc::clone(&watcher).tick().await;
    assert_eq!(log.ranges().iter().filter(|r| r.0 == "ok").count(), 2);
    assert_eq!(
        log.ranges().iter().filter(|r| r.0 == "ok").collect::<Vec<_>>()[1],
        &("ok", 5_700_000, 5_700_010)
    );
}

#[tokio::test(start_paused = true)]
async fn test_layer_runs_only_after_previous_layer_finishes() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(START, MockUpstream::at(5_700_010));
    watcher.add(vec![
        MockIndexer::delayed("l1a", log.clone(), Duration::from_millis(20)),
        MockIndexer::delayed("l1b", log.clone(), Duration::from_millis(40)),
    ]);
    watcher.add(vec![MockIndexer::recorder("l2", log.clone())]);

    watcher.index_batch(5_700_000, 5_700_010, BATCH).await.unwrap();

    let events = log.events();
    let l2_start = events.iter().position(|e| e == "l2:start").unwrap();
    let l1a_end = events.iter().position(|e| e == "l1a:end").unwrap();
    let l1b_end = events.iter().position(|e| e == "l1b:end").unwrap();
    assert!(l1a_end < l2_start, "layer 2 started before l1a finished: {:?}", events);
    assert!(l1b_end < l2_start, "layer 2 started before l1b finished: {:?}", events);
}

#[tokio::test]
async fn test_tick_in_progress_drops_second_tick() {
    let log = Arc::new(CallLog::default());
    let gate = Arc::new(Semaphore::new(0));
    let mut watcher = watcher_at(START, MockUpstream::at(5_700_000));
    watcher.add(vec![MockIndexer::gated("gated", log.clone(), gate.clone())]);
    let watcher = Arc::new(watcher);

    // First tick parks inside the indexer
    let first = tokio::spawn(Arc::clone(&watcher).tick());
    for _ in 0..1000 {
        if !log.events().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(log.events(), vec!["gated:start"]);

    // Second tick must not run the indexers again for the same range
    Arc::clone(&watcher).tick().await.unwrap();
    assert_eq!(log.ranges().len(), 1);

    gate.add_permits(1);
    first.await.unwrap().unwrap();
    assert_eq!(watcher.fast_latest(), 5_700_000);
}

#[tokio::test(start_paused = true)]
async fn test_tick_recovers_after_upstream_outage() {
    let log = Arc::new(CallLog::default());
    let upstream = MockUpstream::at(5_700_002);
    upstream.fail.store(true, Ordering::SeqCst);
    let mut watcher = watcher_at(START, upstream.clone());
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);
    let watcher = Arc::new(watcher);

    // Backoff retries exhaust and the tick is dropped, cursor untouched
    let result = Arc::clone(&watcher).tick().await;
    assert!(result.is_err());
    assert_eq!(watcher.fast_latest(), START);

    // The busy flag was released on the failure path, so the next tick works
    upstream.fail.store(false, Ordering::SeqCst);
    Arc::clone(&watcher).tick().await.unwrap();
    assert_eq!(watcher.fast_latest(), 5_700_002);
}

#[tokio::test(start_paused = true)]
async fn test_slow_pass_triggered_past_lag_threshold() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(5_700_000, MockUpstream::at(5_700_004));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);
    watcher.slow_add(MockIndexer::recorder("slow", log.clone()));
    let watcher = Arc::new(watcher);

    // fast moves 5700000 -> 5700004 while slow sits at 5700000: lag 4 > 3
    Arc::clone(&watcher).tick().await.unwrap();
    assert_eq!(watcher.fast_latest(), 5_700_004);

    wait_for_slow_cursor(&watcher, 5_700_004).await;
    assert!(log.ranges().contains(&("slow", 5_700_001, 5_700_004)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_pass_not_triggered_within_threshold() {
    let log = Arc::new(CallLog::default());
    let mut watcher = watcher_at(5_700_000, MockUpstream::at(5_700_003));
    watcher.add(vec![MockIndexer::recorder("a", log.clone())]);
    watcher.slow_add(MockIndexer::recorder("slow", log.clone()));
    let watcher = Arc::new(watcher);

    // lag is exactly the threshold, not past it
    Arc::clone(&watcher).tick().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(watcher.slow_latest(), 5_700_000);
    assert!(log.ranges().iter().all(|r| r.0 != "slow"));
}

#[tokio::test]
async fn test_slow_pass_self_excludes() {
    let log = Arc::new(CallLog::default());
    let gate = Arc::new(Semaphore::new(0));
    let mut watcher = watcher_at(5_700_000, MockUpstream::at(5_700_000));
    watcher.slow_add(MockIndexer::gated("slow", log.clone(), gate.clone()));
    let watcher = Arc::new(watcher);

    let w = Arc::clone(&watcher);
    let first = tokio::spawn(async move { w.slow_index(5_700_001, 5_700_010).await });
    for _ in 0..1000 {
        if !log.events().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }

    // Overlapping pass is a no-op, not queued
    watcher.slow_index(5_700_001, 5_700_010).await.unwrap();
    assert_eq!(log.ranges().len(), 1);

    gate.add_permits(1);
    first.await.unwrap().unwrap();
    assert_eq!(watcher.slow_latest(), 5_700_010);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_finds_block_within_budget() {
    let watcher = Arc::new(watcher_at(START, MockUpstream::at(5_700_005)));

    let w = Arc::clone(&watcher);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        w.catch_up_to(5_700_005).await.unwrap();
    });

    assert!(watcher.wait_for(5_700_005, 10).await);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_gives_up_after_max_tries() {
    let watcher = watcher_at(START, MockUpstream::at(START));
    assert!(!watcher.wait_for(5_800_000, 3).await);
    assert_eq!(watcher.fast_latest(), START);
}
