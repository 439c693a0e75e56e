use backoff::{future::retry, ExponentialBackoff};
use futures::future::try_join_all;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::indexer::{IndexError, Indexer};
use super::upstream::UpstreamSource;
use crate::metrics::{BATCH_PROCESS_TIME, BLOCKS_INDEXED, FAST_CURSOR, SLOW_CURSOR, TICKS_SKIPPED};
use crate::models::LatestBlock;
use crate::utils::guess_timestamp_from_num;

// Poll period for wait_for; callers poll the fast cursor at low frequency
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

// Give up querying the upstream tip after this much backoff; the tick is
// dropped and the next one retries from scratch
const UPSTREAM_RETRY_MAX_ELAPSED: Duration = Duration::from_secs(30);

// Clears an in-flight flag on every exit path, including early returns and
// batch failures
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// Watches the shovel ledger for new blocks and keeps the derived projections
// up to date. Owns the two progress cursors:
//
// - `fast`: last block fully processed by every layered indexer. Layers run
//   in order; indexers within a layer run concurrently. The cursor never
//   advances past a block any layer failed on.
// - `slow`: last block fully processed by the decoupled slow-track indexers,
//   which run only when the fast track has pulled far enough ahead.
//
// Both cursors are monotonically non-decreasing for the life of the process.
pub struct Watcher<S> {
    store: S,
    upstream: Arc<dyn UpstreamSource>,

    // indexers by dependency layer: layers[0] runs first, layers[1] may read
    // its rows for the same range, and so on
    layers: Vec<Vec<Arc<dyn Indexer<S>>>>,
    // indexers excluded from layer synchronization; they lag behind `fast`
    slow_indexers: Vec<Arc<dyn Indexer<S>>>,

    fast: AtomicI64,
    slow: AtomicI64,
    fast_busy: AtomicBool,
    slow_busy: AtomicBool,

    batch_size: i64,
    slow_lag: i64,
}

impl<S: Send + Sync + 'static> Watcher<S> {
    pub fn new(
        store: S,
        upstream: Arc<dyn UpstreamSource>,
        start_block: i64,
        batch_size: i64,
        slow_lag: i64,
    ) -> Self {
        Watcher {
            store,
            upstream,
            layers: Vec::new(),
            slow_indexers: Vec::new(),
            fast: AtomicI64::new(start_block),
            slow: AtomicI64::new(start_block),
            fast_busy: AtomicBool::new(false),
            slow_busy: AtomicBool::new(false),
            batch_size,
            slow_lag,
        }
    }

    // Registers one dependency layer; later layers may read rows written by
    // earlier layers for the same range
    pub fn add(&mut self, layer: Vec<Arc<dyn Indexer<S>>>) {
        self.layers.push(layer);
    }

    // Registers a slow-track indexer, decoupled from layer ordering
    pub fn slow_add(&mut self, indexer: Arc<dyn Indexer<S>>) {
        self.slow_indexers.push(indexer);
    }

    pub fn fast_latest(&self) -> i64 {
        self.fast.load(Ordering::SeqCst)
    }

    pub fn slow_latest(&self) -> i64 {
        self.slow.load(Ordering::SeqCst)
    }

    pub fn latest_block(&self) -> LatestBlock {
        let number = self.fast_latest();
        LatestBlock {
            number,
            timestamp: guess_timestamp_from_num(number),
        }
    }

    // Polls for `fast >= block_number` up to `tries` times, 250ms apart.
    // Bounded, best-effort: returns false once the poll budget is spent.
    pub async fn wait_for(&self, block_number: i64, tries: u32) -> bool {
        let t0 = Instant::now();
        for _ in 0..tries {
            if self.fast_latest() >= block_number {
                info!("waiting for block {}, found after {:?}", block_number, t0.elapsed());
                return true;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
        info!(
            "waiting for block {}, not found, still on {} after {:?}",
            block_number,
            self.fast_latest(),
            t0.elapsed()
        );
        false
    }

    // Queries the upstream tip, retrying transient failures with exponential
    // backoff. Exhausting the retry budget fails the current tick only.
    pub async fn upstream_latest(&self) -> Result<i64, IndexError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(UPSTREAM_RETRY_MAX_ELAPSED),
            ..Default::default()
        };
        retry(backoff, || async {
            self.upstream.latest_block().await.map_err(backoff::Error::transient)
        })
        .await
    }

    // Processes a single bounded batch of blocks through every layer.
    //
    // The range is clamped to at most `n` blocks inclusive. Within a layer
    // all indexers run concurrently and are joined; the first failure aborts
    // the batch and no cursor is advanced by the caller. An empty range
    // (`stop < start`) is a no-op and returns `None`.
    //
    // Returns the last block processed, the caller's new fast cursor value.
    pub async fn index_batch(&self, start: i64, stop: i64, n: i64) -> Result<Option<i64>, IndexError> {
        let delta = stop - start;
        if delta < 0 {
            return Ok(None);
        }
        let limit = delta.min(n - 1);
        let t0 = Instant::now();
        info!("loading {} to {}", start, start + limit);
        for layer in &self.layers {
            // Layer N+1 must never start until every indexer in layer N has
            // finished this range
            try_join_all(layer.iter().map(|i| async move {
                i.load(&self.store, start, start + limit)
                    .await
                    .map_err(|e| -> IndexError { format!("indexer {} failed: {}", i.name(), e).into() })
            }))
            .await?;
        }
        BATCH_PROCESS_TIME.observe(t0.elapsed().as_secs_f64());
        BLOCKS_INDEXED.inc_by((limit + 1) as f64);
        info!("loaded {} to {} in {:?}", start, start + limit, t0.elapsed());
        Ok(Some(start + limit))
    }

    // Indexes batches until the fast cursor reaches `stop`, inclusive, then
    // jumps the slow track to the fast cursor in a single pass. Idempotent:
    // with `fast >= stop` already, no batch runs.
    pub async fn catch_up_to(&self, stop: i64) -> Result<(), IndexError> {
        while self.fast_latest() < stop {
            match self.index_batch(self.fast_latest() + 1, stop, self.batch_size).await? {
                Some(new_fast) => self.advance_fast(new_fast),
                None => break,
            }
        }
        self.slow_index(self.slow_latest() + 1, self.fast_latest()).await?;
        info!("initialized to {}", self.fast_latest());
        Ok(())
    }

    // One live tick: fetch the upstream tip, index one batch toward it, and
    // opportunistically kick off a slow pass if the slow track lags too far.
    //
    // Self-excluding: if a previous tick is still running this one is dropped,
    // not queued. Any failure is returned to the caller (the watch loop logs
    // and swallows it) and leaves both cursors untouched.
    pub async fn tick(self: Arc<Self>) -> Result<(), IndexError> {
        if self.fast_busy.swap(true, Ordering::SeqCst) {
            TICKS_SKIPPED.inc();
            info!("skipping tick, already indexing");
            return Ok(());
        }
        let _busy = BusyGuard(&self.fast_busy);

        let upstream_latest = self.upstream_latest().await?;
        let fast = self.fast_latest();
        if let Some(new_fast) = self.index_batch(fast + 1, upstream_latest, self.batch_size).await? {
            // Guards against an upstream regression: never move backwards
            if new_fast > fast {
                self.advance_fast(new_fast);
            }
        }

        let (fast, slow) = (self.fast_latest(), self.slow_latest());
        if fast - slow > self.slow_lag {
            // Fire and forget: the slow pass must not delay the next tick.
            // It self-excludes on slow_busy and logs its own failures.
            let watcher = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = watcher.slow_index(slow + 1, fast).await {
                    warn!("slow pass {} to {} failed: {}. Will retry on a later tick", slow + 1, fast, e);
                }
            });
        }
        Ok(())
    }

    // Starts the live tick loop on a fixed period. Tick failures are logged
    // and dropped; the loop itself never exits.
    pub fn watch(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = Arc::clone(&self).tick().await {
                    warn!("tick failed: {}. Retrying on next tick", e);
                }
            }
        });
    }

    // Runs every slow-track indexer sequentially over `start..=stop`, then
    // advances the slow cursor. Self-excluding: a pass already in flight
    // makes this a no-op. A failure leaves the cursor where it was; the next
    // trigger re-runs the whole range, which the idempotence contract on
    // Indexer::load makes safe.
    pub async fn slow_index(&self, start: i64, stop: i64) -> Result<(), IndexError> {
        if stop < start {
            return Ok(());
        }
        if self.slow_busy.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _busy = BusyGuard(&self.slow_busy);

        for indexer in &self.slow_indexers {
            indexer
                .load(&self.store, start, stop)
                .await
                .map_err(|e| -> IndexError { format!("slow indexer {} failed: {}", indexer.name(), e).into() })?;
        }
        self.slow.store(stop, Ordering::SeqCst);
        SLOW_CURSOR.set(stop as f64);
        Ok(())
    }

    fn advance_fast(&self, new_fast: i64) {
        self.fast.store(new_fast, Ordering::SeqCst);
        FAST_CURSOR.set(new_fast as f64);
    }
}

impl Watcher<sqlx::PgPool> {
    // One-time startup: idempotent schema setup, then batch indexing until
    // the fast cursor reaches the current upstream tip
    pub async fn init(&self) -> Result<(), IndexError> {
        crate::database::schema::migrate(&self.store).await?;
        let upstream_latest = self.upstream_latest().await?;
        self.catch_up_to(upstream_latest).await
    }
}
