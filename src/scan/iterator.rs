//! Cursor-driven key enumeration on one node
//!
//! The loop starts at cursor 0 and follows the cursors the node hands back
//! until one of them is 0 again. Each non-empty page is passed to the handler
//! before the next SCAN is issued, so a shard is processed strictly in cursor
//! order and a handler error stops the shard immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{after, select};
use tracing::{debug, info};

use crate::client::ShardHandle;
use crate::utils::{CancelSignal, Result};

/// Default interval between progress reports
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Per-batch callback shared by every shard of a session.
/// Keys arrive exactly as the server returned them.
pub trait BatchHandler: Sync {
    fn handle(&self, shard: &mut ShardHandle, keys: Vec<Bytes>, cancel: &CancelSignal) -> Result<()>;
}

impl<F> BatchHandler for F
where
    F: Fn(&mut ShardHandle, Vec<Bytes>, &CancelSignal) -> Result<()> + Sync,
{
    fn handle(&self, shard: &mut ShardHandle, keys: Vec<Bytes>, cancel: &CancelSignal) -> Result<()> {
        self(shard, keys, cancel)
    }
}

/// Cumulative keys handed to the handler, and since when
pub struct ScanProgress {
    processed: AtomicU64,
    started: Instant,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    #[inline]
    pub fn add(&self, keys: usize) {
        self.processed.fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn keys_per_second(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.processed() as f64 / secs
        } else {
            0.0
        }
    }

    fn report(&self, address: &str) {
        info!(
            "[{}] processed {} keys (~{:.2} keys/s)",
            address,
            self.processed(),
            self.keys_per_second()
        );
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// How a shard is enumerated
#[derive(Debug, Clone)]
pub struct ShardScan<'a> {
    pub pattern: &'a str,
    /// SCAN COUNT hint
    pub batch_size: usize,
    pub progress_interval: Duration,
}

impl<'a> ShardScan<'a> {
    pub fn new(pattern: &'a str, batch_size: usize) -> Self {
        Self {
            pattern,
            batch_size,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Enumerate every key on `shard` matching the pattern.
    ///
    /// Returns the number of keys handed to `handler`. A background ticker
    /// logs progress every `progress_interval` until the loop ends or `cancel`
    /// fires; a final report is logged either way.
    pub fn run<H>(&self, shard: &mut ShardHandle, cancel: &CancelSignal, handler: &H) -> Result<u64>
    where
        H: BatchHandler + ?Sized,
    {
        let progress = ScanProgress::new();
        let address = shard.address().to_string();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let result = thread::scope(|s| {
            let progress = &progress;
            let address = address.as_str();
            let interval = self.progress_interval;
            s.spawn(move || loop {
                select! {
                    recv(done_rx) -> _ => break,
                    recv(cancel.listener()) -> _ => break,
                    recv(after(interval)) -> _ => progress.report(address),
                }
            });

            let result = self.scan_loop(shard, cancel, handler, progress);
            drop(done_tx);
            result
        });

        progress.report(&address);
        if let Err(ref e) = result {
            debug!("[{}] scan stopped: {}", address, e);
        }
        result.map(|_| progress.processed())
    }

    fn scan_loop<H>(
        &self,
        shard: &mut ShardHandle,
        cancel: &CancelSignal,
        handler: &H,
        progress: &ScanProgress,
    ) -> Result<()>
    where
        H: BatchHandler + ?Sized,
    {
        let mut cursor: u64 = 0;
        loop {
            cancel.check()?;
            let page = shard.store().scan(cursor, self.pattern, self.batch_size)?;

            // Empty pages with a live cursor are normal when few keys match
            if !page.items.is_empty() {
                progress.add(page.items.len());
                handler.handle(shard, page.items, cancel)?;
            }

            if page.cursor == 0 {
                return Ok(());
            }
            cursor = page.cursor;
        }
    }
}
