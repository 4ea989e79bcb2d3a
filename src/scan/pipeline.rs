//! Batch pipeline shared by count, print, delete and dump
//!
//! Feeds every matched key batch to a handler, optionally sleeping after each
//! handled batch to bound the load on the store. Whether the endpoint is a
//! single node or a cluster is invisible to the handler.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::iterator::{BatchHandler, ShardScan, PROGRESS_INTERVAL};
use crate::client::{ShardHandle, UnifiedClient};
use crate::utils::{CancelSignal, Result, ToolError};

/// Enumeration settings common to every command
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// SCAN MATCH glob
    pub pattern: String,
    /// SCAN COUNT hint
    pub batch_size: usize,
    /// Pause after each handled batch
    pub wait: Duration,
    pub progress_interval: Duration,
}

impl ScanOptions {
    pub fn new(pattern: impl Into<String>, batch_size: usize, wait: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            batch_size,
            wait,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pattern.is_empty() {
            return Err(ToolError::Config(
                "--pattern must be set to a value. To match all keys use --pattern '*'".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ToolError::Config("--batch must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Handler wrapper that sleeps `wait` after every successful batch.
/// A cancel during the pause is reported as `Cancelled`.
struct Throttled<'a, H: ?Sized> {
    inner: &'a H,
    wait: Duration,
}

impl<H> BatchHandler for Throttled<'_, H>
where
    H: BatchHandler + ?Sized,
{
    fn handle(&self, shard: &mut ShardHandle, keys: Vec<Bytes>, cancel: &CancelSignal) -> Result<()> {
        self.inner.handle(shard, keys, cancel)?;
        cancel.sleep(self.wait)
    }
}

/// Drives one enumeration session per `run` call against a resolved endpoint
pub struct BatchPipeline<'a> {
    client: &'a UnifiedClient,
    options: ScanOptions,
}

impl<'a> BatchPipeline<'a> {
    pub fn new(client: &'a UnifiedClient, options: ScanOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { client, options })
    }

    pub fn client(&self) -> &UnifiedClient {
        self.client
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Enumerate all matching keys once, handing each batch to `handler`.
    /// Returns the number of keys enumerated.
    pub fn run<H>(&self, cancel: &CancelSignal, handler: &H) -> Result<u64>
    where
        H: BatchHandler + ?Sized,
    {
        let scan = ShardScan {
            pattern: &self.options.pattern,
            batch_size: self.options.batch_size,
            progress_interval: self.options.progress_interval,
        };

        let shards = self.client.open_shards()?;
        debug!(
            "Scanning {} shard(s) for '{}' (batch {}, wait {:?})",
            shards.len(),
            self.options.pattern,
            self.options.batch_size,
            self.options.wait
        );

        if self.options.wait.is_zero() {
            self.dispatch(&scan, shards, cancel, handler)
        } else {
            let throttled = Throttled {
                inner: handler,
                wait: self.options.wait,
            };
            self.dispatch(&scan, shards, cancel, &throttled)
        }
    }

    fn dispatch<H>(
        &self,
        scan: &ShardScan<'_>,
        shards: Vec<ShardHandle>,
        cancel: &CancelSignal,
        handler: &H,
    ) -> Result<u64>
    where
        H: BatchHandler + ?Sized,
    {
        if self.client.endpoint().is_cluster() {
            return scan.fan_out(shards, cancel, handler);
        }

        match shards.into_iter().next() {
            Some(mut shard) => scan.run(&mut shard, cancel, handler),
            None => Ok(0),
        }
    }
}
