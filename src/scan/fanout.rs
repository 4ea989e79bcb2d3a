//! Concurrent enumeration across every primary of a cluster
//!
//! One thread per shard, each with its own cursor and progress ticker. The
//! shards share a child of the caller's signal: the first shard to fail
//! cancels it, the others unwind with `Cancelled`, and only the first real
//! error is returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use super::iterator::{BatchHandler, ShardScan};
use crate::client::ShardHandle;
use crate::utils::{CancelSignal, FailFast, Result};

impl ShardScan<'_> {
    /// Run the scan on every shard concurrently. Returns the total number of
    /// keys handed to `handler` across all shards.
    pub fn fan_out<H>(&self, shards: Vec<ShardHandle>, cancel: &CancelSignal, handler: &H) -> Result<u64>
    where
        H: BatchHandler + ?Sized,
    {
        let group = FailFast::new(cancel.child());
        let total = AtomicU64::new(0);
        let shard_count = shards.len();

        thread::scope(|s| {
            for mut shard in shards {
                let group = &group;
                let total = &total;
                let spawned = thread::Builder::new()
                    .name(format!("scan-{}", shard.address()))
                    .spawn_scoped(s, move || {
                        match self.run(&mut shard, group.signal(), handler) {
                            Ok(keys) => {
                                total.fetch_add(keys, Ordering::Relaxed);
                            }
                            Err(e) if e.is_cancelled() => {
                                debug!("[{}] cancelled", shard.address());
                                group.record(e);
                            }
                            Err(e) => {
                                warn!("[{}] shard failed: {}", shard.address(), e);
                                group.record(e);
                            }
                        }
                    });
                if let Err(e) = spawned {
                    group.record(e.into());
                    break;
                }
            }
        });

        let total = group.finish(total.into_inner())?;
        info!("Scanned {} shards, {} keys matched", shard_count, total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::MemoryCluster;
    use crate::utils::ToolError;
    use bytes::Bytes;
    use parking_lot::Mutex;

    const SHARDS: [&str; 3] = ["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"];

    fn cluster_with_keys(per_shard: usize) -> MemoryCluster {
        let store = MemoryCluster::sharded(&SHARDS);
        for address in SHARDS {
            store.insert_strings(address, &format!("{}/key:", address), per_shard);
        }
        store
    }

    fn open_all(store: &MemoryCluster) -> Vec<ShardHandle> {
        SHARDS
            .iter()
            .map(|address| ShardHandle::open(store, address).unwrap())
            .collect()
    }

    #[test]
    fn test_fan_out_covers_every_shard() {
        let store = cluster_with_keys(250);
        let per_shard = Mutex::new(std::collections::BTreeMap::<String, usize>::new());
        let handler = |shard: &mut ShardHandle, keys: Vec<Bytes>, _: &CancelSignal| -> Result<()> {
            assert!(keys.iter().all(|k| k.starts_with(shard.address().as_bytes())));
            *per_shard.lock().entry(shard.address().to_string()).or_default() += keys.len();
            Ok(())
        };

        let total = ShardScan::new("*", 40)
            .fan_out(open_all(&store), &CancelSignal::new(), &handler)
            .unwrap();

        assert_eq!(total, 750);
        let per_shard = per_shard.into_inner();
        assert_eq!(per_shard.len(), 3);
        assert!(per_shard.values().all(|n| *n == 250));
    }

    #[test]
    fn test_failing_shard_cancels_the_others() {
        let store = cluster_with_keys(100);
        let cancelled = Mutex::new(Vec::new());
        let (ready_tx, ready_rx) = crossbeam_channel::unbounded::<()>();

        // Shards 1 and 3 block on their first batch until the group is cancelled;
        // shard 2 fails once both are parked.
        let handler = |shard: &mut ShardHandle, _: Vec<Bytes>, cancel: &CancelSignal| -> Result<()> {
            if shard.address() == SHARDS[1] {
                ready_rx.recv().unwrap();
                ready_rx.recv().unwrap();
                return Err(ToolError::Config(format!("{} exploded", shard.address())));
            }
            ready_tx.send(()).unwrap();
            let _ = cancel.listener().recv();
            cancelled.lock().push(shard.address().to_string());
            Err(ToolError::Cancelled)
        };

        let parent = CancelSignal::new();
        let err = ShardScan::new("*", 10)
            .fan_out(open_all(&store), &parent, &handler)
            .unwrap_err();

        match err {
            ToolError::Config(msg) => assert_eq!(msg, "10.0.0.2:6379 exploded"),
            other => panic!("expected shard 2's error, got {:?}", other),
        }
        let mut cancelled = cancelled.into_inner();
        cancelled.sort();
        assert_eq!(cancelled, vec![SHARDS[0], SHARDS[2]]);
        // The group's signal is a child; the caller's stays live
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_scan_error_on_one_shard() {
        let store = cluster_with_keys(100);
        store.fail_scan_at(SHARDS[2], 3);
        let handler = |_: &mut ShardHandle, _: Vec<Bytes>, _: &CancelSignal| -> Result<()> { Ok(()) };

        let err = ShardScan::new("*", 10)
            .fan_out(open_all(&store), &CancelSignal::new(), &handler)
            .unwrap_err();
        assert!(matches!(err, ToolError::Protocol(_)));
    }

    #[test]
    fn test_parent_cancel_reaches_shards() {
        let store = cluster_with_keys(10);
        let parent = CancelSignal::new();
        parent.cancel();
        let handler = |_: &mut ShardHandle, _: Vec<Bytes>, _: &CancelSignal| -> Result<()> { Ok(()) };

        let err = ShardScan::new("*", 10)
            .fan_out(open_all(&store), &parent, &handler)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
