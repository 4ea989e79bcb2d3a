//! `count`: number of keys matching the pattern

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::client::ShardHandle;
use crate::scan::BatchPipeline;
use crate::utils::{CancelSignal, Result};

/// Count matching keys across all shards and write the total as one line
pub fn count_keys<W: Write>(pipeline: &BatchPipeline<'_>, cancel: &CancelSignal, out: &mut W) -> Result<u64> {
    let count = AtomicU64::new(0);
    let handler = |_: &mut ShardHandle, keys: Vec<Bytes>, _: &CancelSignal| -> Result<()> {
        count.fetch_add(keys.len() as u64, Ordering::Relaxed);
        Ok(())
    };

    pipeline.run(cancel, &handler)?;

    let count = count.into_inner();
    writeln!(out, "{}", count)?;
    out.flush()?;
    Ok(count)
}
