//! `print`: one matching key per line

use std::io::Write;

use bytes::Bytes;

use super::sink::{key_lines, LineSink};
use crate::client::ShardHandle;
use crate::scan::BatchPipeline;
use crate::utils::{CancelSignal, Result};

/// Write every matching key to `out`. Each batch is written in one locked
/// chunk so lines from concurrent shards never interleave.
pub fn print_keys<W: Write + Send>(pipeline: &BatchPipeline<'_>, cancel: &CancelSignal, out: W) -> Result<u64> {
    let sink = LineSink::buffered(out);
    let handler = |_: &mut ShardHandle, keys: Vec<Bytes>, _: &CancelSignal| -> Result<()> {
        sink.write(key_lines(&keys))?;
        Ok(())
    };

    let result = pipeline.run(cancel, &handler);
    sink.flush()?;
    result
}
