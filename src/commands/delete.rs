//! `delete`: remove matching keys, behind a confirmation gate
//!
//! Counted mode enumerates once to write an audit file and a total, asks for
//! confirmation, then enumerates again and deletes. Uncounted mode asks first
//! and deletes in a single pass. The two passes of counted mode are
//! independent: keys created or removed in between are deleted uncounted or
//! skipped.
//!
//! Every DEL is logged as `<deleted> <key1> ... <keyN>` and flushed before the
//! next one is issued. Keys are written to the audit file and the log with
//! their exact bytes.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::info;

use super::sink::{create_log_file, key_lines, LineSink};
use crate::client::ShardHandle;
use crate::confirm::ConfirmGate;
use crate::scan::{BatchHandler, BatchPipeline};
use crate::utils::{CancelSignal, Result, ToolError};

/// Default keys per DEL
pub const DEFAULT_DELETE_BATCH: usize = 50;

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Keys per DEL command
    pub delete_batch: usize,
    /// Skip the counting pass
    pub unsafe_no_count: bool,
    pub think_time: Duration,
    /// Where the audit and deletion logs are created
    pub log_dir: PathBuf,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            delete_batch: DEFAULT_DELETE_BATCH,
            unsafe_no_count: false,
            think_time: Duration::from_secs(5),
            log_dir: std::env::temp_dir(),
        }
    }
}

/// Outcome of a delete run
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Keys listed by the counting pass (counted mode only)
    pub listed: Option<u64>,
    /// Keys the store reported as removed
    pub deleted: u64,
    pub audit_file: Option<PathBuf>,
    pub deletion_log: Option<PathBuf>,
}

/// Splits each batch into DEL-sized chunks and logs every chunk's outcome
struct Deleter {
    delete_batch: usize,
    log: LineSink<File>,
    deleted: AtomicU64,
}

impl BatchHandler for Deleter {
    fn handle(&self, shard: &mut ShardHandle, keys: Vec<Bytes>, cancel: &CancelSignal) -> Result<()> {
        for chunk in keys.chunks(self.delete_batch) {
            cancel.check()?;
            let deleted = shard.store().delete(chunk)?;
            self.deleted.fetch_add(deleted, Ordering::Relaxed);

            let mut line = Vec::with_capacity(16 + chunk.iter().map(|k| k.len() + 1).sum::<usize>());
            line.extend_from_slice(itoa::Buffer::new().format(deleted).as_bytes());
            for key in chunk {
                line.push(b' ');
                line.extend_from_slice(key);
            }
            line.push(b'\n');
            self.log.write(&line)?;
        }
        Ok(())
    }
}

pub fn delete_keys(
    pipeline: &BatchPipeline<'_>,
    options: &DeleteOptions,
    gate: &mut ConfirmGate,
    cancel: &CancelSignal,
) -> Result<DeleteReport> {
    if options.delete_batch == 0 {
        return Err(ToolError::Config("--delete-batch must be at least 1".to_string()));
    }

    if options.unsafe_no_count {
        delete_uncounted(pipeline, options, gate, cancel)
    } else {
        delete_counted(pipeline, options, gate, cancel)
    }
}

fn delete_counted(
    pipeline: &BatchPipeline<'_>,
    options: &DeleteOptions,
    gate: &mut ConfirmGate,
    cancel: &CancelSignal,
) -> Result<DeleteReport> {
    let address = &pipeline.client().endpoint().address;
    let pattern = &pipeline.options().pattern;

    let (audit, audit_path) = create_log_file(
        &options.log_dir,
        &format!("listed-keys-for-deletion-{}-", address),
    )?;
    let (log, log_path) = create_log_file(&options.log_dir, &format!("deleted-keys-{}-", address))?;

    info!("Counting keys for deletion");
    let audit = LineSink::durable(audit);
    let listing = |_: &mut ShardHandle, keys: Vec<Bytes>, _: &CancelSignal| -> Result<()> {
        audit.write(key_lines(&keys))?;
        Ok(())
    };
    let count = pipeline.run(cancel, &listing)?;

    let mut report = DeleteReport {
        listed: Some(count),
        audit_file: Some(audit_path.clone()),
        deletion_log: Some(log_path.clone()),
        ..DeleteReport::default()
    };

    if count == 0 {
        info!("No keys with pattern {} were found", pattern);
        return Ok(report);
    }

    let message = format!(
        "WARNING! Deleting an estimate of {} keys with pattern {} in {}.\n\
         Check {} for selected keys.\n\
         Keys being deleted will be logged to {}",
        count,
        pattern,
        address,
        audit_path.display(),
        log_path.display()
    );
    gate.confirm(&message, address, options.think_time, cancel)?;

    report.deleted = run_deletion(pipeline, options, log, cancel)?;
    Ok(report)
}

fn delete_uncounted(
    pipeline: &BatchPipeline<'_>,
    options: &DeleteOptions,
    gate: &mut ConfirmGate,
    cancel: &CancelSignal,
) -> Result<DeleteReport> {
    let address = &pipeline.client().endpoint().address;
    let pattern = &pipeline.options().pattern;

    let (log, log_path) = create_log_file(&options.log_dir, &format!("deleted-keys-{}-", address))?;

    let message = format!(
        "WARNING! --unsafe-no-count passed. Skipping initial key counting. \
         Keys with pattern {} will be deleted as they are found in {}. \
         This is a faster but DANGEROUS option.\n\
         Keys being deleted will be logged to {}",
        pattern,
        address,
        log_path.display()
    );
    gate.confirm(&message, address, options.think_time, cancel)?;

    let deleted = run_deletion(pipeline, options, log, cancel)?;
    Ok(DeleteReport {
        deleted,
        deletion_log: Some(log_path),
        ..DeleteReport::default()
    })
}

fn run_deletion(
    pipeline: &BatchPipeline<'_>,
    options: &DeleteOptions,
    log: File,
    cancel: &CancelSignal,
) -> Result<u64> {
    let deleter = Deleter {
        delete_batch: options.delete_batch,
        log: LineSink::durable(log),
        deleted: AtomicU64::new(0),
    };

    let start = Instant::now();
    pipeline.run(cancel, &deleter)?;

    let deleted = deleter.deleted.into_inner();
    let elapsed = Duration::from_millis(start.elapsed().as_millis() as u64);
    info!("Deleted {} keys in {}", deleted, humantime::format_duration(elapsed));
    Ok(deleted)
}
