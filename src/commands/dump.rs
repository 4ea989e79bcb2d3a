//! `dump`: every matching key with its type and value, one JSON object per line
//!
//! Scan threads hand batches to a fixed pool of workers over a zero-capacity
//! channel, so enumeration never runs ahead of the workers. Each worker keeps
//! its own connection per shard, looks up the type of every key in a batch,
//! then fetches values with the matching bulk command. Key names are only
//! converted to text (lossily) when the record is rendered.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use bytes::Bytes;
use crossbeam_channel::{select, Receiver, Sender};
use serde::Serialize;
use tracing::debug;

use super::sink::LineSink;
use crate::client::{Connector, KeyStore, KeyType, ScoredMember, ShardHandle, SET_SCAN_COUNT};
use crate::scan::BatchPipeline;
use crate::utils::{CancelSignal, FailFast, Result, ToolError};

/// One output line
#[derive(Debug, Serialize)]
pub struct DumpRecord<'a> {
    pub key: &'a str,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub value: DumpValue,
}

/// Value payload, shaped by the key's type
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DumpValue {
    /// string; `None` if the key vanished before it was read
    Scalar(Option<String>),
    /// list or set
    Members(Vec<String>),
    /// zset, lowest score first
    Scored(Vec<ScoredMember>),
    /// hash, fields in sorted order
    Fields(BTreeMap<String, String>),
    /// stream and unknown types
    Null,
}

/// A scanned batch and the shard it came from
struct DumpJob {
    address: String,
    keys: Vec<Bytes>,
}

/// Keys of one batch grouped by type
#[derive(Default)]
struct Classified {
    strings: Vec<Bytes>,
    lists: Vec<Bytes>,
    sets: Vec<Bytes>,
    sorted_sets: Vec<Bytes>,
    hashes: Vec<Bytes>,
    opaque: Vec<(Bytes, KeyType)>,
}

impl Classified {
    fn new(keys: Vec<Bytes>, types: Vec<KeyType>) -> Self {
        let mut classified = Self::default();
        for (key, key_type) in keys.into_iter().zip(types) {
            match key_type {
                KeyType::String => classified.strings.push(key),
                KeyType::List => classified.lists.push(key),
                KeyType::Set => classified.sets.push(key),
                KeyType::SortedSet => classified.sorted_sets.push(key),
                KeyType::Hash => classified.hashes.push(key),
                KeyType::Stream | KeyType::Unknown => classified.opaque.push((key, key_type)),
            }
        }
        classified
    }
}

struct DumpWorker<'a, W: Write> {
    connector: &'a dyn Connector,
    sink: &'a LineSink<W>,
    records: &'a AtomicU64,
    connections: HashMap<String, Box<dyn KeyStore>>,
}

impl<'a, W: Write> DumpWorker<'a, W> {
    fn new(connector: &'a dyn Connector, sink: &'a LineSink<W>, records: &'a AtomicU64) -> Self {
        Self {
            connector,
            sink,
            records,
            connections: HashMap::new(),
        }
    }

    /// Consume jobs until the producer closes the channel or `cancel` fires
    fn run(&mut self, jobs: &Receiver<DumpJob>, cancel: &CancelSignal) -> Result<()> {
        loop {
            select! {
                recv(jobs) -> job => match job {
                    Ok(job) => self.dump_batch(job, cancel)?,
                    Err(_) => return Ok(()),
                },
                recv(cancel.listener()) -> _ => return Err(ToolError::Cancelled),
            }
        }
    }

    fn connection(&mut self, address: &str) -> Result<&mut dyn KeyStore> {
        if !self.connections.contains_key(address) {
            debug!("Dump worker connecting to {}", address);
            let store = self.connector.connect(address)?;
            self.connections.insert(address.to_string(), store);
        }
        match self.connections.get_mut(address) {
            Some(store) => Ok(store.as_mut()),
            None => Err(ToolError::Config(format!("no connection to {}", address))),
        }
    }

    fn dump_batch(&mut self, job: DumpJob, cancel: &CancelSignal) -> Result<()> {
        cancel.check()?;
        let sink = self.sink;
        let records = self.records;
        let emit = |key: &[u8], key_type: KeyType, value: DumpValue| -> Result<()> {
            let key = String::from_utf8_lossy(key);
            let mut line = serde_json::to_string(&DumpRecord {
                key: &key,
                key_type,
                value,
            })?;
            line.push('\n');
            sink.write(&line)?;
            records.fetch_add(1, Ordering::Relaxed);
            Ok(())
        };

        let store = self.connection(&job.address)?;
        let types = store.key_types(&job.keys)?;
        let classified = Classified::new(job.keys, types);

        if !classified.strings.is_empty() {
            let values = store.mget(&classified.strings)?;
            for (key, value) in classified.strings.iter().zip(values) {
                emit(&key[..], KeyType::String, DumpValue::Scalar(value))?;
            }
        }

        for key in &classified.lists {
            let items = store.list_range(key)?;
            emit(&key[..], KeyType::List, DumpValue::Members(items))?;
        }

        for key in &classified.sets {
            let mut members = Vec::new();
            let mut cursor = 0;
            loop {
                let page = store.set_scan(key, cursor, SET_SCAN_COUNT)?;
                members.extend(
                    page.items
                        .iter()
                        .map(|member| String::from_utf8_lossy(member).into_owned()),
                );
                if page.cursor == 0 {
                    break;
                }
                cursor = page.cursor;
            }
            emit(&key[..], KeyType::Set, DumpValue::Members(members))?;
        }

        for key in &classified.sorted_sets {
            let members = store.sorted_set_range(key)?;
            emit(&key[..], KeyType::SortedSet, DumpValue::Scored(members))?;
        }

        for key in &classified.hashes {
            let fields = store.hash_get_all(key)?.into_iter().collect();
            emit(&key[..], KeyType::Hash, DumpValue::Fields(fields))?;
        }

        for (key, key_type) in &classified.opaque {
            emit(&key[..], *key_type, DumpValue::Null)?;
        }

        Ok(())
    }
}

/// Dump every matching key to `out` using `parallel` workers (at least one).
/// Returns the number of records written.
pub fn dump_keys<W: Write + Send>(
    pipeline: &BatchPipeline<'_>,
    parallel: usize,
    cancel: &CancelSignal,
    out: W,
) -> Result<u64> {
    let parallel = parallel.max(1);
    let group = FailFast::new(cancel.child());
    let sink = LineSink::buffered(out);
    let records = AtomicU64::new(0);
    let connector = pipeline.client().connector().as_ref();
    let (jobs_tx, jobs_rx): (Sender<DumpJob>, Receiver<DumpJob>) = crossbeam_channel::bounded(0);

    thread::scope(|s| {
        for id in 0..parallel {
            let jobs = jobs_rx.clone();
            let group = &group;
            let sink = &sink;
            let records = &records;
            let spawned = thread::Builder::new()
                .name(format!("dump-worker-{}", id))
                .spawn_scoped(s, move || {
                    let mut worker = DumpWorker::new(connector, sink, records);
                    group.observe(worker.run(&jobs, group.signal()));
                });
            if let Err(e) = spawned {
                group.record(e.into());
            }
        }
        drop(jobs_rx);

        let producer = |shard: &mut ShardHandle, keys: Vec<Bytes>, cancel: &CancelSignal| -> Result<()> {
            let job = DumpJob {
                address: shard.address().to_string(),
                keys,
            };
            select! {
                // Every worker has exited, which only happens after a failure
                send(jobs_tx, job) -> sent => sent.map_err(|_| ToolError::Cancelled),
                recv(cancel.listener()) -> _ => Err(ToolError::Cancelled),
            }
        };
        group.observe(pipeline.run(group.signal(), &producer).map(|_| ()));
        drop(jobs_tx);
    });

    sink.flush()?;
    group.finish(records.into_inner())
}
