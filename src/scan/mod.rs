//! Key enumeration engine
//!
//! - [`ShardScan`]: SCAN cursor loop on one node with progress reporting
//! - [`ShardScan::fan_out`]: the same loop on every cluster primary at once
//! - [`BatchPipeline`]: throttled single-node/cluster dispatch for commands

pub mod fanout;
pub mod iterator;
pub mod pipeline;

pub use iterator::{BatchHandler, ScanProgress, ShardScan, PROGRESS_INTERVAL};
pub use pipeline::{BatchPipeline, ScanOptions};
