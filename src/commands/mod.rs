//! Operator commands built on the batch pipeline

pub mod count;
pub mod delete;
pub mod dump;
pub mod print;
pub mod sink;

pub use count::count_keys;
pub use delete::{delete_keys, DeleteOptions, DeleteReport, DEFAULT_DELETE_BATCH};
pub use dump::{dump_keys, DumpRecord, DumpValue};
pub use print::print_keys;
pub use sink::LineSink;
