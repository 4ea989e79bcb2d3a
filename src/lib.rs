//! valkey-keytool library
//!
//! Cluster-aware key enumeration for Valkey/Redis, with the count, print,
//! dump and guarded bulk-delete commands built on top of it.

pub mod client;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod scan;
pub mod utils;
