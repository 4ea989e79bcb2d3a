//! Cluster topology and membership
//!
//! This module provides:
//! - Cluster membership detection via INFO cluster
//! - Topology discovery via CLUSTER NODES
//! - The list of slot-owning primaries a fan-out scans

pub mod detect;
pub mod node;
pub mod topology;

pub use detect::{detect_cluster, is_cluster_enabled};
pub use node::ClusterNode;
pub use topology::ClusterTopology;
