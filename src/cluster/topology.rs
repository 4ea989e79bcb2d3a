//! Cluster topology snapshot

use tracing::debug;

use super::node::{parse_cluster_node_line, ClusterNode};
use crate::utils::ClusterError;

/// Cluster topology snapshot, taken once per fan-out session
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    /// All nodes in the cluster
    pub nodes: Vec<ClusterNode>,
}

impl ClusterTopology {
    /// Parse CLUSTER NODES response
    pub fn from_cluster_nodes(response: &str) -> Result<Self, ClusterError> {
        let mut nodes = Vec::new();

        for line in response.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_cluster_node_line(line) {
                Some(node) => nodes.push(node),
                None => debug!("Skipping unparseable CLUSTER NODES line: {}", line),
            }
        }

        if nodes.is_empty() {
            return Err(ClusterError::ParseFailed(
                "no node lines in response".to_string(),
            ));
        }
        if !nodes.iter().any(|n| n.is_primary) {
            return Err(ClusterError::NoPrimaries);
        }

        Ok(Self { nodes })
    }

    /// Get all primary nodes
    pub fn primaries(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter().filter(|n| n.is_primary)
    }

    /// Addresses of the primaries that own slots, ordered by their first slot.
    ///
    /// These are the shards a fan-out scans: every key lives on exactly one of
    /// them. A failed primary is still listed so that connecting to it fails
    /// loudly instead of silently skipping its keys.
    pub fn shard_addresses(&self) -> Vec<String> {
        let mut owners: Vec<&ClusterNode> = self
            .primaries()
            .filter(|n| {
                if n.slot_ranges.is_empty() {
                    debug!("Primary {} owns no slots, not scanning it", n.address());
                    false
                } else {
                    true
                }
            })
            .collect();
        owners.sort_by_key(|n| n.first_slot());
        owners.into_iter().map(|n| n.address()).collect()
    }

    /// Get number of primary nodes
    pub fn num_primaries(&self) -> usize {
        self.primaries().count()
    }

    /// Get total number of nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}
