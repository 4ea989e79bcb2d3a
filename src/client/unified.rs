//! Unified client over single-node and cluster endpoints
//!
//! The endpoint's topology is resolved once at connect time. Engines never
//! branch on it themselves: they ask for the session's shard handles and get
//! one for a single node, or one per slot-owning primary for a cluster.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::store::{Connector, KeyStore};
use crate::cluster::{detect_cluster, ClusterTopology};
use crate::utils::{CancelSignal, ClusterError, Result};

/// Delay before continuing against a cluster member in single-node mode
pub const MODE_MISMATCH_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMode {
    Single,
    Cluster,
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyMode::Single => f.write_str("single-node"),
            TopologyMode::Cluster => f.write_str("cluster"),
        }
    }
}

/// Target address plus its resolved topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub mode: TopologyMode,
}

impl Endpoint {
    pub fn is_cluster(&self) -> bool {
        self.mode == TopologyMode::Cluster
    }

    /// Force single-node mode for the rest of the run
    pub fn downgrade(&mut self) {
        self.mode = TopologyMode::Single;
    }
}

/// A connection to one shard plus its identity, live for one session
pub struct ShardHandle {
    address: String,
    store: Box<dyn KeyStore>,
}

impl ShardHandle {
    pub fn open(connector: &dyn Connector, address: &str) -> Result<Self> {
        Ok(Self {
            address: address.to_string(),
            store: connector.connect(address)?,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn store(&mut self) -> &mut dyn KeyStore {
        self.store.as_mut()
    }
}

/// Uniform handle over a single node or a cluster
pub struct UnifiedClient {
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    /// Addresses scanned per session: the endpoint itself, or every primary
    shards: Vec<String>,
}

impl UnifiedClient {
    /// Detect the endpoint topology and reconcile it with what the operator asked for.
    ///
    /// A cluster member reached without `cluster_requested` is downgraded to
    /// single-node mode after a warning and a cancellable `mismatch_delay`.
    /// Asking for cluster mode against a standalone node only warns.
    pub fn connect(
        connector: Arc<dyn Connector>,
        address: &str,
        cluster_requested: bool,
        cancel: &CancelSignal,
        mismatch_delay: Duration,
    ) -> Result<Self> {
        let mut seed = connector.connect(address)?;
        let clustered = detect_cluster(seed.as_mut())?;

        let mut endpoint = Endpoint {
            address: address.to_string(),
            mode: if clustered {
                TopologyMode::Cluster
            } else {
                TopologyMode::Single
            },
        };

        if clustered && !cluster_requested {
            warn!(
                "WARNING! {} is a member of a cluster, but cluster mode (-c|--cluster) is NOT enabled. \
                 Commands will be local to this particular node. Waiting {:?} before continuing",
                address, mismatch_delay
            );
            cancel.sleep(mismatch_delay)?;
            endpoint.downgrade();
        } else if !clustered && cluster_requested {
            warn!(
                "Cluster mode requested but {} is not a cluster member, continuing in single-node mode",
                address
            );
        }

        let shards = if endpoint.is_cluster() {
            let topology = ClusterTopology::from_cluster_nodes(&seed.cluster_nodes()?)?;
            let shards = topology.shard_addresses();
            if shards.is_empty() {
                return Err(ClusterError::NoPrimaries.into());
            }
            info!(
                "Connected to cluster via {}: {} shards ({} nodes)",
                address,
                shards.len(),
                topology.num_nodes()
            );
            shards
        } else {
            info!("Connected to {} in single-node mode", address);
            vec![address.to_string()]
        };

        Ok(Self {
            endpoint,
            connector,
            shards,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn shard_addresses(&self) -> &[String] {
        &self.shards
    }

    /// Open one handle per shard for a new session.
    /// All connections are established before any scanning starts.
    pub fn open_shards(&self) -> Result<Vec<ShardHandle>> {
        self.shards
            .iter()
            .map(|address| ShardHandle::open(self.connector.as_ref(), address))
            .collect()
    }
}
