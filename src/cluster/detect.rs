//! Cluster membership detection

use tracing::debug;

use crate::client::KeyStore;
use crate::utils::Result;

/// Whether an `INFO cluster` payload reports cluster support enabled.
/// A missing field means the server predates cluster support.
pub fn is_cluster_enabled(info: &str) -> bool {
    info.lines()
        .filter_map(|line| line.trim().strip_prefix("cluster_enabled:"))
        .any(|value| value.trim() == "1")
}

/// Ask the node behind `store` whether it is a cluster member
pub fn detect_cluster(store: &mut dyn KeyStore) -> Result<bool> {
    let info = store.info("cluster")?;
    let enabled = is_cluster_enabled(&info);
    debug!("{} cluster_enabled={}", store.address(), enabled);
    Ok(enabled)
}
