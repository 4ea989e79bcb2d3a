//! Client connection layer

pub mod control_plane;
#[cfg(test)]
pub mod memory;
pub mod raw_connection;
pub mod store;
pub mod unified;

pub use control_plane::{ControlPlane, ControlPlaneExt};
pub use raw_connection::{ConnectionFactory, RawConnection};
pub use store::{Connector, KeyStore, KeyType, ScanPage, ScoredMember, SET_SCAN_COUNT};
pub use unified::{Endpoint, ShardHandle, TopologyMode, UnifiedClient, MODE_MISMATCH_DELAY};
