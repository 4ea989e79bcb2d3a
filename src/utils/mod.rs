//! Utility modules

pub mod cancel;
pub mod error;
pub mod resp;

pub use cancel::{CancelSignal, FailFast};
pub use error::{ClusterError, ConnectionError, ProtocolError, Result, ToolError};
pub use resp::{RespDecoder, RespEncoder, RespValue};
