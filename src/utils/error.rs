//! Error types for valkey-keytool

use std::io;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The shared cancellation signal fired while waiting or iterating.
    #[error("operation cancelled")]
    Cancelled,

    /// The operator declined (or did not answer) a confirmation prompt.
    #[error("user aborted")]
    Aborted,
}

impl ToolError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ToolError::Cancelled)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ToolError::Aborted)
    }
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {address}: {source}")]
    ConnectFailed { address: String, source: io::Error },

    #[error("Connection to {address} failed: {source}")]
    Lost { address: String, source: io::Error },

    #[error("Invalid address '{0}', expected host:port")]
    InvalidAddress(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("SELECT {db} failed: {reason}")]
    SelectFailed { db: u32, reason: String },
}

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unexpected response to {command}: {actual}")]
    UnexpectedResponse { command: String, actual: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Cluster-related errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to parse CLUSTER NODES response: {0}")]
    ParseFailed(String),

    #[error("No primary nodes found in cluster")]
    NoPrimaries,
}

pub type Result<T> = std::result::Result<T, ToolError>;
