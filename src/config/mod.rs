//! Configuration module

pub mod cli;
pub mod tool_config;

pub use cli::{CliArgs, Command, DeleteArgs, DumpArgs, ScanArgs};
pub use tool_config::{AuthConfig, Operation, ToolConfig};
