//! Resolved tool configuration derived from CLI arguments

use std::path::PathBuf;
use std::time::Duration;

use super::cli::{CliArgs, Command};
use crate::client::ConnectionFactory;
use crate::commands::DeleteOptions;
use crate::confirm::no_confirm_from_env;
use crate::scan::ScanOptions;

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub password: String,
    pub username: Option<String>,
}

/// What to do once connected
#[derive(Debug, Clone)]
pub enum Operation {
    Count,
    Print,
    Delete(DeleteOptions),
    Dump {
        parallel: usize,
        output: Option<PathBuf>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Count => "count",
            Operation::Print => "print",
            Operation::Delete(_) => "delete",
            Operation::Dump { .. } => "dump",
        }
    }
}

/// Complete tool configuration
#[derive(Debug, Clone)]
pub struct ToolConfig {
    // Connection
    pub address: String,
    pub cluster_mode: bool,
    pub auth: Option<AuthConfig>,
    pub dbnum: Option<u32>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,

    // Command
    pub scan: ScanOptions,
    pub operation: Operation,

    /// Skip confirmation prompts
    pub no_confirm: bool,

    // Output
    pub quiet: bool,
    pub verbose: bool,
}

impl ToolConfig {
    /// Create configuration from CLI arguments and the process environment
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        Self::from_cli_with_env(args, no_confirm_from_env())
    }

    /// Create configuration with the environment override already resolved
    pub fn from_cli_with_env(args: &CliArgs, env_no_confirm: bool) -> Result<Self, String> {
        // Validate first
        args.validate()?;

        let address = args
            .address
            .clone()
            .ok_or_else(|| "--address is required".to_string())?;

        let auth = args.password.as_ref().map(|p| AuthConfig {
            password: p.clone(),
            username: args.username.clone(),
        });

        let scan_args = args.command.scan_args();
        let scan = ScanOptions::new(scan_args.pattern.clone(), scan_args.batch, scan_args.wait.into());

        let operation = match args.command {
            Command::Count(_) => Operation::Count,
            Command::Print(_) => Operation::Print,
            Command::Delete(ref delete) => Operation::Delete(DeleteOptions {
                delete_batch: delete.delete_batch,
                unsafe_no_count: delete.unsafe_no_count,
                think_time: delete.think_time.into(),
                log_dir: delete.log_dir.clone().unwrap_or_else(std::env::temp_dir),
            }),
            Command::Dump(ref dump) => Operation::Dump {
                parallel: dump.parallel.max(1),
                output: dump.output.clone(),
            },
        };

        Ok(Self {
            address,
            cluster_mode: args.cluster,
            auth,
            dbnum: args.dbnum,
            connect_timeout: args.connect_timeout.into(),
            request_timeout: args.request_timeout.into(),
            scan,
            operation,
            no_confirm: args.yes || env_no_confirm,
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }

    /// Connection settings for every node this run talks to
    pub fn connection_factory(&self) -> ConnectionFactory {
        ConnectionFactory {
            connect_timeout: self.connect_timeout,
            read_timeout: self.request_timeout,
            write_timeout: self.request_timeout,
            auth_password: self.auth.as_ref().map(|a| a.password.clone()),
            auth_username: self.auth.as_ref().and_then(|a| a.username.clone()),
            dbnum: self.dbnum,
        }
    }
}
