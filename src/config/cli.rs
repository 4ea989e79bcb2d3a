//! Command-line argument parsing
//!
//! Connection options are global and may appear before or after the
//! subcommand. Every subcommand embeds the shared scan options.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Count, print, dump or delete keys matching a pattern, on a single node or a whole cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "valkey-keytool")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    // ===== Connection Options =====
    /// Server address. Eg: localhost:6379
    #[arg(short = 'a', long = "address", global = true)]
    pub address: Option<String>,

    /// Connect in cluster mode and fan out across every primary
    #[arg(short = 'c', long = "cluster", global = true)]
    pub cluster: bool,

    /// Username for ACL AUTH (requires --auth)
    #[arg(long = "user", global = true)]
    pub username: Option<String>,

    /// Password for AUTH command
    #[arg(long = "auth", global = true)]
    pub password: Option<String>,

    /// Database number to SELECT (single-node only; cluster nodes serve only 0)
    #[arg(long = "db", global = true)]
    pub dbnum: Option<u32>,

    /// TCP connect timeout
    #[arg(long = "connect-timeout", default_value = "5s", global = true)]
    pub connect_timeout: humantime::Duration,

    /// Per-request read/write timeout
    #[arg(long = "request-timeout", default_value = "30s", global = true)]
    pub request_timeout: humantime::Duration,

    // ===== Safety =====
    /// Skip confirmation prompts (same as UNSAFE_NO_CONFIRM=true)
    #[arg(long = "yes", global = true)]
    pub yes: bool,

    // ===== Output =====
    /// Debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Count keys matching the pattern
    Count(ScanArgs),
    /// Print keys matching the pattern, one per line
    Print(ScanArgs),
    /// Delete keys matching the pattern
    Delete(DeleteArgs),
    /// Dumps keys and their respective values
    Dump(DumpArgs),
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Which pattern to search for. The pattern format is the same documented in the SCAN command
    #[arg(short = 'p', long = "pattern")]
    pub pattern: String,

    /// How many keys to scan at a time. Higher is faster but puts more load on the server
    #[arg(short = 'b', long = "batch", default_value_t = 1000)]
    pub batch: usize,

    /// Wait this amount of time between batches
    #[arg(short = 'w', long = "wait", default_value = "0s")]
    pub wait: humantime::Duration,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Delete this amount of keys per command
    #[arg(long = "delete-batch", default_value_t = 50)]
    pub delete_batch: usize,

    /// WARNING: faster but considerably more dangerous. Skips counting the keys
    /// before asking for confirmation; keys are deleted as they are found
    #[arg(long = "unsafe-no-count")]
    pub unsafe_no_count: bool,

    /// Pause before the confirmation prompt
    #[arg(long = "think-time", default_value = "5s")]
    pub think_time: humantime::Duration,

    /// Directory for the listed-keys and deleted-keys logs (default: system temp dir)
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// How many batches to dump in parallel once they are scanned
    #[arg(long = "parallel", default_value_t = 1)]
    pub parallel: usize,

    /// Write records to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Count(_) => "count",
            Command::Print(_) => "print",
            Command::Delete(_) => "delete",
            Command::Dump(_) => "dump",
        }
    }

    pub fn scan_args(&self) -> &ScanArgs {
        match self {
            Command::Count(args) | Command::Print(args) => args,
            Command::Delete(args) => &args.scan,
            Command::Dump(args) => &args.scan,
        }
    }
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        // Username requires password
        if self.username.is_some() && self.password.is_none() {
            return Err("--user requires --auth to be set".to_string());
        }

        match self.address.as_deref() {
            None => return Err("--address is required".to_string()),
            Some(address) => validate_address(address)?,
        }

        // A standalone node reached with -c stays in single-node mode, so a
        // silently dropped SELECT would run against database 0
        if self.cluster && self.dbnum.map_or(false, |db| db != 0) {
            return Err("--db cannot be combined with --cluster: cluster nodes only serve database 0".to_string());
        }

        if self.command.scan_args().batch == 0 {
            return Err("--batch must be at least 1".to_string());
        }

        if let Command::Delete(ref args) = self.command {
            if args.delete_batch == 0 {
                return Err("--delete-batch must be at least 1".to_string());
            }
        }

        Ok(())
    }
}

/// `host:port`, where host may be a bracketed IPv6 literal
fn validate_address(address: &str) -> Result<(), String> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| format!("--address must be host:port, got '{}'", address))?;
    if host.is_empty() {
        return Err(format!("--address is missing a host: '{}'", address));
    }
    port.parse::<u16>()
        .map_err(|_| format!("--address has an invalid port: '{}'", address))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_count_defaults() {
        let args = CliArgs::parse_from(["test", "-a", "localhost:6379", "count", "-p", "user:*"]);
        assert!(args.validate().is_ok());
        assert!(!args.cluster);
        let scan = args.command.scan_args();
        assert_eq!(scan.pattern, "user:*");
        assert_eq!(scan.batch, 1000);
        assert_eq!(Duration::from(scan.wait), Duration::ZERO);
        assert_eq!(Duration::from(args.connect_timeout), Duration::from_secs(5));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = CliArgs::parse_from([
            "test", "print", "-p", "*", "-a", "10.0.0.1:7000", "-c", "-w", "200ms",
        ]);
        assert_eq!(args.address.as_deref(), Some("10.0.0.1:7000"));
        assert!(args.cluster);
        assert_eq!(Duration::from(args.command.scan_args().wait), Duration::from_millis(200));
    }

    #[test]
    fn test_delete_args() {
        let args = CliArgs::parse_from([
            "test",
            "-a",
            "localhost:6379",
            "delete",
            "-p",
            "tmp:*",
            "--delete-batch",
            "100",
            "--unsafe-no-count",
            "--think-time",
            "1s",
        ]);
        match args.command {
            Command::Delete(ref delete) => {
                assert_eq!(delete.delete_batch, 100);
                assert!(delete.unsafe_no_count);
                assert_eq!(Duration::from(delete.think_time), Duration::from_secs(1));
                assert!(delete.log_dir.is_none());
            }
            ref other => panic!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn test_dump_args() {
        let args = CliArgs::parse_from([
            "test", "-a", "localhost:6379", "dump", "-p", "*", "--parallel", "8", "-o", "out.jsonl",
        ]);
        match args.command {
            Command::Dump(ref dump) => {
                assert_eq!(dump.parallel, 8);
                assert_eq!(dump.output, Some(PathBuf::from("out.jsonl")));
            }
            ref other => panic!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn test_pattern_is_required() {
        assert!(CliArgs::try_parse_from(["test", "-a", "localhost:6379", "count"]).is_err());
    }

    #[test]
    fn test_validation_user_without_auth() {
        let args =
            CliArgs::parse_from(["test", "-a", "localhost:6379", "--user", "admin", "count", "-p", "*"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_address() {
        let args = CliArgs::parse_from(["test", "count", "-p", "*"]);
        assert!(args.validate().unwrap_err().contains("--address"));

        assert!(validate_address("localhost:6379").is_ok());
        assert!(validate_address("[::1]:7000").is_ok());
        assert!(validate_address("localhost").is_err());
        assert!(validate_address(":6379").is_err());
        assert!(validate_address("host:notaport").is_err());
    }

    #[test]
    fn test_validation_db_with_cluster() {
        let args = CliArgs::parse_from(["test", "-a", "h:1", "-c", "--db", "3", "delete", "-p", "*"]);
        assert!(args.validate().unwrap_err().contains("--db"));

        let args = CliArgs::parse_from(["test", "-a", "h:1", "-c", "--db", "0", "count", "-p", "*"]);
        assert!(args.validate().is_ok());
        let args = CliArgs::parse_from(["test", "-a", "h:1", "--db", "3", "count", "-p", "*"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_batches() {
        let args = CliArgs::parse_from(["test", "-a", "h:1", "count", "-p", "*", "-b", "0"]);
        assert!(args.validate().is_err());
        let args = CliArgs::parse_from([
            "test", "-a", "h:1", "delete", "-p", "*", "--delete-batch", "0",
        ]);
        assert!(args.validate().is_err());
    }
}
