//! valkey-keytool - enumerate, dump and bulk-delete keys on Valkey/Redis
//!
//! Works against a single node or fans out across every primary of a cluster.

use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use valkey_keytool::client::{Connector, UnifiedClient, MODE_MISMATCH_DELAY};
use valkey_keytool::commands::{count_keys, delete_keys, dump_keys, print_keys};
use valkey_keytool::config::{CliArgs, Operation, ToolConfig};
use valkey_keytool::confirm::ConfirmGate;
use valkey_keytool::scan::BatchPipeline;
use valkey_keytool::utils::CancelSignal;

/// Logs go to stderr; stdout carries only command output
fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse_args();
    setup_logging(args.verbose, args.quiet)?;

    let config = ToolConfig::from_cli(&args).map_err(anyhow::Error::msg)?;
    debug!("Running {} against {}", config.operation.name(), config.address);

    let cancel = CancelSignal::new();
    let connector: Arc<dyn Connector> = Arc::new(config.connection_factory());
    let client = UnifiedClient::connect(
        connector,
        &config.address,
        config.cluster_mode,
        &cancel,
        MODE_MISMATCH_DELAY,
    )
    .with_context(|| format!("connecting to {}", config.address))?;

    let pipeline = BatchPipeline::new(&client, config.scan.clone())?;

    match config.operation {
        Operation::Count => {
            count_keys(&pipeline, &cancel, &mut io::stdout())?;
        }
        Operation::Print => {
            print_keys(&pipeline, &cancel, io::stdout())?;
        }
        Operation::Delete(ref options) => {
            let mut gate = ConfirmGate::stdio(config.no_confirm);
            let report = delete_keys(&pipeline, options, &mut gate, &cancel)?;
            debug!("{:?}", report);
        }
        Operation::Dump {
            parallel,
            ref output,
        } => {
            let records = match output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    dump_keys(&pipeline, parallel, &cancel, BufWriter::new(file))?
                }
                None => dump_keys(&pipeline, parallel, &cancel, BufWriter::new(io::stdout()))?,
            };
            debug!("Dumped {} keys", records);
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(2);
    }
}
