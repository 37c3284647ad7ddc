//! CopyWay - Command-line interface for the transfer engine.
//!
//! Parses arguments, loads the per-protocol configuration, then drives one
//! transfer through validation and copy, printing the outcome to stdout.
//! Logs go to stderr.

use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::{CommandFactory, FromArgMatches, Parser};
use engine::{
    create_transfer, run_transfer, validate_transfer, ProtocolConfig, ProtocolRegistry,
    TransferError, TransferOptions, TransferOutcome, TransferRequest,
};
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// CopyWay - one copy command for local, SSH, SFTP and HDFS endpoints
#[derive(Parser, Debug)]
#[command(name = "copyway")]
#[command(version)]
#[command(about = "Copy files and directories over several transport protocols")]
#[command(after_help = "Examples:\n  \
    copyway -p local /data/src /data/dst\n  \
    copyway -p sftp --password secret file.txt user@host:/srv/\n  \
    copyway -p ssh --dry-run file.txt user@host:/srv/")]
struct Args {
    /// Transport protocol
    #[arg(short = 'p', long, value_name = "PROTOCOL")]
    protocol: String,

    /// Source path or endpoint
    source: String,

    /// Destination path or endpoint
    destination: String,

    /// YAML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate and show what would be copied, without copying
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// SSH/SFTP port
    #[arg(long)]
    port: Option<u16>,

    /// SSH/SFTP user
    #[arg(long)]
    user: Option<String>,

    /// SFTP password
    #[arg(long)]
    password: Option<String>,

    /// SSH/SFTP private key file
    #[arg(long, value_name = "PATH")]
    key_file: Option<PathBuf>,

    /// Compress the SSH/SFTP transport
    #[arg(long)]
    compress: bool,

    /// HDFS replication factor
    #[arg(long, value_name = "N")]
    replication: Option<u16>,

    /// Overwrite existing destination files (HDFS)
    #[arg(long)]
    overwrite: bool,

    /// HDFS permission mode, e.g. 755
    #[arg(long, value_name = "MODE")]
    permission: Option<String>,

    /// Preserve timestamps (local, default)
    #[arg(long, overrides_with = "no_preserve_metadata")]
    preserve_metadata: bool,

    /// Do not preserve timestamps (local)
    #[arg(long, overrides_with = "preserve_metadata")]
    no_preserve_metadata: bool,

    /// Copy what symlinks point to (local)
    #[arg(long)]
    follow_symlinks: bool,

    /// Show progress (default)
    #[arg(long, overrides_with = "no_progress")]
    progress: bool,

    /// Hide progress
    #[arg(long, overrides_with = "progress")]
    no_progress: bool,
}

impl Args {
    /// Options given on the command line. Unset flags stay `None` so the
    /// configuration file can supply them.
    fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            key_file: self.key_file.clone(),
            compress: self.compress.then_some(true),
            replication: self.replication,
            overwrite: self.overwrite.then_some(true),
            permission: self.permission.clone(),
            preserve_metadata: flag_pair(self.preserve_metadata, self.no_preserve_metadata),
            follow_symlinks: self.follow_symlinks.then_some(true),
            show_progress: flag_pair(self.progress, self.no_progress),
        }
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Parse the command line; `-p` accepts exactly the registered protocol names.
fn parse_args(registry: &ProtocolRegistry) -> Args {
    let names: Vec<String> = registry.list().into_iter().map(str::to_string).collect();
    let matches = Args::command()
        .mut_arg("protocol", |arg| arg.value_parser(PossibleValuesParser::new(names)))
        .get_matches();
    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

/// Log to stderr. `RUST_LOG` wins; otherwise warn, or debug with `-v`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let registry = ProtocolRegistry::with_builtins();
    let args = parse_args(&registry);
    init_logging(args.verbose);

    let exit_code = match run_cli(&args, &registry) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, registry: &ProtocolRegistry) -> Result<()> {
    let config = ProtocolConfig::load(args.config.as_deref())?;

    let request = TransferRequest::new(&args.protocol, &args.source, &args.destination)
        .with_options(args.transfer_options())
        .dry_run(args.dry_run);
    let mut transfer = create_transfer(registry, &config, request)?;

    println!("Validating...");
    validate_transfer(&mut transfer)?;
    println!("✓ Validation passed");

    match run_transfer(&mut transfer)? {
        TransferOutcome::Simulated(plan) => {
            println!();
            println!("{}", plan);
            println!();
            println!("✓ Dry-run completed. No files were copied.");
        }
        TransferOutcome::Copied => {
            println!("✓ Copy completed: {} -> {}", args.source, args.destination);
        }
    }
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<TransferError>() {
        Some(transfer_err) => {
            debug!(kind = %transfer_err.kind(), "transfer failed");
            eprintln!("✗ Error: {}", transfer_err);
        }
        None => {
            error!(error = ?err, "unexpected failure");
            eprintln!("✗ Unexpected error: {:#}", err);
        }
    }
}
