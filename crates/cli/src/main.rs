//! pwsync command-line tool.
//!
//! Copies account passwords from a source Kerio `users.cfg` into a target
//! one, matching accounts by domain and name. Everything else in the target
//! file is left exactly as it was.

mod report;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pwsync_core::config::{SyncConfig, UnresolvedPolicy};
use pwsync_core::PasswordSync;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Copy account passwords from one users.cfg into another.
#[derive(Parser, Debug)]
#[command(
    name = "pwsync",
    version,
    about = "Copy account passwords from a source users.cfg into a target users.cfg"
)]
struct Cli {
    /// Source users.cfg file.
    #[arg(short, long, required_unless_present = "config")]
    source: Option<PathBuf>,

    /// Target users.cfg file, overwritten in place.
    #[arg(short, long, required_unless_present = "config")]
    target: Option<PathBuf>,

    /// Should skip the Admin user (default true).
    #[arg(
        short = 'a',
        long = "skip-admin",
        visible_alias = "skipAdmin",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    skip_admin: Option<bool>,

    /// TOML file with settings; command-line flags take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// What to do with target accounts that are missing from the source.
    #[arg(long, value_enum)]
    on_unresolved: Option<OnUnresolved>,

    /// Copy the target to a timestamped .bak file before overwriting it.
    #[arg(long)]
    backup: bool,

    /// Report what would change without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON.
    #[arg(long, conflicts_with = "list")]
    json: bool,

    /// Print a per-account table.
    #[arg(long)]
    list: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnUnresolved {
    /// Leave the password unchanged.
    Keep,
    /// Fail without writing anything.
    Abort,
}

impl From<OnUnresolved> for UnresolvedPolicy {
    fn from(value: OnUnresolved) -> Self {
        match value {
            OnUnresolved::Keep => UnresolvedPolicy::Keep,
            OnUnresolved::Abort => UnresolvedPolicy::Abort,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    config.validate().context("invalid configuration")?;

    if !cli.json {
        report::print_header(&config);
    }

    let result = PasswordSync::new(config)
        .run()
        .context("password sync failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("failed to encode report")?;
        println!("{}", json);
        return Ok(());
    }

    report::print_summary(&result);
    if cli.list {
        report::print_accounts(&result);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Merge the optional config file with command-line overrides.
fn build_config(cli: &Cli) -> Result<SyncConfig> {
    let mut config = match cli.config {
        Some(ref path) => {
            SyncConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => SyncConfig::new("", ""),
    };

    if let Some(ref source) = cli.source {
        config.source = source.clone();
    }
    if let Some(ref target) = cli.target {
        config.target = target.clone();
    }
    if let Some(skip_admin) = cli.skip_admin {
        config.skip_admin = skip_admin;
    }
    if let Some(policy) = cli.on_unresolved {
        config.on_unresolved = policy.into();
    }
    if cli.backup {
        config.backup = true;
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    debug!(?config, "effective configuration");
    Ok(config)
}
