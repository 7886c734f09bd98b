//! Handsoff CLI - unattended agent sessions.
//!
//! `handsoff hook` is installed as the agent's `PreToolUse` hook and answers
//! one permission request per invocation. `handsoff serve` runs the poll
//! loop that starts workers for ready issues. `handsoff workers` shows the
//! worker pool.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use handsoff_config::Config;
use handsoff_core::HandsoffHome;
use handsoff_server::Scheduler;
use handsoff_telemetry::{LogConfig, LogFormat, setup_logging};

mod commands;
mod theme;

use commands::{hook, serve, workers};

/// Handsoff - unattended agent sessions
#[derive(Parser)]
#[command(name = "handsoff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide one `PreToolUse` request read from stdin
    Hook,

    /// Run the poll loop and worker pool until interrupted
    Serve(serve::ServeArgs),

    /// Show the worker slot records
    Workers,
}

fn init_logging(config: &LogConfig) {
    if let Err(e) = setup_logging(config) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace = std::env::current_dir().ok();

    match cli.command {
        Commands::Hook => {
            // stdout carries the decision; logs go to stderr only.
            let level = if cli.verbose { "debug" } else { "warn" };
            init_logging(&LogConfig::for_hook(level));
            hook::run_hook(workspace.as_deref()).await?;
        },
        Commands::Serve(args) => {
            let home = HandsoffHome::resolve().context("failed to resolve state directory")?;
            let level = if cli.verbose { "debug" } else { "info" };
            let log_config = if args.stderr {
                LogConfig::new(level)
            } else {
                LogConfig::new(level).with_file_logging(home.logs_dir())
            };
            init_logging(&log_config.with_format(LogFormat::Compact));

            let mut config = Config::load(workspace.as_deref())
                .context("failed to load configuration")?
                .config;
            args.apply(&mut config);
            serve::run_serve(&config, &home, workspace.as_deref()).await?;
        },
        Commands::Workers => {
            let level = if cli.verbose { "debug" } else { "warn" };
            init_logging(&LogConfig::new(level));

            let home = HandsoffHome::resolve().context("failed to resolve state directory")?;
            let config = Config::load(workspace.as_deref())
                .context("failed to load configuration")?
                .config;
            let scheduler = Scheduler::new(home.workers_dir(), config.server.num_workers);
            workers::show_workers(&scheduler)?;
        },
    }

    Ok(())
}
