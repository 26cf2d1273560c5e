//! Clap derive structures for the `domestia` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// domestia -- Domestia lighting controller to MQTT bridge
#[derive(Debug, Parser)]
#[command(
    name = "domestia",
    version,
    about = "Bridge a Domestia lighting controller to Home Assistant over MQTT",
    long_about = "Polls a Domestia lighting controller, publishes light state to an MQTT\n\
        broker using Home Assistant's JSON light schema, and applies light\n\
        commands received from the broker.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file (.json or .toml)
    #[arg(long, short = 'c', env = "DOMESTIA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run,

    /// Query the controller once and print every configured light
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
