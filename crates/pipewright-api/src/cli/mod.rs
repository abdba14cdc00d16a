//! CLI command definitions for the `pipewright` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Execute HTTP workflow DAGs.
#[derive(Parser)]
#[command(name = "pipewright", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Engine configuration file.
    #[arg(
        long,
        global = true,
        env = "PIPEWRIGHT_CONFIG",
        default_value = "pipewright.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on (overrides the config file).
        #[arg(long, short, env = "PIPEWRIGHT_PORT")]
        port: Option<u16>,

        /// Host to bind to (overrides the config file).
        #[arg(long, env = "PIPEWRIGHT_HOST")]
        host: Option<String>,
    },

    /// Execute a workflow payload locally.
    Run {
        /// Path to the JSON payload.
        file: PathBuf,
    },

    /// Check a workflow payload without running it.
    Validate {
        /// Path to the JSON payload.
        file: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Read and decode a JSON payload file.
pub async fn read_payload(path: &std::path::Path) -> anyhow::Result<serde_json::Value> {
    use anyhow::Context;

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}
