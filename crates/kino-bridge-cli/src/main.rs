//! Kino Bridge CLI - Headless host for the video player bridge
//!
//! Features:
//! - Replays JSON-lines method call scripts against the plugin
//! - Simulated engines with configurable media and failures
//! - Prints call results and per-player events as text or JSON lines

use clap::{Parser, Subcommand};
use kino_bridge::PluginConfig;
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod output;
mod sim;

use output::{Output, OutputFormat};
use sim::SimulationConfig;

/// Kino Bridge CLI - Video player bridge harness
#[derive(Parser)]
#[command(name = "kino-bridge")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Drive the video player bridge from a script of host calls", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Log format on stderr (text, json)
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Plugin configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve method calls from a script (stdin when omitted)
    Run {
        /// JSON-lines script of method calls
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Simulated engine configuration file (JSON)
        #[arg(long)]
        simulation: Option<PathBuf>,

        /// Register the way legacy hosts do
        #[arg(long)]
        legacy: bool,

        /// Milliseconds to keep collecting events after the script ends
        #[arg(long, default_value = "200")]
        settle: u64,
    },

    /// Show the effective plugin configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries results, logs go to stderr
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    if cli.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    kino_bridge::init();

    let config = match &cli.config {
        Some(path) => PluginConfig::from_json_file(path)?,
        None => PluginConfig::default(),
    };
    let output = Output::new(OutputFormat::from(cli.format.as_str()));

    match cli.command {
        Commands::Run { script, simulation, legacy, settle } => {
            let simulation = match simulation {
                Some(path) => SimulationConfig::from_json_file(&path)?,
                None => SimulationConfig::default(),
            };
            let options = commands::RunOptions {
                script,
                simulation,
                legacy,
                settle: Duration::from_millis(settle),
            };
            commands::run(config, options, output).await?;
        }
        Commands::Config => {
            commands::show_config(&config, output)?;
        }
    }

    Ok(())
}
