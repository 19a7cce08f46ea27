//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod graph;
pub mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "plugin-status")]
#[command(version)]
#[command(about = "Dependency-aware plugin status aggregation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a dependency graph file and print its structure
    Graph {
        /// JSON file mapping each plugin to its direct dependencies
        file: PathBuf,
        /// Print the structure as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay a timed status scenario and print every published run
    Simulate {
        /// JSON scenario file (graph, events, optional lock_after_ms)
        file: PathBuf,
        /// Override the core debounce window
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Override the propagation batch window
        #[arg(long)]
        batch_ms: Option<u64>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check configuration for errors and warnings
    Check,
    /// Print the effective configuration (file plus environment overrides)
    Show,
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<()> {
    // Logging only: fall back to defaults if the config cannot be loaded.
    // Commands that depend on config load it again and fail loudly.
    let logging = plugin_status::Config::load()
        .map(|config| config.logging)
        .unwrap_or_default();
    if let Err(e) = plugin_status::utils::logging::init_logging(&logging) {
        eprintln!("warning: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Graph { file, json }) => {
            graph::cmd_graph(&file, json)?;
        }
        Some(Commands::Simulate {
            file,
            debounce_ms,
            batch_ms,
        }) => {
            let config =
                plugin_status::Config::load().context("Failed to load configuration")?;
            let mut engine = config.engine;
            if let Some(ms) = debounce_ms {
                engine.debounce_ms = ms;
            }
            if let Some(ms) = batch_ms {
                engine.batch_ms = ms;
            }
            simulate::cmd_simulate(&file, &engine).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action)?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("plugin-status {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Dependency-aware plugin status aggregation");
}
