// crates/pce-cli/src/main.rs
// ============================================================================
// Module: PCE CLI Entry Point
// Description: Command dispatcher for serving and configuration checks.
// Purpose: Provide a small, safe CLI around the engine server.
// Dependencies: clap, pce-config, pce-server, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `pce` binary serves the cognition engine over HTTP or validates a
//! configuration file offline. Logging is installed once at startup with an
//! environment-driven filter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use pce_config::PceConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "pce", version, about = "Persistent Cognition Engine")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the engine over HTTP.
    Serve {
        /// Path to a JSON config file; environment overrides still apply.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Resolve and validate configuration, then exit.
    CheckConfig {
        /// Path to a JSON config file; environment overrides still apply.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures surfaced to the operator.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration failed to resolve or validate.
    #[error("config error: {0}")]
    Config(#[from] pce_config::ConfigError),
    /// Server failed.
    #[error("server error: {0}")]
    Server(#[from] pce_server::ServerError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Process entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "fatal");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the parsed command.
async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve { config } => {
            let config = PceConfig::load(config.as_deref())?;
            pce_server::serve(config).await?;
            Ok(())
        }
        Command::CheckConfig { config } => {
            let config = PceConfig::load(config.as_deref())?;
            tracing::info!(
                api_port = config.api_port,
                state_db = %config.state_db_path.display(),
                "config ok"
            );
            Ok(())
        }
    }
}
