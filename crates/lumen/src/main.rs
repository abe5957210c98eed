//! Lumen CLI - Fallback-aware batch image transcoder.
//!
//! Lumen converts batches of images into a chosen output format through a
//! runtime-probed encoder: unsupported formats fall back along a fixed
//! chain, silent substitutions are verified away, and every accepted input
//! yields either an artifact or a readable failure.
//!
//! # Usage
//!
//! ```bash
//! # Convert a directory of images to webp
//! lumen convert ./photos/ --format webp --out ./converted
//!
//! # See which output formats the encoder honors
//! lumen formats
//!
//! # View configuration
//! lumen config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Lumen - Fallback-aware batch image transcoder.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert images to a target format
    Convert(cli::convert::ConvertArgs),

    /// Show which output formats the encoder supports
    Formats(cli::formats::FormatsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI overrides.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match lumen_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `lumen config path`."
            );
            lumen_core::Config::default()
        }
    };
    logging::init(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Lumen v{}", lumen_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Convert(args) => cli::convert::execute(args, config).await,
        Commands::Formats(args) => cli::formats::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
