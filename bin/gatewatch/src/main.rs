mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gatewatch")]
#[command(about = "Realtime event core for an agent gateway dashboard", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show paths and the effective configuration
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run bridge, feed and consumer in-process with synthetic activity
    Simulate {
        /// Number of activities to produce
        #[arg(short, long, default_value_t = 5)]
        events: usize,
    },

    /// Send one action request through the dispatcher
    Dispatch {
        /// Request body, e.g. '{"type":"ping","requestId":"r1"}'
        request: String,

        /// JSON array of activities to preload (defaults to ~/.gatewatch/activities.json)
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_cmd::show().await?,
            ConfigCommands::Init { force } => commands::config_cmd::init(force).await?,
        },
        Commands::Simulate { events } => {
            commands::simulate::run(events).await?;
        }
        Commands::Dispatch { request, seed } => {
            commands::dispatch::run(&request, seed).await?;
        }
    }

    Ok(())
}
