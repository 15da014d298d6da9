//! Helpdesk CLI
//!
//! Operator interface for the ticket routing engine.
//!
//! # Usage
//!
//! ```bash
//! helpdesk roster
//! helpdesk route --category billing --priority urgent
//! helpdesk simulate --tickets 500 --seed 7 --format json
//! helpdesk simulate --analytics --export resolved
//! helpdesk config init
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use helpdesk_routing::{Category, ExportFilter, Priority};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(version)]
#[command(about = "Helpdesk ticket routing operator CLI", long_about = None)]
struct Cli {
    /// Engine configuration file
    #[arg(long, short, env = "HELPDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show agents and their current workload
    Roster,
    /// Dry-run the routing policy for one ticket
    Route {
        #[arg(long)]
        category: Category,
        #[arg(long)]
        priority: Priority,
    },
    /// Push a burst of random tickets through an in-memory engine
    Simulate {
        #[arg(long, default_value_t = 100)]
        tickets: usize,
        /// Seed for ticket generation and tie-breaks
        #[arg(long)]
        seed: Option<u64>,
        /// Report per-agent performance and recent activity
        #[arg(long)]
        analytics: bool,
        /// Export tickets afterwards: all, active or resolved
        #[arg(long, value_name = "FILTER")]
        export: Option<ExportFilter>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = config::resolve_path(cli.config)?;
    match cli.command {
        Commands::Roster => commands::roster::handle(&path, cli.format).await,
        Commands::Route { category, priority } => commands::route::handle(&path, category, priority, cli.format).await,
        Commands::Simulate { tickets, seed, analytics, export } => {
            let extras = commands::simulate::Extras { analytics, export };
            commands::simulate::handle(&path, tickets, seed, extras, cli.format).await
        }
        Commands::Config { action } => commands::config::handle(action, &path, cli.format).await,
    }
}
