//! SWITCHYARD CLI
//!
//! Offline tooling around an orchestrator configuration: validation,
//! phase plans for templates and dry-run routing of single tasks.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod commands;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "SWITCHYARD - Capability based task routing and workflow orchestration", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file for consistency
    Validate {
        /// Path to a .toml or .json config
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List workflow templates
    Templates {
        /// Path to a .toml or .json config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the phase plan of a template and the worker each role routes to
    Plan {
        /// Template name
        #[arg(short, long)]
        template: String,
        /// Path to a .toml or .json config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Route a single task without executing it
    Route {
        /// Task type
        #[arg(short = 't', long = "type")]
        task_type: String,
        /// Task payload as JSON
        #[arg(short, long)]
        payload: String,
        /// Task priority (low, medium, high, critical)
        #[arg(long)]
        priority: Option<String>,
        /// Path to a .toml or .json config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("switchyard=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let output = match cli.command {
        Commands::Validate { config } => commands::validate(&config),
        Commands::Templates { config } => commands::templates(config.as_deref()),
        Commands::Plan { template, config } => commands::plan(&template, config.as_deref()).await,
        Commands::Route {
            task_type,
            payload,
            priority,
            config,
        } => commands::route(&task_type, &payload, priority.as_deref(), config.as_deref()).await,
    }
    .map_err(|e| eyre!("{:#}", e))?;

    println!("{}", output);
    Ok(())
}
