//! # Command Line Interface
//!
//! `meshverify` runs catalog scenarios against a cluster, renders their
//! config, and inspects captured certificates offline.

pub mod config_cmd;
pub mod inspect;
pub mod output;
pub mod scenario_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::HarnessConfig;
use crate::observability::init_logging;

#[derive(Parser)]
#[command(name = "meshverify")]
#[command(about = "Service-mesh scenario verification harness")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML); defaults to $MESHVERIFY_CONFIG when set
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario; exits non-zero when it fails
    Run(scenario_cmd::RunArgs),

    /// List the scenario catalog
    List {
        /// Output format (json, yaml, or table)
        #[arg(short, long, default_value = "table", value_parser = ["json", "yaml", "table"])]
        output: String,
    },

    /// Print the resolved config documents of a scenario
    Render {
        /// Scenario name
        scenario: String,

        /// Application namespace to bind
        #[arg(long)]
        namespace: String,
    },

    /// Decode a captured certificate file
    Inspect(inspect::InspectArgs),

    /// Settings commands
    Config {
        #[command(subcommand)]
        command: config_cmd::ConfigCommands,
    },
}

/// Run CLI commands. Returns `false` when a check failed.
pub async fn run_cli() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let mut settings = HarnessConfig::load(cli.config.as_deref())?;
    initialise_logging(&mut settings, cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Run(args) => scenario_cmd::handle_run(args, settings).await,
        Commands::List { output } => {
            scenario_cmd::handle_list(&output)?;
            Ok(true)
        }
        Commands::Render { scenario, namespace } => {
            scenario_cmd::handle_render(&scenario, &namespace)?;
            Ok(true)
        }
        Commands::Inspect(args) => inspect::handle_inspect(args),
        Commands::Config { command } => {
            config_cmd::handle_config_command(command, &settings, cli.config.as_deref())?;
            Ok(true)
        }
    }
}

fn initialise_logging(settings: &mut HarnessConfig, verbose: bool, json: bool) {
    if verbose {
        settings.logging.level = "debug".to_string();
    }
    if json {
        settings.logging.json = true;
    }

    if init_logging(&settings.logging).is_err() {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }
}
