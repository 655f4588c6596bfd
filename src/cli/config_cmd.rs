//! Settings CLI commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use super::output;
use crate::config::{HarnessConfig, CONFIG_FILE_ENV};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings (defaults, file and environment merged)
    Show {
        /// Output format (toml, json, or yaml)
        #[arg(short, long, default_value = "toml", value_parser = ["toml", "json", "yaml"])]
        output: String,
    },

    /// Write a settings file with default values
    Init {
        /// Destination file
        #[arg(default_value = "meshverify.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show which settings file is in use
    Path,
}

/// Handle config commands
pub fn handle_config_command(
    command: ConfigCommands,
    settings: &HarnessConfig,
    file: Option<&Path>,
) -> Result<()> {
    match command {
        ConfigCommands::Show { output } => match output.as_str() {
            "json" => output::print_json(settings)?,
            "yaml" => output::print_yaml(settings)?,
            _ => print!("{}", to_toml(settings)?),
        },
        ConfigCommands::Init { path, force } => init_config(&path, force)?,
        ConfigCommands::Path => {
            let from_env = std::env::var(CONFIG_FILE_ENV).ok().filter(|v| !v.is_empty());
            match file.map(|p| p.display().to_string()).or(from_env) {
                Some(path) => println!("{}", path),
                None => println!("No settings file; using defaults and MESHVERIFY_* variables"),
            }
        }
    }
    Ok(())
}

fn to_toml(settings: &HarnessConfig) -> Result<String> {
    toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Settings file already exists at: {}\nUse --force to overwrite",
            path.display()
        );
    }

    std::fs::write(path, to_toml(&HarnessConfig::default())?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Settings file created at: {}", path.display());
    println!("Use it with: meshverify --config {} run <scenario>", path.display());
    Ok(())
}
