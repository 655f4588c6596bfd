//! Shared output formatting for CLI commands
//!
//! JSON and YAML are generic over `Serialize`; table output is rendered per
//! command.

use std::str::FromStr;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            _ => anyhow::bail!("Unsupported output format: '{}'. Use 'json', 'yaml', or 'table'.", s),
        }
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    print!("{}", yaml);
    Ok(())
}

/// Print structured output; `Table` is handled by `table`
pub fn print_with<T: Serialize>(data: &T, format: OutputFormat, table: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Yaml => print_yaml(data),
        OutputFormat::Table => {
            table(data);
            Ok(())
        }
    }
}

/// Coloured PASS/FAIL marker
pub fn verdict(passed: bool) -> String {
    if passed {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    }
}

/// Print a verdict line after a report.
///
/// Only table output carries a passing verdict on stdout; structured output
/// keeps stdout to the serialized document.
pub fn print_verdict(format: OutputFormat, passed: bool, detail: impl std::fmt::Display) {
    if passed && format == OutputFormat::Table {
        println!("{} {}", verdict(true), detail);
    } else {
        eprintln!("{} {}", verdict(passed), detail);
    }
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a horizontal separator line
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}
