//! `run`, `list` and `render`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;

use super::output::{self, OutputFormat};
use crate::config::{ClusterKind, HarnessConfig, ProbeMode};
use crate::environment::{Cluster, Environment, FakeCluster, KeyAlgorithm};
use crate::observability::log_config_info;
use crate::scenario::{ScenarioReport, StepOutcome};
use crate::scenarios::{self, CatalogEntry};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario name (see `meshverify list`)
    pub scenario: String,

    /// Application namespace override
    #[arg(long)]
    pub namespace: Option<String>,

    /// Kubeconfig override
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Run against the in-memory cluster
    #[arg(long)]
    pub fake: bool,

    /// Workload key algorithm served by the in-memory cluster
    #[arg(long, default_value = "ecdsa", value_parser = ["ecdsa", "ed25519"])]
    pub fake_key: String,

    /// Issue probe calls from this process instead of the source pod
    #[arg(long)]
    pub direct: bool,

    /// Output format (json, yaml, or table)
    #[arg(short, long, default_value = "table", value_parser = ["json", "yaml", "table"])]
    pub output: String,
}

fn lookup(name: &str) -> Result<&'static CatalogEntry> {
    scenarios::find(name)
        .with_context(|| format!("Unknown scenario '{}'; run `meshverify list`", name))
}

/// Run a catalog scenario and print its report
pub async fn handle_run(args: RunArgs, mut settings: HarnessConfig) -> Result<bool> {
    let entry = lookup(&args.scenario)?;
    let format: OutputFormat = args.output.parse()?;

    if let Some(namespace) = args.namespace {
        settings.namespace = namespace;
    }
    if let Some(kubeconfig) = args.kubeconfig {
        settings.cluster.kubeconfig = Some(kubeconfig);
    }
    if args.fake {
        settings.cluster.kind = ClusterKind::Fake;
    }
    if args.direct {
        settings.probe.mode = ProbeMode::Direct;
    }
    settings.validate()?;
    log_config_info(&settings);

    let env = match settings.cluster.kind {
        ClusterKind::Fake => {
            let key = match args.fake_key.as_str() {
                "ed25519" => KeyAlgorithm::Ed25519,
                _ => KeyAlgorithm::Ecdsa,
            };
            let cluster = FakeCluster::with_mesh_defaults(&settings.namespace, key)
                .context("Failed to issue fake workload certificate")?;
            Environment::new(Cluster::Fake(cluster), settings)?
        }
        ClusterKind::Kube => Environment::from_config(settings)?,
    };

    let mut scenario = entry.build(env.namespace());
    let outcome = scenario.run(&env).await;
    let report = scenario.report().cloned().context("Scenario produced no report")?;

    output::print_with(&report, format, print_report)?;

    match outcome {
        Ok(_) => {
            output::print_verdict(format, true, &report.scenario);
            Ok(true)
        }
        Err(e) => {
            output::print_verdict(format, false, e);
            Ok(false)
        }
    }
}

fn print_report(report: &ScenarioReport) {
    println!();
    println!(
        "{} {}  run {}",
        report.scenario.bold(),
        report.feature.as_deref().map(|f| format!("({})", f)).unwrap_or_default(),
        report.run_id
    );
    println!("{:<4} {:<56} {:<8} {:>8}", "#", "Step", "Result", "Time");
    output::print_separator(80);

    for step in &report.steps {
        let outcome = match step.outcome {
            StepOutcome::Passed => "passed".green().to_string(),
            StepOutcome::Failed => "failed".red().to_string(),
            StepOutcome::NotRun => "-".dimmed().to_string(),
        };
        println!(
            "{:<4} {:<56} {:<8} {:>6}ms",
            step.index,
            output::truncate(&step.name, 56),
            outcome,
            step.duration_ms
        );
        if let Some(error) = &step.error {
            println!("     {}", error.red());
        }
    }
    println!();
}

/// Print the scenario catalog
pub fn handle_list(output_format: &str) -> Result<()> {
    let format: OutputFormat = output_format.parse()?;
    output::print_with(&scenarios::catalog(), format, |entries| {
        println!();
        println!("{:<20} {:<42} {}", "Name", "Feature", "Description");
        output::print_separator(100);
        for entry in entries.iter() {
            println!("{:<20} {:<42} {}", entry.name, entry.feature, entry.description);
        }
        println!();
    })
}

/// Print the resolved config documents of a scenario, in apply order
pub fn handle_render(name: &str, namespace: &str) -> Result<()> {
    let entry = lookup(name)?;
    for template in entry.templates(namespace) {
        let config = template
            .evaluate()
            .with_context(|| format!("Failed to render '{}'", template.name()))?;
        println!("---");
        println!("# {}", config.name());
        print!("{}", config.yaml().trim_start_matches('\n'));
    }
    Ok(())
}
