//! # meshverify
//!
//! Scenario verification harness for service-mesh integration checks.
//! A scenario applies templated mesh policy, waits for it to take effect,
//! probes a service, captures the certificate a sidecar proxy was presented,
//! and asserts structural properties of that certificate.
//!
//! ## Architecture
//!
//! ```text
//! Scenario Runner ──> Config Applier ──> ConfigStore ─┐
//!        │        ──> Probe Executor ──> ProbeTransport ├─> Cluster (Kube | Fake)
//!        │        ──> capture        ──> ArtifactCapturer┘
//!        └──────────> Property Checker (decode, assert)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshverify::environment::{Environment, FakeCluster, KeyAlgorithm};
//! use meshverify::scenarios;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cluster = FakeCluster::with_mesh_defaults("echo", KeyAlgorithm::Ecdsa)?;
//!     let env = Environment::fake(cluster, "echo");
//!     let mut scenario = scenarios::ecc_strict_mtls::scenario(env.namespace());
//!     let report = scenario.run(&env).await?;
//!     assert!(report.passed());
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod certificate;
pub mod cli;
pub mod config;
pub mod environment;
pub mod errors;
pub mod observability;
pub mod probe;
pub mod scenario;
pub mod scenarios;
pub mod template;
pub mod utils;

// Re-export commonly used types and traits
pub use config::HarnessConfig;
pub use environment::{Cluster, Environment};
pub use errors::{Error, Result};
pub use observability::init_logging;
pub use scenario::{Scenario, ScenarioReport, ScenarioState};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
