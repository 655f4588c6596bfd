//! # Configuration Management
//!
//! Harness settings are layered: built-in defaults, then an optional TOML
//! file, then `MESHVERIFY_*` environment variables (`__` separates nested
//! keys, e.g. `MESHVERIFY_WAIT__TIMEOUT_SECS=30`).

pub mod settings;

pub use settings::{
    CaptureSettings, ClusterKind, ClusterSettings, HarnessConfig, LoggingSettings, ProbeMode,
    ProbeSettings, WaitSettings,
};

use std::path::Path;

use crate::Result;

/// Environment variable naming an optional settings file
pub const CONFIG_FILE_ENV: &str = "MESHVERIFY_CONFIG";

const ENV_PREFIX: &str = "MESHVERIFY";

impl HarnessConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let env_file = std::env::var(CONFIG_FILE_ENV).ok().filter(|v| !v.is_empty());

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        } else if let Some(path) = env_file {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        let config: HarnessConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }
}
