//! # Config Applier
//!
//! Submits rendered declarative config to the environment and blocks until the
//! environment reports every declared resource as in effect. Waiting is always
//! bounded: a store that never answers still yields a [`TimeoutError`].

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::errors::{ConfigError, TimeoutError};
use crate::template::{ConfigTemplate, ResolvedConfig, ResourceRef};
use crate::utils::poll_until;

/// Where declarative config is submitted and observed
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Submit every document of `config` into `namespace`.
    async fn submit(&self, namespace: &str, config: &ResolvedConfig) -> Result<(), ConfigError>;

    /// Whether `resource` is observably in effect. A resource the store does
    /// not know about yet is `Ok(false)`.
    async fn is_active(&self, namespace: &str, resource: &ResourceRef)
        -> Result<bool, ConfigError>;
}

/// Applies templates against a [`ConfigStore`] with a bounded propagation wait
pub struct ConfigApplier<'a> {
    store: &'a dyn ConfigStore,
    timeout: Duration,
    interval: Duration,
}

impl<'a> ConfigApplier<'a> {
    pub fn new(store: &'a dyn ConfigStore, timeout: Duration, interval: Duration) -> Self {
        Self { store, timeout, interval }
    }

    /// Resolve `template` and submit it. Unresolved placeholders fail here,
    /// before the store sees anything.
    #[instrument(skip(self, template), fields(template = %template.name()))]
    pub async fn apply(
        &self,
        namespace: &str,
        template: &ConfigTemplate,
    ) -> Result<ResolvedConfig, ConfigError> {
        let config = template.evaluate()?;
        self.store.submit(namespace, &config).await?;
        info!(resources = config.resources().len(), "Submitted config");
        Ok(config)
    }

    /// Wait until every resource of `config` is active, or the deadline passes.
    #[instrument(skip(self, config), fields(config = %config.name()))]
    pub async fn wait_for_active(
        &self,
        namespace: &str,
        config: &ResolvedConfig,
    ) -> Result<(), TimeoutError> {
        let store = self.store;
        let pending: Mutex<Option<String>> = Mutex::new(None);
        let pending_ref = &pending;

        let polled = poll_until(self.timeout, self.interval, config.name(), || async move {
            for resource in config.resources() {
                if !store.is_active(namespace, resource).await? {
                    *pending_ref.lock().unwrap_or_else(|e| e.into_inner()) =
                        Some(format!("{} not yet active", resource));
                    return Ok(false);
                }
            }
            Ok::<_, ConfigError>(true)
        })
        .await;

        match polled {
            Ok(()) => {
                info!("Config is active");
                Ok(())
            }
            Err(timeout) => {
                let waiting = pending.into_inner().unwrap_or_else(|e| e.into_inner());
                Err(TimeoutError::new(format!("wait for config '{}'", config.name()), self.timeout)
                    .with_observation(timeout.last_observation.or(waiting)))
            }
        }
    }
}
