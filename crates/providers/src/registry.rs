//! Backend registry.
//!
//! Builds one back end per platform at startup. Credentials are read from
//! the environment here; a back end that cannot start is logged and left
//! out, and asking on its platform fails with a config error.

use crate::openai_compat::OpenAiCompatProvider;
use crate::spark::SparkProvider;
use crate::traits::ChatBackend;
use cb_domain::config::Config;
use cb_domain::error::{Error, Result};
use cb_domain::Platform;
use std::collections::HashMap;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BackendRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds the back end serving each platform.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<Platform, Arc<dyn ChatBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every back end the config describes.
    ///
    /// Back ends that fail to initialize (usually missing credentials) are
    /// logged and skipped rather than aborting startup.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        for platform in Platform::ALL {
            let result: Result<Arc<dyn ChatBackend>> = match platform {
                Platform::ChatGpt => OpenAiCompatProvider::from_config(&config.openai)
                    .map(|b| Arc::new(b) as Arc<dyn ChatBackend>),
                Platform::XunFei => SparkProvider::from_config(&config.spark)
                    .map(|b| Arc::new(b) as Arc<dyn ChatBackend>),
            };

            match result {
                Ok(backend) => {
                    tracing::info!(
                        platform = %platform,
                        backend_id = backend.backend_id(),
                        streaming = backend.streaming(),
                        "registered chat backend"
                    );
                    registry.backends.insert(platform, backend);
                }
                Err(e) => {
                    tracing::warn!(
                        platform = %platform,
                        error = %e,
                        "failed to initialize chat backend, skipping"
                    );
                }
            }
        }

        if registry.backends.is_empty() {
            tracing::warn!("no chat backends initialized; every turn will fail until credentials are set");
        }
        registry
    }

    /// Register (or replace) the back end for `platform`.
    pub fn with_backend(mut self, platform: Platform, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.insert(platform, backend);
        self
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn ChatBackend>> {
        self.backends.get(&platform).cloned().ok_or_else(|| {
            Error::Config(format!("no backend configured for platform '{platform}'"))
        })
    }

    /// Platforms with a registered back end, in declaration order.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.backends.contains_key(p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
