// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session runtime wiring.
//!
//! This module is the composition root. It builds the one [`Session`] of
//! the process from configuration:
//!
//! - HTTP directory client
//! - Durable file store under `storage.data_dir`
//! - In-memory session store for the access token
//! - Exponential backoff with retries logged through `tracing`
//! - Command-line identity provider

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use rolegate_config::{load_config, RolegateConfig};
use rolegate_core::retry::{RetryObserver, RetryPolicy};
use rolegate_core::types::RoleEligibility;
use rolegate_directory::{DirectoryApi, HttpDirectoryClient};
use rolegate_session::{FileStore, IdentityProvider, MemoryStore, Session};

use crate::error::{BinError, BinResult};
use crate::provider::CommandIdentityProvider;

// =============================================================================
// SessionRuntime
// =============================================================================

/// A configured session ready to run commands against.
pub struct SessionRuntime {
    config: Arc<RolegateConfig>,
    session: Arc<Session>,
}

impl SessionRuntime {
    /// Returns the configuration.
    pub fn config(&self) -> &RolegateConfig {
        &self.config
    }

    /// Returns the session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Signs in and runs the first eligibility check.
    pub async fn start(&self) -> BinResult<RoleEligibility> {
        let identity = self.session.sign_in().await?;
        info!(email = %identity.email, "Resolving eligibility");

        let eligibility = self.session.refresh_eligibility().await;
        if !eligibility.is_verified() {
            warn!(outcome = %eligibility.outcome(), "Eligibility could not be verified");
        }
        Ok(eligibility)
    }
}

// =============================================================================
// TracingRetryObserver
// =============================================================================

/// Logs every scheduled directory retry.
#[derive(Debug, Default)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_retry(&self, attempt: u32, delay: Duration, error_type: &'static str) {
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_type,
            "Directory call failed, retrying"
        );
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the session runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<RolegateConfig>,
    provider: Option<Arc<dyn IdentityProvider>>,
    directory: Option<Arc<dyn DirectoryApi>>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: RolegateConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the command-line identity provider.
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replaces the HTTP directory client.
    pub fn directory(mut self, directory: Arc<dyn DirectoryApi>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<SessionRuntime> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => load_config(&path)?,
            (None, None) => return Err(BinError::config("No configuration provided")),
        };

        let directory: Arc<dyn DirectoryApi> = match self.directory {
            Some(directory) => directory,
            None => Arc::new(
                HttpDirectoryClient::new(&config.directory)
                    .map_err(|e| BinError::init(format!("Failed to create directory client: {}", e)))?,
            ),
        };

        let provider: Arc<dyn IdentityProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(CommandIdentityProvider::new(&config.identity)),
        };

        let durable = FileStore::open(&config.storage.data_dir).map_err(|e| {
            BinError::from(e).with_context(format!(
                "Failed to open data directory {}",
                config.storage.data_dir.display()
            ))
        })?;

        let retry = RetryPolicy::exponential(config.retry.clone()).with_observer(Arc::new(TracingRetryObserver));

        let session = Session::builder(provider, directory)
            .session_store(Arc::new(MemoryStore::new()))
            .durable_store(Arc::new(durable))
            .retry_policy(retry)
            .build();

        info!(
            session_id = %session.id(),
            directory = %config.directory.base_url,
            data_dir = %config.storage.data_dir.display(),
            "Session runtime ready"
        );

        Ok(SessionRuntime {
            config: Arc::new(config),
            session,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_config::IdentityConfig;
    use rolegate_core::types::SelectedRole;
    use rolegate_session::SELECTED_ROLE_KEY;
    use rolegate_session::KeyValueStore;

    fn config(data_dir: &std::path::Path) -> RolegateConfig {
        let mut config = RolegateConfig {
            identity: IdentityConfig {
                subject_id: "1234".into(),
                email: "admin@example.com".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.storage.data_dir = data_dir.to_path_buf();
        config
    }

    #[test]
    fn test_build_requires_config() {
        assert!(matches!(RuntimeBuilder::new().build(), Err(BinError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_build_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("state");

        let runtime = RuntimeBuilder::new().config(config(&data_dir)).build().unwrap();

        assert!(data_dir.is_dir());
        assert_eq!(runtime.config().identity.email, "admin@example.com");
        assert_eq!(runtime.session().selected_role(), SelectedRole::None);

        let store = FileStore::open(&data_dir).unwrap();
        assert_eq!(store.get(SELECTED_ROLE_KEY).unwrap(), None);
    }

    #[test]
    fn test_bad_directory_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.directory.base_url = "not a url".into();

        assert!(matches!(
            RuntimeBuilder::new().config(config).build(),
            Err(BinError::Initialization(_))
        ));
    }
}
