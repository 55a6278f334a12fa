// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Helpers for running async integration tests with a timeout and an
//! isolated data directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use rolegate_session::FileStore;

// =============================================================================
// Test Harness
// =============================================================================

/// Configuration for the test harness.
#[derive(Debug, Clone)]
pub struct TestHarnessConfig {
    /// Name of the test (used for temp directories).
    pub test_name: String,

    /// Timeout for the entire test.
    pub timeout: Duration,
}

impl Default for TestHarnessConfig {
    fn default() -> Self {
        Self {
            test_name: "unknown_test".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TestHarnessConfig {
    /// Create a new config with a test name.
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            ..Default::default()
        }
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Resources provided by the test harness.
pub struct TestResources {
    /// Configuration used to create this harness.
    pub config: TestHarnessConfig,

    temp_dir: TempDir,
}

impl TestResources {
    /// Path of the test's temp directory.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A path inside the temp directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Opens a file store under `name` in the temp directory.
    pub fn file_store(&self, name: &str) -> Arc<FileStore> {
        Arc::new(FileStore::open(self.path(name)).expect("Failed to open file store"))
    }
}

/// Runs a test body with resources and a timeout.
///
/// # Example
///
/// ```rust,ignore
/// TestHarness::with_name("restore").run(|resources| async move {
///     let store = resources.file_store("durable");
///     // ...
/// }).await;
/// ```
pub struct TestHarness {
    config: TestHarnessConfig,
}

impl TestHarness {
    /// Create a harness from a config.
    pub fn new(config: TestHarnessConfig) -> Self {
        Self { config }
    }

    /// Create a harness with default settings.
    pub fn with_name(test_name: impl Into<String>) -> Self {
        Self::new(TestHarnessConfig::new(test_name))
    }

    /// Runs `test`, panicking if it exceeds the timeout.
    pub async fn run<F, Fut, T>(self, test: F) -> T
    where
        F: FnOnce(Arc<TestResources>) -> Fut,
        Fut: Future<Output = T>,
    {
        super::init_test_logging();

        let temp_dir = super::temp_test_dir(&format!("rolegate_{}_", self.config.test_name));
        let timeout = self.config.timeout;
        let resources = Arc::new(TestResources {
            config: self.config,
            temp_dir,
        });

        match tokio::time::timeout(timeout, test(resources)).await {
            Ok(value) => value,
            Err(_) => panic!("Test timed out after {:?}", timeout),
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Polls `condition` every 5ms until it holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Yields to the scheduler `times` times so spawned tasks make progress.
pub async fn settle(times: usize) {
    for _ in 0..times {
        tokio::task::yield_now().await;
    }
}
