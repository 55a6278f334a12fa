// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for rolegate.
//!
//! ```yaml
//! directory:
//!   base_url: https://admin.googleapis.com
//!   customer_id: my_customer
//!   request_timeout_ms: 30000
//!
//! retry:
//!   max_attempts: 3
//!   base_delay: 1000
//!   max_jitter: 1000
//!
//! storage:
//!   data_dir: ./data
//!
//! identity:
//!   subject_id: "103582791432"
//!   email: admin@example.com
//!   display_name: Example Admin
//!   token_command: ["gcloud", "auth", "print-access-token"]
//!
//! logging:
//!   level: info
//!   format: text
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use rolegate_core::retry::RetryConfig;
use rolegate_core::types::Identity;
use rolegate_directory::HttpDirectoryConfig;

use crate::error::{ConfigError, ConfigResult};

/// Upper bound accepted for `retry.max_attempts`.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

// =============================================================================
// Root Configuration
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolegateConfig {
    /// Directory API settings.
    #[serde(default)]
    pub directory: HttpDirectoryConfig,

    /// Retry settings for directory calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Durable storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Identity settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RolegateConfig {
    /// Validates the whole configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_directory()?;
        self.validate_retry()?;
        self.storage.validate()?;
        self.identity.validate()?;
        Ok(())
    }

    fn validate_directory(&self) -> ConfigResult<()> {
        let base_url = self.directory.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::validation(
                "directory.base_url",
                "must be an http:// or https:// URL",
            ));
        }
        if self.directory.customer_id.trim().is_empty() {
            return Err(ConfigError::validation("directory.customer_id", "cannot be empty"));
        }
        if self.directory.request_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "directory.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn validate_retry(&self) -> ConfigResult<()> {
        if !(1..=MAX_RETRY_ATTEMPTS).contains(&self.retry.max_attempts) {
            return Err(ConfigError::validation(
                "retry.max_attempts",
                format!("must be between 1 and {}", MAX_RETRY_ATTEMPTS),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::validation(
                "retry.max_delay",
                "cannot be smaller than retry.base_delay",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Durable storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted role selection.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Default data directory.
pub fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl StorageConfig {
    /// Validates the storage configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("storage.data_dir", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// =============================================================================
// Identity Configuration
// =============================================================================

/// The identity the command-line provider signs in as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Directory subject identifier (or primary email) used as user key.
    #[serde(default)]
    pub subject_id: String,

    /// Primary email address.
    #[serde(default)]
    pub email: String,

    /// Display name; defaults to the email.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Command printing a fresh access token on stdout.
    #[serde(default)]
    pub token_command: Vec<String>,
}

impl IdentityConfig {
    /// Validates the identity configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.subject_id.trim().is_empty() {
            return Err(ConfigError::validation("identity.subject_id", "cannot be empty"));
        }
        if !self.email.contains('@') {
            return Err(ConfigError::validation("identity.email", "must be an email address"));
        }
        if self.token_command.first().is_some_and(|program| program.trim().is_empty()) {
            return Err(ConfigError::validation(
                "identity.token_command",
                "program name cannot be empty",
            ));
        }
        Ok(())
    }

    /// Builds the [`Identity`] described by this section.
    pub fn to_identity(&self) -> Identity {
        let display_name = self
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.clone());

        Identity::new(&self.subject_id, &self.email, display_name)
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Structured JSON.
    Json,
    /// Compact single-line text.
    Compact,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }

    /// Parses a format name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
