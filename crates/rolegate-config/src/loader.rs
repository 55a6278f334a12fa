// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for rolegate.
//!
//! # Loading Pipeline
//!
//! 1. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw file
//! 2. Parse YAML/TOML/JSON, chosen by file extension
//! 3. Apply `ROLEGATE_*` environment overrides
//! 4. Resolve the relative data directory against the config file location
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! ROLEGATE_DIRECTORY_BASE_URL=http://127.0.0.1:8080
//! ROLEGATE_DIRECTORY_CUSTOMER_ID=C01abc
//! ROLEGATE_RETRY_MAX_ATTEMPTS=5
//! ROLEGATE_IDENTITY_SUBJECT_ID=103582791432
//! ROLEGATE_IDENTITY_EMAIL=admin@example.com
//! ROLEGATE_DATA_DIR=/var/lib/rolegate
//! ROLEGATE_LOG_LEVEL=debug
//! ROLEGATE_LOG_FORMAT=json
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LogLevel, LoggingConfig, RolegateConfig};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for rolegate.
///
/// # Examples
///
/// ```no_run
/// use rolegate_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("rolegate.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "ROLEGATE".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is taken from the extension: `.yaml`/`.yml`, `.toml` or
    /// `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<RolegateConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config: RolegateConfig = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            self.resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        debug!(
            directory = %config.directory.base_url,
            data_dir = %config.storage.data_dir.display(),
            max_attempts = config.retry.max_attempts,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    ///
    /// Relative paths are left as written.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<RolegateConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: RolegateConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads only the `logging` section of a configuration file.
    ///
    /// Used to set up logging before the real load, so it emits nothing and
    /// skips validation. Returns `None` if the file cannot be read or parsed;
    /// the full [`ConfigLoader::load`] reports why.
    pub fn load_logging(&self, path: impl AsRef<Path>) -> Option<LoggingConfig> {
        #[derive(Deserialize)]
        struct LoggingSection {
            #[serde(default)]
            logging: LoggingConfig,
        }

        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok()?;
        let content = fs::read_to_string(path).ok()?;
        let content = if self.resolve_env_vars {
            self.substitute_env(&content, false)
        } else {
            content
        };

        let mut logging = parse_str::<LoggingSection>(&content, format).ok()?.logging;
        if self.resolve_env_vars {
            if let Some(level) = self.env_var("LOG_LEVEL").and_then(|(_, v)| LogLevel::parse(&v)) {
                logging.level = level;
            }
            if let Some(format) = self.env_var("LOG_FORMAT").and_then(|(_, v)| LogFormat::parse(&v)) {
                logging.format = format;
            }
        }
        Some(logging)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(&self, content: &str, format: ConfigFormat, path: &Path) -> ConfigResult<RolegateConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// Unknown variables without a default are kept verbatim.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        self.substitute_env(content, true)
    }

    fn substitute_env(&self, content: &str, report_missing: bool) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut placeholder = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                placeholder.push(c);
            }

            if !closed {
                result.push_str("${");
                result.push_str(&placeholder);
                continue;
            }

            let (name, default) = match placeholder.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (placeholder.as_str(), None),
            };

            match (env::var(name), default) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    if report_missing {
                        warn!(variable = name, "Environment variable not found");
                    }
                    result.push_str("${");
                    result.push_str(name);
                    result.push('}');
                }
            }
        }

        result
    }

    fn env_var(&self, suffix: &str) -> Option<(String, String)> {
        let name = format!("{}_{}", self.env_prefix, suffix);
        env::var(&name).ok().map(|value| (name, value))
    }

    fn apply_env_overrides(&self, config: &mut RolegateConfig) -> ConfigResult<()> {
        if let Some((_, value)) = self.env_var("DIRECTORY_BASE_URL") {
            config.directory.base_url = value;
        }
        if let Some((_, value)) = self.env_var("DIRECTORY_CUSTOMER_ID") {
            config.directory.customer_id = value;
        }
        if let Some((name, value)) = self.env_var("DIRECTORY_TIMEOUT_MS") {
            config.directory.request_timeout_ms = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected a number of milliseconds"))?;
        }

        if let Some((name, value)) = self.env_var("RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected a positive number"))?;
        }

        if let Some((_, value)) = self.env_var("IDENTITY_SUBJECT_ID") {
            config.identity.subject_id = value;
        }
        if let Some((_, value)) = self.env_var("IDENTITY_EMAIL") {
            config.identity.email = value;
        }

        if let Some((_, value)) = self.env_var("DATA_DIR") {
            config.storage.data_dir = PathBuf::from(value);
        }

        if let Some((name, value)) = self.env_var("LOG_LEVEL") {
            config.logging.level = LogLevel::parse(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected trace, debug, info, warn or error"))?;
        }
        if let Some((name, value)) = self.env_var("LOG_FORMAT") {
            config.logging.format = LogFormat::parse(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected text, json or compact"))?;
        }

        Ok(())
    }

    fn resolve_relative_paths(&self, config: &mut RolegateConfig, base_path: &Path) {
        if config.storage.data_dir.is_relative() {
            config.storage.data_dir = base_path.join(&config.storage.data_dir);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<RolegateConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<RolegateConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
