// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rolegate-config
//!
//! Configuration management for rolegate.
//!
//! ## Configuration Schema
//!
//! - `directory` - Directory API endpoint, customer and request timeout
//! - `retry` - Backoff settings for directory calls
//! - `storage` - Data directory of the durable store
//! - `identity` - The signed-in identity and its token command
//! - `logging` - Log level and format
//!
//! ## Quick Start
//!
//! ```no_run
//! use rolegate_config::loader::load_config;
//!
//! let config = load_config("rolegate.yaml").unwrap();
//! println!("Directory: {}", config.directory.base_url);
//! ```
//!
//! Values may reference environment variables as `${VAR}` or
//! `${VAR:default}`, and `ROLEGATE_*` variables override individual fields.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use schema::{IdentityConfig, LogFormat, LogLevel, LoggingConfig, RolegateConfig, StorageConfig};
