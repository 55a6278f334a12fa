// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rolegate-bin
//!
//! Command-line front end for rolegate.
//!
//! This crate is the composition root. It provides:
//!
//! - CLI argument parsing with clap
//! - Session wiring (directory client, stores, retry policy)
//! - A command-backed identity provider
//! - Logging initialization
//! - Command implementations (status, select, watch, etc.)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └─────┬────┘ └──────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │  provider   │
//!                    └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Sign in, resolve eligibility and print the session
//! rolegate status
//!
//! # Select a role
//! rolegate select delegated-admin
//!
//! # Follow session events until Ctrl-C
//! rolegate watch
//!
//! # Validate configuration
//! rolegate -c /etc/rolegate/rolegate.yaml validate
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod provider;
pub mod runtime;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use provider::CommandIdentityProvider;
pub use runtime::{RuntimeBuilder, SessionRuntime};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
