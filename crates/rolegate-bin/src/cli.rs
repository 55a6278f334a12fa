// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `status`: Sign in, resolve eligibility and print the session (default)
//! - `select`: Select an elevated role
//! - `clear-role`: Drop back to the unelevated session
//! - `sign-out`: Sign out and forget the persisted role
//! - `watch`: Follow session events until interrupted
//! - `catalog`: Print the delegated-admin privilege catalog
//! - `validate`: Validate the configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use rolegate_config::{ConfigLoader, LogFormat};
use rolegate_core::types::SelectedRole;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// rolegate - delegated-admin authorization engine
///
/// Decides whether the signed-in user may act as a super admin or a
/// delegated admin, and tracks the role they selected.
#[derive(Parser, Debug)]
#[command(
    name = "rolegate",
    author = "Sylvex <contact@sylvex.io>",
    version = rolegate_core::VERSION,
    about = "Delegated-admin authorization engine",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "rolegate.yaml",
        env = "ROLEGATE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); overrides the config file
    #[arg(long, global = true, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in, resolve eligibility and print the session
    ///
    /// This is the default command when no subcommand is specified.
    Status(StatusArgs),

    /// Select an elevated role
    ///
    /// The role must be permitted by a verified eligibility check.
    Select(SelectArgs),

    /// Clear the selected role
    #[command(name = "clear-role")]
    ClearRole,

    /// Sign out and forget the persisted role
    #[command(name = "sign-out")]
    SignOut,

    /// Follow session events until interrupted
    ///
    /// Keeps the eligibility watcher running and recomputes on a fixed
    /// interval.
    Watch(WatchArgs),

    /// Print the privileges a delegated admin must hold
    Catalog(CatalogArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `status` command.
#[derive(Args, Debug, Default, Clone)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `select` command.
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// Role to select
    pub role: RoleArg,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Seconds between periodic recomputations (0 disables them)
    #[arg(short, long, default_value = "300")]
    pub interval: u64,

    /// Output format for events
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `catalog` command.
#[derive(Args, Debug, Default, Clone)]
pub struct CatalogArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Roles accepted by `select`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoleArg {
    /// Super administrator
    SuperAdmin,
    /// Delegated administrator
    DelegatedAdmin,
}

impl From<RoleArg> for SelectedRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::SuperAdmin => SelectedRole::SuperAdmin,
            RoleArg::DelegatedAdmin => SelectedRole::DelegatedAdmin,
        }
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format '{}' (text, json, compact)", value))
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Status` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Status(StatusArgs::default()))
    }

    /// Resolves the log level and format.
    ///
    /// Flags win over the config file's `logging` section, which wins over
    /// the defaults. Only that section is read here; the command loads and
    /// validates the whole file once logging is up.
    pub fn logging_settings(&self) -> (String, LogFormat) {
        let configured = ConfigLoader::new().load_logging(&self.config);

        let level = if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .or_else(|| configured.as_ref().map(|l| l.level.as_str().to_string()))
                .unwrap_or_else(|| "info".to_string())
        };

        let format = self
            .log_format
            .or_else(|| configured.map(|l| l.format))
            .unwrap_or_default();

        (level, format)
    }
}

// =============================================================================
// Tests
// =============================================================================
