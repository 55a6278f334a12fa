// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `status`: Sign in, resolve eligibility and print the session
//! - `select` / `clear-role`: Change the selected role
//! - `sign-out`: Sign out and forget the persisted role
//! - `watch`: Follow session events until interrupted
//! - `catalog`: Print the delegated-admin privilege catalog
//! - `validate`: Validate configuration file
//! - `version`: Show version information

mod catalog;
mod role;
mod status;
mod validate;
mod version;
mod watch;

pub use catalog::catalog;
pub use role::{clear_role, select, sign_out};
pub use status::{render_snapshot, status};
pub use validate::validate;
pub use version::version;
pub use watch::{render_event, watch};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Status(args) => status::status(&cli, args).await,
        Commands::Select(args) => role::select(&cli, args).await,
        Commands::ClearRole => role::clear_role(&cli).await,
        Commands::SignOut => role::sign_out(&cli).await,
        Commands::Watch(args) => watch::watch(&cli, args).await,
        Commands::Catalog(args) => catalog::catalog(&cli, args),
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}
