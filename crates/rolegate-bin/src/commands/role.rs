// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `select`, `clear-role` and `sign-out` commands.

use rolegate_core::types::SelectedRole;

use crate::cli::{Cli, OutputFormat, SelectArgs};
use crate::commands::status::render_snapshot;
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Selects an elevated role for the signed-in identity.
///
/// The selection is persisted and restored by later invocations while the
/// directory keeps permitting it.
pub async fn select(cli: &Cli, args: SelectArgs) -> BinResult<()> {
    let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
    runtime.start().await?;

    let role = SelectedRole::from(args.role);
    runtime.session().select_role(role)?;

    println!("Selected role: {}", role);
    if cli.verbose {
        println!("{}", render_snapshot(&runtime.session().snapshot(), OutputFormat::Text)?);
    }
    Ok(())
}

/// Clears the selected role.
pub async fn clear_role(cli: &Cli) -> BinResult<()> {
    let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
    runtime.start().await?;

    let previous = runtime.session().selected_role();
    runtime.session().select_role(SelectedRole::None)?;

    if previous.is_none() {
        println!("No role was selected");
    } else {
        println!("Cleared role: {}", previous);
    }
    Ok(())
}

/// Signs out and forgets the persisted role.
pub async fn sign_out(cli: &Cli) -> BinResult<()> {
    let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
    runtime.session().sign_out().await?;

    println!("Signed out");
    Ok(())
}
