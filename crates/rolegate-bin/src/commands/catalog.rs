// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `catalog` command.

use rolegate_core::catalog::PrivilegeCatalog;

use crate::cli::{CatalogArgs, Cli, OutputFormat};
use crate::error::{BinError, BinResult};

/// Prints the privileges a delegated admin must hold.
pub fn catalog(_cli: &Cli, args: CatalogArgs) -> BinResult<()> {
    let catalog = PrivilegeCatalog::delegated_admin();

    match args.format {
        OutputFormat::Text => {
            println!("Delegated admin privileges ({}):", catalog.len());
            for privilege in catalog.iter() {
                println!("  {:<28} {}", privilege.name, privilege.service_scope);
            }
        }
        OutputFormat::Json => {
            let privileges: Vec<_> = catalog.iter().collect();
            let json = serde_json::to_string_pretty(&privileges)
                .map_err(|e| BinError::runtime(format!("Failed to serialize catalog: {}", e)))?;
            println!("{}", json);
        }
    }

    Ok(())
}
