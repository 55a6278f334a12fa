// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use rolegate_config::RolegateConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Validates the configuration file and prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = rolegate_config::load_config(config_path)
        .map_err(|e| BinError::Configuration(format!("Configuration validation failed: {}", e)))?;

    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Directory:     {}", config.directory.base_url);
            println!("  Customer:      {}", config.directory.customer_id);
            println!("  Identity:      {}", config.identity.email);
            println!("  Data dir:      {}", config.storage.data_dir.display());
            println!("  Max attempts:  {}", config.retry.max_attempts);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "directory": config.directory.base_url,
                    "customer_id": config.directory.customer_id,
                    "identity": config.identity.email,
                    "data_dir": config.storage.data_dir.display().to_string(),
                    "max_attempts": config.retry.max_attempts,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("Failed to serialize result: {}", e)))?;
            println!("{}", json);
        }
    }

    Ok(())
}

/// Non-fatal findings about a valid configuration.
fn collect_warnings(config: &RolegateConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.identity.token_command.is_empty() {
        warnings.push("No identity.token_command configured; tokens will be prompted for".to_string());
    }

    if config.directory.base_url.trim().starts_with("http://") {
        warnings.push(format!(
            "Directory URL is not TLS-protected: {}",
            config.directory.base_url
        ));
    }

    if !config.storage.data_dir.exists() {
        warnings.push(format!(
            "Data directory does not exist yet and will be created: {}",
            config.storage.data_dir.display()
        ));
    }

    if config.retry.max_attempts == 1 {
        warnings.push("Retries are disabled (retry.max_attempts = 1)".to_string());
    }

    warnings
}
