// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! rolegate - delegated-admin authorization engine
//!
//! Main binary entry point.

use rolegate_bin::cli::Cli;
use rolegate_bin::error::report_error_and_exit;
use rolegate_bin::{commands, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let (level, format) = cli.logging_settings();
    logging::init_logging(&level, format);

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
