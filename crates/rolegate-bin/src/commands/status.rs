// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `status` command.

use std::fmt::Write;

use rolegate_session::SessionSnapshot;

use crate::cli::{Cli, OutputFormat, StatusArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::RuntimeBuilder;

/// Signs in, resolves eligibility and prints the session.
pub async fn status(cli: &Cli, args: StatusArgs) -> BinResult<()> {
    let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
    runtime.start().await?;

    println!("{}", render_snapshot(&runtime.session().snapshot(), args.format)?);
    Ok(())
}

/// Renders a session snapshot for the terminal.
pub fn render_snapshot(snapshot: &SessionSnapshot, format: OutputFormat) -> BinResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot)
            .map_err(|e| BinError::runtime(format!("Failed to serialize session: {}", e))),
        OutputFormat::Text => Ok(render_text(snapshot)),
    }
}

fn render_text(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let eligibility = &snapshot.eligibility;

    let _ = writeln!(out, "Session {}", snapshot.session_id);
    match &snapshot.identity {
        Some(identity) => {
            let _ = writeln!(out, "  Identity:       {} <{}>", identity.display_name, identity.email);
        }
        None => {
            let _ = writeln!(out, "  Identity:       (signed out)");
        }
    }
    let _ = writeln!(out, "  Phase:          {}", snapshot.phase.as_str());
    let _ = writeln!(out, "  Selected role:  {}", snapshot.selected_role);
    let _ = writeln!(out, "  Check outcome:  {}", eligibility.outcome());
    let _ = writeln!(out, "  Super admin:    {}", yes_no(eligibility.is_super_admin()));
    let _ = writeln!(out, "  Delegated:      {}", yes_no(eligibility.is_delegated_admin()));

    if let Some(age) = snapshot.credential_age_secs {
        let _ = writeln!(out, "  Token age:      {}s", age);
    }
    let _ = writeln!(
        out,
        "  Directory ops:  {} ({} retried, {} exhausted)",
        snapshot.retry.total_operations, snapshot.retry.total_retries, snapshot.retry.exhausted
    );

    if snapshot.changing_role {
        let _ = writeln!(out, "  Role change in progress");
    }

    let missing = eligibility.missing_privileges();
    if !missing.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Missing privileges:");
        for privilege in missing {
            let _ = writeln!(out, "  - {} ({})", privilege.name, privilege.service_scope);
        }
    }

    out.trim_end().to_string()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::retry::RetryMetrics;
    use rolegate_core::types::{Identity, Privilege, RoleEligibility, SelectedRole};
    use rolegate_session::SessionPhase;

    fn snapshot(eligibility: RoleEligibility) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Default::default(),
            epoch: 1,
            phase: SessionPhase::Authenticated,
            identity: Some(Identity::new("1234", "admin@example.com", "Admin")),
            eligibility,
            selected_role: SelectedRole::None,
            changing_role: false,
            has_credential: true,
            credential_age_secs: Some(42),
            retry: RetryMetrics::new().snapshot(),
        }
    }

    #[test]
    fn test_text_lists_missing_privileges() {
        let text = render_text(&snapshot(RoleEligibility::from_missing(vec![Privilege::new(
            "MANAGE_DEVICES",
            "svc",
        )])));

        assert!(text.contains("Admin <admin@example.com>"));
        assert!(text.contains("Delegated:      no"));
        assert!(text.contains("- MANAGE_DEVICES (svc)"));
        assert!(text.contains("Token age:      42s"));
        assert!(text.contains("Directory ops:  0 (0 retried, 0 exhausted)"));
    }

    #[test]
    fn test_json_is_parseable() {
        let json = render_snapshot(&snapshot(RoleEligibility::super_admin()), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["eligibility"]["is_super_admin"], true);
        assert_eq!(value["selected_role"], "none");
        assert_eq!(value["retry"]["exhausted"], 0);
        assert_eq!(value["credential_age_secs"], 42);
    }
}
