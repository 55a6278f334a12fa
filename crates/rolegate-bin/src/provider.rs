// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command-line identity provider.
//!
//! The identity comes from the `identity` config section. Tokens come from
//! `identity.token_command` (silent refresh), or from a terminal prompt
//! (interactive refresh). An empty answer at the prompt is a cancel.

use std::io::{BufRead, IsTerminal, Write};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use rolegate_config::IdentityConfig;
use rolegate_core::error::ProviderError;
use rolegate_core::types::{AccessToken, Identity};
use rolegate_session::{IdentityProvider, RefreshOutcome, SignInGrant};

/// Identity provider backed by a token command and the terminal.
#[derive(Debug, Clone)]
pub struct CommandIdentityProvider {
    identity: Identity,
    token_command: Vec<String>,
    interactive: bool,
}

impl CommandIdentityProvider {
    /// Creates a provider for the configured identity.
    ///
    /// Prompting is enabled only when stdin is a terminal.
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            identity: config.to_identity(),
            token_command: config.token_command.clone(),
            interactive: std::io::stdin().is_terminal(),
        }
    }

    /// Enables or disables the terminal prompt.
    pub fn with_interactive(mut self, enabled: bool) -> Self {
        self.interactive = enabled;
        self
    }

    /// Returns the identity this provider signs in as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn run_token_command(&self) -> Result<AccessToken, ProviderError> {
        let Some((program, args)) = self.token_command.split_first() else {
            return Err(ProviderError::unavailable("no token command configured"));
        };

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ProviderError::unavailable(format!("failed to run '{}': {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::failed(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        let token = AccessToken::new(String::from_utf8_lossy(&output.stdout).trim());
        if token.is_empty() {
            return Err(ProviderError::failed(format!("'{}' printed no token", program)));
        }
        Ok(token)
    }

    async fn prompt_for_token(&self) -> Option<AccessToken> {
        if !self.interactive {
            return None;
        }

        let email = self.identity.email.clone();
        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "Access token for {} (empty to cancel): ", email);
            let _ = stderr.flush();

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => Some(AccessToken::new(line.trim())).filter(|token| !token.is_empty()),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read token from terminal");
                None
            }
            Err(e) => {
                warn!(error = %e, "Token prompt task failed");
                None
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for CommandIdentityProvider {
    fn name(&self) -> &str {
        "command"
    }

    async fn sign_in(&self) -> Result<SignInGrant, ProviderError> {
        let command_error = match self.run_token_command().await {
            Ok(token) => return Ok(SignInGrant::new(self.identity.clone(), token)),
            Err(e) => e,
        };

        if !self.interactive {
            return Err(command_error);
        }
        debug!(error = %command_error, "Token command unavailable, prompting");

        match self.prompt_for_token().await {
            Some(token) => Ok(SignInGrant::new(self.identity.clone(), token)),
            None => Err(ProviderError::Cancelled),
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        debug!(subject = %self.identity.subject_id, "Nothing to revoke for command provider");
        Ok(())
    }

    async fn silent_refresh(&self) -> RefreshOutcome {
        match self.run_token_command().await {
            Ok(token) => RefreshOutcome::Token(token),
            Err(e) => {
                debug!(error = %e, "Silent refresh failed");
                RefreshOutcome::Cancelled
            }
        }
    }

    async fn interactive_refresh(&self) -> RefreshOutcome {
        match self.prompt_for_token().await {
            Some(token) => RefreshOutcome::Token(token),
            None => RefreshOutcome::Cancelled,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(command: &[&str]) -> CommandIdentityProvider {
        let config = IdentityConfig {
            subject_id: "1234".into(),
            email: "admin@example.com".into(),
            display_name: None,
            token_command: command.iter().map(|s| s.to_string()).collect(),
        };
        CommandIdentityProvider::new(&config).with_interactive(false)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sign_in_runs_token_command() {
        let grant = provider(&["echo", "ya29.token"]).sign_in().await.unwrap();
        assert_eq!(grant.identity.email, "admin@example.com");
        assert_eq!(grant.token.expose(), "ya29.token");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_refresh_failure_is_cancel() {
        assert_eq!(provider(&["false"]).silent_refresh().await, RefreshOutcome::Cancelled);
        assert_eq!(provider(&["true"]).silent_refresh().await, RefreshOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_no_command_without_terminal() {
        let provider = provider(&[]);
        assert!(matches!(provider.sign_in().await, Err(ProviderError::Unavailable { .. })));
        assert_eq!(provider.interactive_refresh().await, RefreshOutcome::Cancelled);
        assert!(provider.sign_out().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let provider = provider(&["rolegate-test-no-such-program"]);
        assert!(matches!(provider.sign_in().await, Err(ProviderError::Unavailable { .. })));
    }
}
