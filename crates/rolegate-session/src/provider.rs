// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Identity provider abstraction.
//!
//! The provider owns the sign-in flow and is the only source of new access
//! tokens. The credential store calls it when the directory rejects a token.

use async_trait::async_trait;

use rolegate_core::error::ProviderError;
use rolegate_core::types::{AccessToken, Identity};

/// The result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignInGrant {
    /// The signed-in identity.
    pub identity: Identity,
    /// The first access token for this identity.
    pub token: AccessToken,
}

impl SignInGrant {
    /// Creates a new grant.
    pub fn new(identity: Identity, token: impl Into<AccessToken>) -> Self {
        Self {
            identity,
            token: token.into(),
        }
    }
}

/// The result of a token refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token was issued.
    Token(AccessToken),
    /// No token: the silent flow could not proceed, or the user cancelled
    /// the interactive prompt.
    Cancelled,
}

impl RefreshOutcome {
    /// Returns the token, if any.
    pub fn into_token(self) -> Option<AccessToken> {
        match self {
            RefreshOutcome::Token(token) if !token.is_empty() => Some(token),
            _ => None,
        }
    }
}

/// An identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the provider name for logging.
    fn name(&self) -> &str;

    /// Runs the sign-in flow.
    async fn sign_in(&self) -> Result<SignInGrant, ProviderError>;

    /// Ends the provider session.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Tries to obtain a new token without user interaction.
    async fn silent_refresh(&self) -> RefreshOutcome;

    /// Obtains a new token, prompting the user if needed.
    async fn interactive_refresh(&self) -> RefreshOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_outcome_into_token() {
        assert_eq!(
            RefreshOutcome::Token(AccessToken::new("t")).into_token(),
            Some(AccessToken::new("t"))
        );
        assert_eq!(RefreshOutcome::Token(AccessToken::new("  ")).into_token(), None);
        assert_eq!(RefreshOutcome::Cancelled.into_token(), None);
    }
}
