// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for rolegate.
//!
//! # Error Families
//!
//! ```text
//! AuthError       - Authorization taxonomy (reauth, check failed, ineligible role, ...)
//! DirectoryError  - Directory API calls (401/403/429/5xx, transport)
//! ProviderError   - Identity provider sign-in/out and refresh
//! StorageError    - Key/value persistence
//! BusError        - Session event bus
//! SessionError    - What session operations return to callers
//! ```
//!
//! Resolver failures never leave the resolver: they are folded into a
//! fail-closed `RoleEligibility`. Only role selection and identity provider
//! operations surface errors to callers, through [`SessionError`].
//!
//! # Examples
//!
//! ```
//! use rolegate_core::error::DirectoryError;
//!
//! let error = DirectoryError::from_status(429, "quota exceeded", None);
//! assert!(error.is_retryable());
//!
//! let error = DirectoryError::from_status(403, "not allowed", None);
//! assert!(!error.is_retryable());
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::types::SelectedRole;

// =============================================================================
// AuthError
// =============================================================================

/// The authorization failure taxonomy.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No identity is signed in.
    #[error("No identity is signed in")]
    Unauthenticated,

    /// An identity is present but no usable bearer token exists.
    #[error("Reauthentication required: no usable access token")]
    ReauthRequired,

    /// The directory could not be consulted.
    #[error("Eligibility check failed: {source}")]
    CheckFailed {
        /// The directory failure.
        #[source]
        source: DirectoryError,
    },

    /// The requested role is not permitted by the current eligibility.
    #[error("Role '{role}' is not permitted for this identity")]
    IneligibleRole {
        /// The rejected role.
        role: SelectedRole,
    },

    /// The directory still rejected the token after one refresh.
    #[error("Access token rejected after refresh: {source}")]
    TokenExpired {
        /// The second 401 response.
        #[source]
        source: DirectoryError,
    },
}

impl AuthError {
    /// Creates a check failed error.
    pub fn check_failed(source: DirectoryError) -> Self {
        Self::CheckFailed { source }
    }

    /// Creates an ineligible role error.
    pub fn ineligible(role: SelectedRole) -> Self {
        Self::IneligibleRole { role }
    }

    /// Returns `true` if the failed call is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::CheckFailed { source } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the server's `Retry-After` hint, if the failure carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AuthError::CheckFailed { source } => source.retry_after(),
            _ => None,
        }
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::ReauthRequired => "reauth_required",
            AuthError::CheckFailed { .. } => "check_failed",
            AuthError::IneligibleRole { .. } => "ineligible_role",
            AuthError::TokenExpired { .. } => "token_expired",
        }
    }
}

// =============================================================================
// DirectoryError
// =============================================================================

/// Errors returned by directory API calls.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// 401: the bearer token was rejected.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Response body or reason.
        message: String,
    },

    /// 403: the caller may not read this resource.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Response body or reason.
        message: String,
    },

    /// 404: the resource does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Response body or reason.
        message: String,
    },

    /// 429: the caller is being rate limited.
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited {
        /// Value of the `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// 5xx: the directory failed.
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Any other non-success status.
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request never produced a response.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl DirectoryError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            429 => Self::RateLimited { retry_after },
            500..=599 => Self::Server { status, message },
            _ => Self::UnexpectedStatus { status, message },
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Creates a rate limited error without a `Retry-After` hint.
    pub fn rate_limited() -> Self {
        Self::RateLimited { retry_after: None }
    }

    /// Creates a server error.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Returns the `Retry-After` hint of a 429.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DirectoryError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns `true` for 429, 5xx and transport failures.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DirectoryError::RateLimited { .. }
                | DirectoryError::Server { .. }
                | DirectoryError::Transport { .. }
        )
    }

    /// Returns `true` for a 401.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DirectoryError::Unauthorized { .. })
    }

    /// Returns the HTTP status this error stands for, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DirectoryError::Unauthorized { .. } => Some(401),
            DirectoryError::Forbidden { .. } => Some(403),
            DirectoryError::NotFound { .. } => Some(404),
            DirectoryError::RateLimited { .. } => Some(429),
            DirectoryError::Server { status, .. } | DirectoryError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            DirectoryError::Transport { .. } | DirectoryError::InvalidResponse { .. } => None,
        }
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            DirectoryError::Unauthorized { .. } => "unauthorized",
            DirectoryError::Forbidden { .. } => "forbidden",
            DirectoryError::NotFound { .. } => "not_found",
            DirectoryError::RateLimited { .. } => "rate_limited",
            DirectoryError::Server { .. } => "server",
            DirectoryError::UnexpectedStatus { .. } => "unexpected_status",
            DirectoryError::Transport { .. } => "transport",
            DirectoryError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

// =============================================================================
// ProviderError
// =============================================================================

/// Identity provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The user dismissed the sign-in prompt.
    #[error("Sign-in was cancelled")]
    Cancelled,

    /// The provider refused or failed the operation.
    #[error("Identity provider failed: {message}")]
    Failed {
        /// Error message.
        message: String,
    },

    /// The provider could not be reached or launched.
    #[error("Identity provider unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },
}

impl ProviderError {
    /// Creates a failed error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }
}

// =============================================================================
// StorageError
// =============================================================================

/// Key/value persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("Storage I/O error for key '{key}': {source}")]
    Io {
        /// The key being accessed.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key cannot be used as a storage name.
    #[error("Invalid storage key: '{key}'")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },
}

impl StorageError {
    /// Creates an I/O error.
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

// =============================================================================
// BusError
// =============================================================================

/// Session bus errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// All senders have been dropped.
    #[error("Session bus closed")]
    Closed,
}

// =============================================================================
// SessionError
// =============================================================================

/// Errors surfaced to callers of the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Role selection was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The identity provider failed during sign-in or sign-out.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl SessionError {
    /// Returns `true` if a role selection was rejected as ineligible.
    pub fn is_ineligible_role(&self) -> bool {
        matches!(self, SessionError::Auth(AuthError::IneligibleRole { .. }))
    }

    /// Returns `true` if the operation needs a signed-in identity.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, SessionError::Auth(AuthError::Unauthenticated))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            DirectoryError::from_status(401, "", None),
            DirectoryError::Unauthorized { .. }
        ));
        assert!(matches!(
            DirectoryError::from_status(403, "", None),
            DirectoryError::Forbidden { .. }
        ));
        assert!(matches!(
            DirectoryError::from_status(429, "", Some(Duration::from_secs(3))),
            DirectoryError::RateLimited { retry_after: Some(_) }
        ));
        assert!(matches!(
            DirectoryError::from_status(503, "", None),
            DirectoryError::Server { status: 503, .. }
        ));
        assert!(matches!(
            DirectoryError::from_status(418, "", None),
            DirectoryError::UnexpectedStatus { status: 418, .. }
        ));
    }

    #[test]
    fn test_retryability() {
        assert!(DirectoryError::rate_limited().is_retryable());
        assert!(DirectoryError::server(502, "bad gateway").is_retryable());
        assert!(DirectoryError::transport("reset").is_retryable());
        assert!(!DirectoryError::forbidden("no").is_retryable());
        assert!(!DirectoryError::unauthorized("expired").is_retryable());
        assert!(!DirectoryError::invalid_response("eof").is_retryable());
    }

    #[test]
    fn test_auth_error_retryability_follows_source() {
        assert!(AuthError::check_failed(DirectoryError::rate_limited()).is_retryable());
        assert!(!AuthError::check_failed(DirectoryError::forbidden("no")).is_retryable());
        assert!(!AuthError::ReauthRequired.is_retryable());
        assert!(!AuthError::TokenExpired {
            source: DirectoryError::unauthorized("x")
        }
        .is_retryable());
    }

    #[test]
    fn test_rate_limited_display() {
        let error = DirectoryError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(error.to_string(), "Rate limited (retry after 7s)");
        assert_eq!(DirectoryError::rate_limited().to_string(), "Rate limited");
    }

    #[test]
    fn test_session_error_helpers() {
        let error: SessionError = AuthError::ineligible(SelectedRole::SuperAdmin).into();
        assert!(error.is_ineligible_role());
        assert!(!error.is_unauthenticated());
    }
}
