// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for rolegate.
//!
//! This module defines the value types that flow between the credential
//! store, the eligibility resolver and the session role selector:
//!
//! - [`Identity`]: The signed-in subject, owned by the identity provider
//! - [`AccessToken`] / [`Credential`]: The short-lived bearer credential
//! - [`Privilege`]: A `(name, service_scope)` pair granted by a directory role
//! - [`RoleEligibility`]: The result of one eligibility resolution
//! - [`SelectedRole`]: The elevated role chosen for the session

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// The signed-in identity.
///
/// Created on sign-in and destroyed on sign-out. The core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier assigned by the identity provider.
    pub subject_id: String,
    /// Primary email address.
    pub email: String,
    /// Human-readable name.
    pub display_name: String,
}

impl Identity {
    /// Creates a new identity.
    pub fn new(
        subject_id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the key used to look the identity up in the directory.
    pub fn user_key(&self) -> &str {
        &self.subject_id
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.display_name, self.email)
    }
}

// =============================================================================
// AccessToken / Credential
// =============================================================================

/// An opaque bearer token.
///
/// The `Debug` output is redacted so tokens never reach the logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the token string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A bearer token together with the time it was acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The bearer token.
    pub access_token: AccessToken,
    /// When the token was obtained (or hydrated from storage).
    pub acquired_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential acquired now.
    pub fn new(access_token: AccessToken) -> Self {
        Self {
            access_token,
            acquired_at: Utc::now(),
        }
    }

    /// Returns how long ago the token was acquired.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.acquired_at).to_std().unwrap_or_default()
    }
}

// =============================================================================
// Privilege
// =============================================================================

/// Name of the sentinel privilege reported when no usable token exists.
pub const REAUTH_REQUIRED: &str = "REAUTH_REQUIRED";

/// A privilege granted by a directory role.
///
/// Equality is an exact match on both fields; there are no wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Privilege {
    /// Privilege name, e.g. `MANAGE_DEVICES`.
    pub name: String,
    /// Identifier of the service the privilege applies to.
    pub service_scope: String,
}

impl Privilege {
    /// Creates a new privilege.
    pub fn new(name: impl Into<String>, service_scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_scope: service_scope.into(),
        }
    }

    /// The sentinel meaning "eligibility was never checked".
    pub fn reauth_required() -> Self {
        Self::new(REAUTH_REQUIRED, "")
    }

    /// Returns `true` if this is the reauth sentinel.
    pub fn is_reauth_sentinel(&self) -> bool {
        self.name == REAUTH_REQUIRED && self.service_scope.is_empty()
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.service_scope.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.service_scope)
        }
    }
}

// =============================================================================
// RoleEligibility
// =============================================================================

/// How a [`RoleEligibility`] value came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// No resolution has completed for the current identity yet.
    Pending,
    /// There is no identity; nothing was checked.
    Unauthenticated,
    /// An identity exists but no usable token; nothing was checked.
    ReauthRequired,
    /// The directory answered and the flags reflect its answer.
    Verified,
    /// The directory could not be consulted; eligibility is unknown.
    CheckFailed,
}

impl CheckOutcome {
    /// Returns the outcome name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Pending => "pending",
            CheckOutcome::Unauthenticated => "unauthenticated",
            CheckOutcome::ReauthRequired => "reauth_required",
            CheckOutcome::Verified => "verified",
            CheckOutcome::CheckFailed => "check_failed",
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The roles an identity may currently assume.
///
/// Values are only built through the constructors below, which keep
/// `is_super_admin ⇒ is_delegated_admin` true. Every unverified outcome
/// leaves both flags `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleEligibility {
    is_super_admin: bool,
    is_delegated_admin: bool,
    missing_privileges: Vec<Privilege>,
    outcome: CheckOutcome,
}

impl RoleEligibility {
    /// Nothing resolved yet for the current identity.
    pub fn pending() -> Self {
        Self::closed(CheckOutcome::Pending, Vec::new())
    }

    /// No identity is signed in.
    pub fn unauthenticated() -> Self {
        Self::closed(CheckOutcome::Unauthenticated, Vec::new())
    }

    /// `{false, false, [REAUTH_REQUIRED]}`: a check was never attempted.
    pub fn reauth_required() -> Self {
        Self::closed(CheckOutcome::ReauthRequired, vec![Privilege::reauth_required()])
    }

    /// `{false, false, []}`: a check was attempted and failed.
    pub fn check_failed() -> Self {
        Self::closed(CheckOutcome::CheckFailed, Vec::new())
    }

    /// `{true, true, []}`: super admin subsumes delegated admin.
    pub fn super_admin() -> Self {
        Self {
            is_super_admin: true,
            is_delegated_admin: true,
            missing_privileges: Vec::new(),
            outcome: CheckOutcome::Verified,
        }
    }

    /// A verified non-super-admin result computed from the missing privileges.
    pub fn from_missing(mut missing_privileges: Vec<Privilege>) -> Self {
        missing_privileges.sort();
        missing_privileges.dedup();
        Self {
            is_super_admin: false,
            is_delegated_admin: missing_privileges.is_empty(),
            missing_privileges,
            outcome: CheckOutcome::Verified,
        }
    }

    fn closed(outcome: CheckOutcome, missing_privileges: Vec<Privilege>) -> Self {
        Self {
            is_super_admin: false,
            is_delegated_admin: false,
            missing_privileges,
            outcome,
        }
    }

    /// Returns `true` if the identity is a directory super admin.
    pub fn is_super_admin(&self) -> bool {
        self.is_super_admin
    }

    /// Returns `true` if the identity holds every catalog privilege.
    pub fn is_delegated_admin(&self) -> bool {
        self.is_delegated_admin
    }

    /// Catalog privileges the identity does not hold.
    pub fn missing_privileges(&self) -> &[Privilege] {
        &self.missing_privileges
    }

    /// How this value was produced.
    pub fn outcome(&self) -> CheckOutcome {
        self.outcome
    }

    /// Returns `true` if the directory actually answered.
    pub fn is_verified(&self) -> bool {
        self.outcome == CheckOutcome::Verified
    }

    /// Returns `true` for the "never checked, need a new token" sentinel.
    pub fn is_reauth_required(&self) -> bool {
        self.outcome == CheckOutcome::ReauthRequired
    }

    /// Returns `true` if `role` may be selected under this eligibility.
    pub fn permits(&self, role: SelectedRole) -> bool {
        match role {
            SelectedRole::None => true,
            SelectedRole::SuperAdmin => self.is_super_admin,
            SelectedRole::DelegatedAdmin => self.is_delegated_admin,
        }
    }
}

impl Default for RoleEligibility {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

// =============================================================================
// SelectedRole
// =============================================================================

/// The elevated role chosen by the identity for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectedRole {
    /// No elevated role.
    #[default]
    None,
    /// Full directory super admin.
    SuperAdmin,
    /// Bounded delegated admin.
    DelegatedAdmin,
}

impl SelectedRole {
    /// Returns the persisted role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectedRole::None => "none",
            SelectedRole::SuperAdmin => "super_admin",
            SelectedRole::DelegatedAdmin => "delegated_admin",
        }
    }

    /// Parses a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Some(SelectedRole::None),
            "super_admin" | "superadmin" | "super-admin" => Some(SelectedRole::SuperAdmin),
            "delegated_admin" | "delegatedadmin" | "delegated-admin" | "delegated" => {
                Some(SelectedRole::DelegatedAdmin)
            }
            _ => None,
        }
    }

    /// Returns `true` for [`SelectedRole::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, SelectedRole::None)
    }

    /// All elevated roles, most privileged first.
    pub fn elevated() -> &'static [SelectedRole] {
        &[SelectedRole::SuperAdmin, SelectedRole::DelegatedAdmin]
    }
}

impl fmt::Display for SelectedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
        assert_eq!(token.expose(), "ya29.secret");
    }

    #[test]
    fn test_privilege_equality_is_exact() {
        let a = Privilege::new("MANAGE_DEVICES", "svc-1");
        assert_eq!(a, Privilege::new("MANAGE_DEVICES", "svc-1"));
        assert_ne!(a, Privilege::new("MANAGE_DEVICES", "svc-2"));
        assert_ne!(a, Privilege::new("manage_devices", "svc-1"));
    }

    #[test]
    fn test_super_admin_implies_delegated_admin() {
        let eligibility = RoleEligibility::super_admin();
        assert!(eligibility.is_super_admin());
        assert!(eligibility.is_delegated_admin());
        assert!(eligibility.missing_privileges().is_empty());
    }

    #[test]
    fn test_reauth_sentinel_is_distinct_from_check_failed() {
        let reauth = RoleEligibility::reauth_required();
        let failed = RoleEligibility::check_failed();

        assert!(!reauth.is_delegated_admin());
        assert!(!failed.is_delegated_admin());
        assert_eq!(reauth.missing_privileges(), &[Privilege::reauth_required()]);
        assert!(failed.missing_privileges().is_empty());
        assert_ne!(reauth, failed);
    }

    #[test]
    fn test_from_missing_sorts_and_dedups() {
        let x = Privilege::new("B", "s");
        let y = Privilege::new("A", "s");
        let eligibility = RoleEligibility::from_missing(vec![x.clone(), y.clone(), x.clone()]);

        assert!(!eligibility.is_delegated_admin());
        assert_eq!(eligibility.missing_privileges(), &[y, x]);
        assert!(RoleEligibility::from_missing(vec![]).is_delegated_admin());
    }

    #[test]
    fn test_permits() {
        let delegated = RoleEligibility::from_missing(vec![]);
        assert!(delegated.permits(SelectedRole::None));
        assert!(delegated.permits(SelectedRole::DelegatedAdmin));
        assert!(!delegated.permits(SelectedRole::SuperAdmin));

        let nothing = RoleEligibility::check_failed();
        assert!(!nothing.permits(SelectedRole::DelegatedAdmin));
    }

    #[test]
    fn test_selected_role_parse() {
        assert_eq!(SelectedRole::parse("super_admin"), Some(SelectedRole::SuperAdmin));
        assert_eq!(SelectedRole::parse("Delegated-Admin"), Some(SelectedRole::DelegatedAdmin));
        assert_eq!(SelectedRole::parse("none"), Some(SelectedRole::None));
        assert_eq!(SelectedRole::parse("owner"), None);

        for role in [SelectedRole::None, SelectedRole::SuperAdmin, SelectedRole::DelegatedAdmin] {
            assert_eq!(SelectedRole::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_credential_age() {
        let mut credential = Credential::new(AccessToken::new("t"));
        assert!(credential.age() < Duration::from_secs(60));

        credential.acquired_at = Utc::now() - chrono::Duration::hours(2);
        assert!(credential.age() > Duration::from_secs(3600));

        credential.acquired_at = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(credential.age(), Duration::ZERO);
    }
}
