// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Role eligibility resolver.
//!
//! Computes which elevated roles an identity may hold by asking the
//! directory:
//!
//! 1. No token: return the `REAUTH_REQUIRED` sentinel without any call.
//! 2. Super-admin flag set: `{true, true, []}` and stop.
//! 3. Otherwise page through role assignments and fetch each distinct
//!    role's privileges concurrently.
//! 4. `missing = catalog − ⋃ held`.
//!
//! Each directory call runs under the retry policy and through the
//! authorized-call wrapper, which refreshes the token once on a 401.
//! Failures never escape: they are folded into a fail-closed
//! [`RoleEligibility`].

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;

use rolegate_core::catalog::{PrivilegeCatalog, PrivilegeSet};
use rolegate_core::error::{AuthError, DirectoryError};
use rolegate_core::retry::RetryPolicy;
use rolegate_core::types::{AccessToken, Identity, RoleEligibility};
use rolegate_directory::DirectoryApi;

use crate::credential::CredentialStore;

/// Upper bound on assignment pages followed in one resolution.
const MAX_ASSIGNMENT_PAGES: usize = 100;

/// Resolves [`RoleEligibility`] for an identity.
pub struct EligibilityResolver {
    directory: Arc<dyn DirectoryApi>,
    credentials: Arc<CredentialStore>,
    catalog: Arc<PrivilegeCatalog>,
    retry: RetryPolicy,
}

impl EligibilityResolver {
    /// Creates a resolver with the default retry policy.
    pub fn new(
        directory: Arc<dyn DirectoryApi>,
        credentials: Arc<CredentialStore>,
        catalog: Arc<PrivilegeCatalog>,
    ) -> Self {
        Self {
            directory,
            credentials,
            catalog,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &PrivilegeCatalog {
        &self.catalog
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolves eligibility for an optional identity.
    ///
    /// With no identity nothing is read and `unauthenticated` is returned.
    pub async fn resolve_for(&self, identity: Option<&Identity>) -> RoleEligibility {
        match identity {
            Some(identity) => self.resolve(identity).await,
            None => RoleEligibility::unauthenticated(),
        }
    }

    /// Resolves eligibility for `identity`.
    pub async fn resolve(&self, identity: &Identity) -> RoleEligibility {
        if self.credentials.acquire().is_none() {
            tracing::info!(subject = %identity.subject_id, "No access token, reauthentication required");
            return RoleEligibility::reauth_required();
        }

        match self.check(identity).await {
            Ok(eligibility) => {
                tracing::info!(
                    subject = %identity.subject_id,
                    super_admin = eligibility.is_super_admin(),
                    delegated_admin = eligibility.is_delegated_admin(),
                    missing = eligibility.missing_privileges().len(),
                    "Eligibility resolved"
                );
                eligibility
            }
            Err(AuthError::ReauthRequired) => {
                tracing::info!(subject = %identity.subject_id, "Token refresh declined, reauthentication required");
                RoleEligibility::reauth_required()
            }
            Err(e) => {
                tracing::warn!(
                    subject = %identity.subject_id,
                    error_type = e.error_type(),
                    error = %e,
                    "Eligibility check failed"
                );
                RoleEligibility::check_failed()
            }
        }
    }

    async fn check(&self, identity: &Identity) -> Result<RoleEligibility, AuthError> {
        let directory = &self.directory;
        let user_key = identity.user_key();

        let is_super_admin = self
            .retry
            .execute(|| {
                self.authorized(|token| async move { directory.is_super_admin(&token, user_key).await })
            })
            .await?;

        if is_super_admin {
            return Ok(RoleEligibility::super_admin());
        }

        let role_ids = self.assigned_role_ids(user_key).await?;
        tracing::debug!(roles = role_ids.len(), "Fetching role privileges");

        let fetches = role_ids.iter().map(|role_id| {
            self.retry.execute(move || {
                self.authorized(move |token| async move { directory.role_privileges(&token, role_id).await })
            })
        });

        let mut held = PrivilegeSet::new();
        for privileges in try_join_all(fetches).await? {
            held.extend(privileges);
        }

        Ok(RoleEligibility::from_missing(self.catalog.missing_from(&held)))
    }

    async fn assigned_role_ids(&self, user_key: &str) -> Result<BTreeSet<String>, AuthError> {
        let directory = &self.directory;
        let mut role_ids = BTreeSet::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_ASSIGNMENT_PAGES {
            let current = page_token.as_deref();
            let page = self
                .retry
                .execute(|| {
                    self.authorized(|token| async move {
                        directory.role_assignments(&token, user_key, current).await
                    })
                })
                .await?;

            let more = page.has_more();
            role_ids.extend(page.assignments.into_iter().map(|a| a.role_id));

            if !more {
                return Ok(role_ids);
            }
            page_token = page.next_page_token;
        }

        tracing::warn!(pages = MAX_ASSIGNMENT_PAGES, "Role assignment pagination did not terminate");
        Err(AuthError::check_failed(DirectoryError::invalid_response(
            "role assignment pagination did not terminate",
        )))
    }

    /// Runs one directory call with the current token, refreshing once on 401.
    async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, AuthError>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        let token = self.credentials.acquire().ok_or(AuthError::ReauthRequired)?;

        match call(token.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_unauthorized() => {
                tracing::debug!(error = %e, "Directory rejected token, refreshing");
                let token = self
                    .credentials
                    .refresh_after(&token)
                    .await
                    .ok_or(AuthError::ReauthRequired)?;

                match call(token).await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_unauthorized() => Err(AuthError::TokenExpired { source: e }),
                    Err(e) => Err(AuthError::check_failed(e)),
                }
            }
            Err(e) => Err(AuthError::check_failed(e)),
        }
    }
}

impl fmt::Debug for EligibilityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EligibilityResolver")
            .field("directory", &self.directory.name())
            .field("catalog_size", &self.catalog.len())
            .field("retry", &self.retry.strategy_name())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
