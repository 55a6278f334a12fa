// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Directory API abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rolegate_core::error::DirectoryError;
use rolegate_core::types::{AccessToken, Privilege};

// =============================================================================
// Types
// =============================================================================

/// A role bound to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Identifier of the assigned role.
    pub role_id: String,
}

impl RoleAssignment {
    /// Creates a new assignment.
    pub fn new(role_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
        }
    }
}

/// One page of role assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPage {
    /// Assignments on this page.
    pub assignments: Vec<RoleAssignment>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

impl AssignmentPage {
    /// A final page.
    pub fn last(assignments: Vec<RoleAssignment>) -> Self {
        Self {
            assignments,
            next_page_token: None,
        }
    }

    /// A page followed by another.
    pub fn with_next(assignments: Vec<RoleAssignment>, next_page_token: impl Into<String>) -> Self {
        Self {
            assignments,
            next_page_token: Some(next_page_token.into()),
        }
    }

    /// Returns `true` if more pages follow.
    pub fn has_more(&self) -> bool {
        self.next_page_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

// =============================================================================
// DirectoryApi
// =============================================================================

/// The directory calls needed to resolve role eligibility.
///
/// Implementations report HTTP failures through [`DirectoryError`] so that
/// the resolver can tell 401s (refresh and retry once), transient failures
/// (backoff) and hard failures (fail closed) apart.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Returns the name of this directory for logging.
    fn name(&self) -> &str;

    /// Reads the super-admin flag of a user.
    async fn is_super_admin(&self, token: &AccessToken, user_key: &str) -> Result<bool, DirectoryError>;

    /// Lists one page of a user's role assignments.
    async fn role_assignments(
        &self,
        token: &AccessToken,
        user_key: &str,
        page_token: Option<&str>,
    ) -> Result<AssignmentPage, DirectoryError>;

    /// Reads the privileges a role grants.
    async fn role_privileges(&self, token: &AccessToken, role_id: &str) -> Result<Vec<Privilege>, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_has_more() {
        assert!(!AssignmentPage::last(vec![]).has_more());
        assert!(AssignmentPage::with_next(vec![], "p2").has_more());
        assert!(!AssignmentPage::with_next(vec![], "").has_more());
    }
}
