// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Privilege catalog for delegated-admin eligibility.
//!
//! The catalog is a fixed list of `(name, service_scope)` pairs. An identity
//! is a delegated admin only if the union of privileges across all its role
//! assignments contains every catalog entry. Matching is exact set
//! membership with no wildcards.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Privilege;

/// Service identifier of the directory API.
pub const DIRECTORY_SERVICE: &str = "00haapch16h1ysv";

/// Service identifier of the device management API.
pub const DEVICE_MANAGEMENT_SERVICE: &str = "01x0gk371sq486y";

/// Service identifier of the reports API.
pub const REPORTS_SERVICE: &str = "01ci93xb3tmzyin";

const DELEGATED_ADMIN_PRIVILEGES: &[(&str, &str)] = &[
    ("ORGANIZATION_UNITS_RETRIEVE", DIRECTORY_SERVICE),
    ("USERS_RETRIEVE", DIRECTORY_SERVICE),
    ("GROUPS_RETRIEVE", DIRECTORY_SERVICE),
    ("MANAGE_DEVICES", DEVICE_MANAGEMENT_SERVICE),
    ("MANAGE_DEVICE_SETTINGS", DEVICE_MANAGEMENT_SERVICE),
    ("REPORTS_ACCESS", REPORTS_SERVICE),
];

// =============================================================================
// PrivilegeSet
// =============================================================================

/// An ordered set of privileges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeSet {
    privileges: BTreeSet<Privilege>,
}

impl PrivilegeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a privilege.
    pub fn insert(&mut self, privilege: Privilege) -> bool {
        self.privileges.insert(privilege)
    }

    /// Unions another set into this one.
    pub fn merge(&mut self, other: &PrivilegeSet) {
        self.privileges.extend(other.privileges.iter().cloned());
    }

    /// Returns `true` if the set holds `privilege`.
    pub fn contains(&self, privilege: &Privilege) -> bool {
        self.privileges.contains(privilege)
    }

    /// Number of privileges.
    pub fn len(&self) -> usize {
        self.privileges.len()
    }

    /// Returns `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
    }

    /// Iterates in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Privilege> {
        self.privileges.iter()
    }
}

impl FromIterator<Privilege> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = Privilege>>(iter: I) -> Self {
        Self {
            privileges: iter.into_iter().collect(),
        }
    }
}

impl Extend<Privilege> for PrivilegeSet {
    fn extend<I: IntoIterator<Item = Privilege>>(&mut self, iter: I) {
        self.privileges.extend(iter);
    }
}

impl IntoIterator for PrivilegeSet {
    type Item = Privilege;
    type IntoIter = std::collections::btree_set::IntoIter<Privilege>;

    fn into_iter(self) -> Self::IntoIter {
        self.privileges.into_iter()
    }
}

// =============================================================================
// PrivilegeCatalog
// =============================================================================

/// The privileges required for delegated-admin eligibility.
///
/// Created once at startup and shared by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeCatalog {
    required: PrivilegeSet,
}

impl PrivilegeCatalog {
    /// The built-in delegated-admin catalog.
    pub fn delegated_admin() -> Self {
        Self::from_entries(
            DELEGATED_ADMIN_PRIVILEGES
                .iter()
                .map(|(name, scope)| Privilege::new(*name, *scope)),
        )
    }

    /// Builds a catalog from explicit entries.
    pub fn from_entries(entries: impl IntoIterator<Item = Privilege>) -> Self {
        Self {
            required: entries.into_iter().collect(),
        }
    }

    /// Returns `catalog − held`, sorted.
    pub fn missing_from(&self, held: &PrivilegeSet) -> Vec<Privilege> {
        self.required
            .iter()
            .filter(|privilege| !held.contains(privilege))
            .cloned()
            .collect()
    }

    /// Iterates the required privileges.
    pub fn iter(&self) -> impl Iterator<Item = &Privilege> {
        self.required.iter()
    }

    /// Number of required privileges.
    pub fn len(&self) -> usize {
        self.required.len()
    }

    /// Returns `true` if the catalog requires nothing.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}

impl Default for PrivilegeCatalog {
    fn default() -> Self {
        Self::delegated_admin()
    }
}

// =============================================================================
// Tests
// =============================================================================
