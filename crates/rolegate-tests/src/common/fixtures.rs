// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built identities, privilege sets, configuration files and retry
//! policies shared by the integration suites.

use std::time::Duration;

use rolegate_core::catalog::{PrivilegeCatalog, DEVICE_MANAGEMENT_SERVICE, DIRECTORY_SERVICE};
use rolegate_core::retry::{RetryConfig, RetryPolicy};
use rolegate_core::types::{Identity, Privilege};

// =============================================================================
// Identity Fixtures
// =============================================================================

/// Pre-built identities.
pub struct IdentityFixtures;

impl IdentityFixtures {
    /// User key of [`IdentityFixtures::admin`].
    pub const ADMIN_KEY: &'static str = "103582791432";

    /// User key of [`IdentityFixtures::other`].
    pub const OTHER_KEY: &'static str = "208841100077";

    /// The identity most tests sign in as.
    pub fn admin() -> Identity {
        Identity::new(Self::ADMIN_KEY, "admin@example.com", "Example Admin")
    }

    /// A second identity for sign-in switches.
    pub fn other() -> Identity {
        Identity::new(Self::OTHER_KEY, "other@example.com", "Other User")
    }
}

// =============================================================================
// Privilege Fixtures
// =============================================================================

/// Pre-built privilege lists.
pub struct PrivilegeFixtures;

impl PrivilegeFixtures {
    /// Every privilege of the delegated-admin catalog.
    pub fn full_catalog() -> Vec<Privilege> {
        PrivilegeCatalog::delegated_admin().iter().cloned().collect()
    }

    /// The catalog without the privilege called `name`.
    pub fn catalog_without(name: &str) -> Vec<Privilege> {
        Self::full_catalog().into_iter().filter(|p| p.name != name).collect()
    }

    /// The catalog split into two disjoint halves.
    pub fn catalog_halves() -> (Vec<Privilege>, Vec<Privilege>) {
        let all = Self::full_catalog();
        let mid = all.len() / 2;
        (all[..mid].to_vec(), all[mid..].to_vec())
    }

    /// The device management privilege.
    pub fn manage_devices() -> Privilege {
        Privilege::new("MANAGE_DEVICES", DEVICE_MANAGEMENT_SERVICE)
    }

    /// The right name under the wrong service; never matches the catalog.
    pub fn users_retrieve_wrong_scope() -> Privilege {
        Privilege::new("USERS_RETRIEVE", DEVICE_MANAGEMENT_SERVICE)
    }

    /// A directory privilege outside the catalog.
    pub fn unrelated() -> Privilege {
        Privilege::new("USERS_CREATE", DIRECTORY_SERVICE)
    }
}

// =============================================================================
// Retry Fixtures
// =============================================================================

/// Pre-built retry policies.
pub struct RetryFixtures;

impl RetryFixtures {
    /// Production delays without jitter, for paused-clock timing assertions.
    pub fn deterministic() -> RetryPolicy {
        RetryPolicy::exponential(RetryConfig::default().with_max_jitter(Duration::ZERO))
    }

    /// Three attempts with millisecond delays.
    pub fn fast() -> RetryPolicy {
        RetryPolicy::exponential(
            RetryConfig::default()
                .with_base_delay(Duration::from_millis(1))
                .with_max_jitter(Duration::ZERO),
        )
    }

    /// A single attempt.
    pub fn none() -> RetryPolicy {
        RetryPolicy::no_retry()
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration file contents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Smallest valid YAML configuration.
    pub fn minimal_yaml() -> &'static str {
        r#"
identity:
  subject_id: "103582791432"
  email: admin@example.com
"#
    }

    /// YAML configuration touching every section.
    pub fn full_yaml() -> &'static str {
        r#"
directory:
  base_url: http://127.0.0.1:18080
  customer_id: C01abc
  request_timeout_ms: 5000

retry:
  max_attempts: 5
  base_delay: 200
  max_jitter: 50
  max_delay: 10000

storage:
  data_dir: state

identity:
  subject_id: "103582791432"
  email: admin@example.com
  display_name: Example Admin
  token_command: ["print-token", "--account", "admin"]

logging:
  level: debug
  format: json
"#
    }

    /// The full configuration in TOML.
    pub fn full_toml() -> &'static str {
        r#"
[directory]
base_url = "http://127.0.0.1:18080"
customer_id = "C01abc"

[retry]
max_attempts = 5
base_delay = 200

[storage]
data_dir = "state"

[identity]
subject_id = "103582791432"
email = "admin@example.com"

[logging]
level = "warn"
format = "compact"
"#
    }
}
