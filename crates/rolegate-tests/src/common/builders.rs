// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builders for mock directories and fully wired sessions.

use std::sync::Arc;
use std::time::Duration;

use rolegate_core::bus::SessionBus;
use rolegate_core::catalog::PrivilegeCatalog;
use rolegate_core::retry::RetryPolicy;
use rolegate_core::types::{Identity, Privilege};
use rolegate_session::{KeyValueStore, MemoryStore, Session};

use super::fixtures::{IdentityFixtures, RetryFixtures};
use super::mocks::{Endpoint, MockDirectory, MockIdentityProvider};

// =============================================================================
// DirectoryBuilder
// =============================================================================

/// Builder for [`MockDirectory`].
///
/// # Example
///
/// ```rust,ignore
/// let directory = DirectoryBuilder::new()
///     .role("r1", PrivilegeFixtures::full_catalog())
///     .assign(IdentityFixtures::ADMIN_KEY, &["r1"])
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct DirectoryBuilder {
    directory: MockDirectory,
}

impl DirectoryBuilder {
    /// Create a new builder with an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `user_key` as super admin.
    pub fn super_admin(self, user_key: &str) -> Self {
        self.directory.set_super_admin(user_key, true);
        self
    }

    /// Defines a role.
    pub fn role(self, role_id: &str, privileges: Vec<Privilege>) -> Self {
        self.directory.set_role(role_id, privileges);
        self
    }

    /// Assigns roles on a single page.
    pub fn assign(self, user_key: &str, role_ids: &[&str]) -> Self {
        self.directory.set_assignments(user_key, role_ids);
        self
    }

    /// Assigns roles over several pages.
    pub fn assign_pages(self, user_key: &str, pages: Vec<Vec<&str>>) -> Self {
        self.directory.set_assignment_pages(user_key, pages);
        self
    }

    /// Accepts only the listed bearer tokens.
    pub fn accept_only(self, tokens: &[&str]) -> Self {
        self.directory.accept_only(tokens);
        self
    }

    /// Rejects `token` at `endpoint` only.
    pub fn reject_at(self, endpoint: Endpoint, token: &str) -> Self {
        self.directory.reject_at(endpoint, token);
        self
    }

    /// Delays every privilege fetch of `role_id`.
    pub fn slow_role(self, role_id: &str, delay: Duration) -> Self {
        self.directory.set_role_delay(role_id, delay);
        self
    }

    /// Build the directory.
    pub fn build(self) -> Arc<MockDirectory> {
        Arc::new(self.directory)
    }
}

// =============================================================================
// TestSessionBuilder
// =============================================================================

/// A session plus handles to every test double behind it.
pub struct TestSession {
    /// The session under test.
    pub session: Arc<Session>,
    /// Its directory.
    pub directory: Arc<MockDirectory>,
    /// Its identity provider.
    pub provider: Arc<MockIdentityProvider>,
    /// Its durable store.
    pub durable: Arc<dyn KeyValueStore>,
    /// Its session-scoped store.
    pub session_store: Arc<dyn KeyValueStore>,
}

/// Builder for [`TestSession`].
pub struct TestSessionBuilder {
    directory: Arc<MockDirectory>,
    provider: Arc<MockIdentityProvider>,
    durable: Arc<dyn KeyValueStore>,
    session_store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    catalog: PrivilegeCatalog,
    bus: SessionBus,
}

impl TestSessionBuilder {
    /// Create a builder over `directory` with fast retries and in-memory
    /// stores, signing in as [`IdentityFixtures::admin`].
    pub fn new(directory: Arc<MockDirectory>) -> Self {
        Self {
            directory,
            provider: Arc::new(MockIdentityProvider::default()),
            durable: Arc::new(MemoryStore::new()),
            session_store: Arc::new(MemoryStore::new()),
            retry: RetryFixtures::fast(),
            catalog: PrivilegeCatalog::delegated_admin(),
            bus: SessionBus::default(),
        }
    }

    /// Signs in as `identity`.
    pub fn identity(self, identity: Identity) -> Self {
        self.provider.set_identity(identity);
        self
    }

    /// Uses `provider`.
    pub fn provider(mut self, provider: Arc<MockIdentityProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Uses `store` as the durable store.
    pub fn durable(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = store;
        self
    }

    /// Uses `store` as the session-scoped store.
    pub fn session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session_store = store;
        self
    }

    /// Uses `retry` for directory calls.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Uses `catalog`.
    pub fn catalog(mut self, catalog: PrivilegeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Uses `bus`.
    pub fn bus(mut self, bus: SessionBus) -> Self {
        self.bus = bus;
        self
    }

    /// Build the session.
    pub fn build(self) -> TestSession {
        let session = Session::builder(self.provider.clone(), self.directory.clone())
            .session_store(self.session_store.clone())
            .durable_store(self.durable.clone())
            .retry_policy(self.retry)
            .catalog(self.catalog)
            .bus(self.bus)
            .build();

        TestSession {
            session,
            directory: self.directory,
            provider: self.provider,
            durable: self.durable,
            session_store: self.session_store,
        }
    }
}

impl TestSession {
    /// Signs in and runs one resolution.
    pub async fn sign_in_and_resolve(&self) -> rolegate_core::types::RoleEligibility {
        self.session.sign_in().await.expect("sign-in failed");
        self.session.refresh_eligibility().await
    }
}

/// A directory where [`IdentityFixtures::admin`] holds the full catalog
/// through one role.
pub fn delegated_admin_directory() -> Arc<MockDirectory> {
    DirectoryBuilder::new()
        .role("role-delegated", super::fixtures::PrivilegeFixtures::full_catalog())
        .assign(IdentityFixtures::ADMIN_KEY, &["role-delegated"])
        .build()
}
