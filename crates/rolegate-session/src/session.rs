// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The session aggregate.
//!
//! [`Session`] ties the identity provider, credential store, resolver and
//! role selector together. It is built once by the composition root and
//! shared as `Arc<Session>`.
//!
//! State lives in a [`RoleSelector`] behind a `parking_lot::RwLock`. Every
//! mutation is a short synchronous critical section; the lock is never held
//! across an `.await`. Resolutions snapshot `(epoch, identity)`, run without
//! the lock, and re-enter through [`RoleSelector::apply_eligibility`].

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use rolegate_core::bus::{SessionBus, SessionEvent, SessionSubscriber};
use rolegate_core::catalog::PrivilegeCatalog;
use rolegate_core::error::SessionError;
use rolegate_core::retry::{RetryMetricsSnapshot, RetryPolicy};
use rolegate_core::types::{Identity, RoleEligibility, SelectedRole};
use rolegate_directory::DirectoryApi;

use crate::credential::CredentialStore;
use crate::provider::IdentityProvider;
use crate::resolver::EligibilityResolver;
use crate::selector::{ApplyOutcome, RoleChange, RoleSelector, SessionPhase};
use crate::storage::{KeyValueStore, MemoryStore, SELECTED_ROLE_KEY};
use crate::watcher::EligibilityWatcher;

// =============================================================================
// SessionSnapshot
// =============================================================================

/// A consistent read of the session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: Uuid,
    /// Current epoch.
    pub epoch: u64,
    /// Current phase.
    pub phase: SessionPhase,
    /// Signed-in identity.
    pub identity: Option<Identity>,
    /// Current eligibility.
    pub eligibility: RoleEligibility,
    /// Selected role.
    pub selected_role: SelectedRole,
    /// Whether a role change is in progress.
    pub changing_role: bool,
    /// Whether a credential is held in memory.
    pub has_credential: bool,
    /// Seconds since the held credential was acquired.
    pub credential_age_secs: Option<u64>,
    /// Retry counters of directory calls made by this session.
    pub retry: RetryMetricsSnapshot,
}

// =============================================================================
// Session
// =============================================================================

/// The single session of this process.
pub struct Session {
    id: Uuid,
    state: RwLock<RoleSelector>,
    credentials: Arc<CredentialStore>,
    resolver: EligibilityResolver,
    provider: Arc<dyn IdentityProvider>,
    durable: Arc<dyn KeyValueStore>,
    bus: SessionBus,
}

impl Session {
    /// Starts building a session.
    pub fn builder(provider: Arc<dyn IdentityProvider>, directory: Arc<dyn DirectoryApi>) -> SessionBuilder {
        SessionBuilder::new(provider, directory)
    }

    /// Returns the session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the credential store.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &EligibilityResolver {
        &self.resolver
    }

    /// Returns the event bus.
    pub fn bus(&self) -> &SessionBus {
        &self.bus
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> SessionSubscriber {
        self.bus.subscribe()
    }

    /// Returns the signed-in identity.
    pub fn identity(&self) -> Option<Identity> {
        self.state.read().identity().cloned()
    }

    /// Returns the current eligibility.
    pub fn eligibility(&self) -> RoleEligibility {
        self.state.read().eligibility().clone()
    }

    /// Returns the selected role.
    pub fn selected_role(&self) -> SelectedRole {
        self.state.read().selected()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.read().phase()
    }

    /// Returns a consistent snapshot of the whole state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            session_id: self.id,
            epoch: state.epoch(),
            phase: state.phase(),
            identity: state.identity().cloned(),
            eligibility: state.eligibility().clone(),
            selected_role: state.selected(),
            changing_role: state.is_changing_role(),
            has_credential: self.credentials.has_token(),
            credential_age_secs: self
                .credentials
                .credential()
                .map(|credential| credential.age().as_secs()),
            retry: self.resolver.retry_policy().metrics().snapshot(),
        }
    }

    /// Signs in through the identity provider.
    ///
    /// Provider failures propagate unchanged and leave the state untouched.
    pub async fn sign_in(&self) -> Result<Identity, SessionError> {
        let grant = self.provider.sign_in().await?;
        let identity = grant.identity;

        self.credentials.store(grant.token);
        let persisted = self.load_persisted_role();

        let epoch = self.state.write().sign_in(identity.clone(), persisted);

        tracing::info!(
            session_id = %self.id,
            subject = %identity.subject_id,
            epoch,
            restorable = ?persisted,
            "Signed in"
        );
        self.bus.publish(SessionEvent::SignedIn {
            subject_id: identity.subject_id.clone(),
            epoch,
        });

        Ok(identity)
    }

    /// Signs out.
    ///
    /// Local state, the credential and the persisted selection are cleared
    /// first; a provider failure is returned afterwards.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let epoch = self.state.write().sign_out();
        self.credentials.invalidate();
        self.forget_persisted_role();

        tracing::info!(session_id = %self.id, epoch, "Signed out");
        self.bus.publish(SessionEvent::SignedOut);

        self.provider.sign_out().await?;
        Ok(())
    }

    /// Selects `role`, or clears the selection for [`SelectedRole::None`].
    ///
    /// An ineligible role, or any role without a signed-in identity, is
    /// rejected with no state change.
    pub fn select_role(&self, role: SelectedRole) -> Result<(), SessionError> {
        let change = self.state.write().select_role(role).map_err(|e| {
            tracing::info!(session_id = %self.id, role = %role, error = %e, "Role selection rejected");
            e
        })?;

        match change {
            RoleChange::Cleared => {
                self.forget_persisted_role();
                tracing::info!(session_id = %self.id, "Role cleared");
                self.bus.publish(SessionEvent::RoleCleared);
            }
            RoleChange::Selected(role) => {
                self.persist_role(role);
                tracing::info!(session_id = %self.id, role = %role, "Role selected");
                self.bus.publish(SessionEvent::RoleSelected { role, restored: false });
            }
        }

        Ok(())
    }

    /// Runs a resolution for the current identity and applies it.
    ///
    /// Returns the eligibility in effect afterwards. A result that belongs
    /// to a superseded epoch is discarded.
    pub async fn refresh_eligibility(&self) -> RoleEligibility {
        let (epoch, identity) = {
            let state = self.state.read();
            (state.epoch(), state.identity().cloned())
        };

        let Some(identity) = identity else {
            return self.eligibility();
        };

        let eligibility = self.resolver.resolve(&identity).await;

        let outcome = self.state.write().apply_eligibility(epoch, eligibility.clone());

        match outcome {
            ApplyOutcome::Stale => {
                tracing::debug!(session_id = %self.id, epoch, "Discarding stale eligibility");
            }
            ApplyOutcome::Applied { restored, discarded } => {
                tracing::debug!(
                    session_id = %self.id,
                    epoch,
                    outcome = %eligibility.outcome(),
                    "Eligibility applied"
                );
                self.bus.publish(SessionEvent::EligibilityUpdated { epoch, eligibility });

                if let Some(role) = discarded {
                    self.forget_persisted_role();
                    tracing::info!(session_id = %self.id, role = %role, "Persisted role no longer permitted");
                }
                if let Some(role) = restored {
                    tracing::info!(session_id = %self.id, role = %role, "Role restored");
                    self.bus.publish(SessionEvent::RoleSelected { role, restored: true });
                }
            }
        }

        self.eligibility()
    }

    /// Asks the eligibility watcher to run a resolution.
    pub fn request_recompute(&self) {
        self.bus.publish(SessionEvent::RecomputeRequested);
    }

    /// Spawns a watcher that recomputes eligibility on session events.
    pub fn spawn_watcher(self: &Arc<Self>) -> EligibilityWatcher {
        EligibilityWatcher::spawn(self)
    }

    fn load_persisted_role(&self) -> Option<SelectedRole> {
        let value = match self.durable.get(SELECTED_ROLE_KEY) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(store = self.durable.name(), error = %e, "Failed to read persisted role");
                return None;
            }
        };

        match SelectedRole::parse(&value) {
            Some(role) => Some(role),
            None => {
                tracing::warn!(value = %value, "Ignoring unknown persisted role");
                None
            }
        }
    }

    fn persist_role(&self, role: SelectedRole) {
        if let Err(e) = self.durable.set(SELECTED_ROLE_KEY, role.as_str()) {
            tracing::warn!(store = self.durable.name(), error = %e, "Failed to persist selected role");
        }
    }

    fn forget_persisted_role(&self) {
        if let Err(e) = self.durable.remove(SELECTED_ROLE_KEY) {
            tracing::warn!(store = self.durable.name(), error = %e, "Failed to remove persisted role");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("phase", &state.phase())
            .field("epoch", &state.epoch())
            .field("provider", &self.provider.name())
            .field("durable", &self.durable.name())
            .finish()
    }
}

// =============================================================================
// SessionBuilder
// =============================================================================

/// Builder for [`Session`].
pub struct SessionBuilder {
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn DirectoryApi>,
    session_store: Arc<dyn KeyValueStore>,
    durable_store: Arc<dyn KeyValueStore>,
    catalog: Arc<PrivilegeCatalog>,
    retry: RetryPolicy,
    bus: SessionBus,
}

impl SessionBuilder {
    /// Creates a builder with in-memory stores and default policies.
    pub fn new(provider: Arc<dyn IdentityProvider>, directory: Arc<dyn DirectoryApi>) -> Self {
        Self {
            provider,
            directory,
            session_store: Arc::new(MemoryStore::new()),
            durable_store: Arc::new(MemoryStore::new()),
            catalog: Arc::new(PrivilegeCatalog::delegated_admin()),
            retry: RetryPolicy::default(),
            bus: SessionBus::default(),
        }
    }

    /// Sets the session-scoped store holding the access token.
    pub fn session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session_store = store;
        self
    }

    /// Sets the durable store holding the selected role.
    pub fn durable_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable_store = store;
        self
    }

    /// Sets the privilege catalog.
    pub fn catalog(mut self, catalog: PrivilegeCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Sets the retry policy for directory calls.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the event bus.
    pub fn bus(mut self, bus: SessionBus) -> Self {
        self.bus = bus;
        self
    }

    /// Builds the session.
    pub fn build(self) -> Arc<Session> {
        let credentials = Arc::new(
            CredentialStore::new(self.provider.clone(), self.session_store).with_bus(self.bus.clone()),
        );
        let resolver = EligibilityResolver::new(self.directory, credentials.clone(), self.catalog)
            .with_retry_policy(self.retry);

        let session = Arc::new(Session {
            id: Uuid::now_v7(),
            state: RwLock::new(RoleSelector::new()),
            credentials,
            resolver,
            provider: self.provider,
            durable: self.durable_store,
            bus: self.bus,
        });

        tracing::debug!(session_id = %session.id, "Session created");
        session
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("provider", &self.provider.name())
            .field("directory", &self.directory.name())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
