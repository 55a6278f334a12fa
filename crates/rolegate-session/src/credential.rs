// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Credential store.
//!
//! Holds the access token for the signed-in identity and is the only place
//! that writes it. The token lives in memory with a copy in the
//! session-scoped key/value store.
//!
//! # Refresh
//!
//! ```text
//!  refresh_after(rejected) ──► lock ──► current != rejected? ──yes──► return current
//!                                          │ no
//!                                          ▼
//!                               already declined? ──yes──► None
//!                                          │ no
//!                                          ▼
//!                     silent_refresh() ──Token──► install
//!                              │ Cancelled
//!                              ▼
//!                   interactive_refresh() ──Token──► install
//!                              │ Cancelled
//!                              ▼
//!                    record declined, None
//! ```
//!
//! Concurrent refreshes are serialized so the provider prompts at most once
//! per rejected token. Callers whose token was already replaced reuse the
//! new one; callers whose token was already declined get `None`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use rolegate_core::bus::{SessionBus, SessionEvent};
use rolegate_core::types::{AccessToken, Credential};

use crate::provider::IdentityProvider;
use crate::storage::{KeyValueStore, ACCESS_TOKEN_KEY};

#[derive(Default)]
struct RefreshState {
    /// Token whose refresh was declined, and the generation it was current at.
    declined: Option<(u64, AccessToken)>,
}

/// Owner of the session's bearer credential.
pub struct CredentialStore {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn KeyValueStore>,
    current: RwLock<Option<Credential>>,
    /// Bumped on every install or invalidation, always under `current`'s
    /// write lock.
    generation: AtomicU64,
    refresh_lock: Mutex<RefreshState>,
    bus: Option<SessionBus>,
}

impl CredentialStore {
    /// Creates a store backed by `storage` that refreshes through `provider`.
    pub fn new(provider: Arc<dyn IdentityProvider>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            provider,
            storage,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(RefreshState::default()),
            bus: None,
        }
    }

    /// Publishes `CredentialChanged` events on `bus`.
    pub fn with_bus(mut self, bus: SessionBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Returns the current token without any network I/O.
    ///
    /// Checks memory first, then the session store. A token found in the
    /// store is hydrated into memory. Storage failures count as "no token".
    pub fn acquire(&self) -> Option<AccessToken> {
        if let Some(credential) = self.current.read().as_ref() {
            return Some(credential.access_token.clone());
        }

        let stored = match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    store = self.storage.name(),
                    error = %e,
                    "Failed to read persisted access token"
                );
                None
            }
        };

        let token = AccessToken::new(stored?);
        if token.is_empty() {
            return None;
        }

        let mut current = self.current.write();
        match current.as_ref() {
            Some(credential) => Some(credential.access_token.clone()),
            None => {
                tracing::debug!("Hydrated access token from session store");
                *current = Some(Credential::new(token.clone()));
                Some(token)
            }
        }
    }

    /// Returns the in-memory credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    /// Returns `true` if a token is held in memory.
    pub fn has_token(&self) -> bool {
        self.current.read().is_some()
    }

    /// Obtains a new token from the provider.
    ///
    /// Tries the silent flow, then the interactive one. Returns `None` if
    /// both were cancelled, or if the credential was invalidated while the
    /// provider was working.
    pub async fn refresh(&self) -> Option<AccessToken> {
        let observed = self.generation.load(Ordering::Acquire);
        let _state = self.refresh_lock.lock().await;

        let started = self.generation.load(Ordering::Acquire);
        if started != observed {
            if let Some(token) = self.current_token() {
                tracing::debug!("Reusing token from concurrent refresh");
                return Some(token);
            }
        }

        self.run_refresh(started).await
    }

    /// Obtains a replacement for `rejected`, a token the directory refused.
    ///
    /// Returns the current token without calling the provider if it already
    /// differs from `rejected`. Returns `None` without prompting if a refresh
    /// for `rejected` was already declined, or if no credential is held.
    pub async fn refresh_after(&self, rejected: &AccessToken) -> Option<AccessToken> {
        let mut state = self.refresh_lock.lock().await;
        let started = self.generation.load(Ordering::Acquire);

        match self.current_token() {
            None => {
                tracing::debug!("Credential cleared, not refreshing");
                return None;
            }
            Some(current) if current != *rejected => {
                tracing::debug!("Reusing token from concurrent refresh");
                return Some(current);
            }
            Some(_) => {}
        }

        if let Some((generation, declined)) = &state.declined {
            if *generation == started && declined == rejected {
                tracing::debug!("Refresh already declined for this token");
                return None;
            }
        }

        let token = self.run_refresh(started).await;
        if token.is_none() {
            state.declined = Some((started, rejected.clone()));
        }
        token
    }

    fn current_token(&self) -> Option<AccessToken> {
        self.current
            .read()
            .as_ref()
            .map(|credential| credential.access_token.clone())
    }

    /// Runs the provider flows; the caller holds `refresh_lock`.
    async fn run_refresh(&self, started: u64) -> Option<AccessToken> {
        let token = match self.provider.silent_refresh().await.into_token() {
            Some(token) => Some(token),
            None => {
                tracing::debug!(
                    provider = self.provider.name(),
                    "Silent refresh unavailable, falling back to interactive"
                );
                self.provider.interactive_refresh().await.into_token()
            }
        };

        let Some(token) = token else {
            tracing::warn!(provider = self.provider.name(), "Token refresh cancelled");
            return None;
        };

        if self.install_if(started, token.clone()) {
            tracing::info!(provider = self.provider.name(), "Access token refreshed");
            Some(token)
        } else {
            tracing::debug!("Discarding refreshed token, credential changed during refresh");
            None
        }
    }

    /// Installs `token` as the current credential.
    pub fn store(&self, token: AccessToken) {
        let mut current = self.current.write();
        self.replace(&mut current, Some(Credential::new(token)));
    }

    /// Clears the credential from memory and the session store.
    pub fn invalidate(&self) {
        let mut current = self.current.write();
        self.replace(&mut current, None);
    }

    fn install_if(&self, expected_generation: u64, token: AccessToken) -> bool {
        let mut current = self.current.write();
        if self.generation.load(Ordering::Acquire) != expected_generation {
            return false;
        }
        self.replace(&mut current, Some(Credential::new(token)));
        true
    }

    fn replace(&self, slot: &mut Option<Credential>, credential: Option<Credential>) {
        let persisted = match &credential {
            Some(credential) => self
                .storage
                .set(ACCESS_TOKEN_KEY, credential.access_token.expose()),
            None => self.storage.remove(ACCESS_TOKEN_KEY),
        };
        if let Err(e) = persisted {
            tracing::warn!(
                store = self.storage.name(),
                error = %e,
                "Failed to persist access token"
            );
        }

        let present = credential.is_some();
        *slot = credential;
        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Some(bus) = &self.bus {
            bus.publish(SessionEvent::CredentialChanged { present });
        }
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("provider", &self.provider.name())
            .field("storage", &self.storage.name())
            .field("has_token", &self.has_token())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{RefreshOutcome, SignInGrant};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use rolegate_core::error::ProviderError;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedProvider {
        silent: parking_lot::Mutex<VecDeque<RefreshOutcome>>,
        interactive: parking_lot::Mutex<VecDeque<RefreshOutcome>>,
        silent_calls: AtomicU32,
        interactive_calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn silent(self, outcome: RefreshOutcome) -> Self {
            self.silent.lock().push_back(outcome);
            self
        }

        fn interactive(self, outcome: RefreshOutcome) -> Self {
            self.interactive.lock().push_back(outcome);
            self
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn sign_in(&self) -> Result<SignInGrant, ProviderError> {
            Err(ProviderError::Cancelled)
        }

        async fn sign_out(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn silent_refresh(&self) -> RefreshOutcome {
            self.silent_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.silent.lock().pop_front().unwrap_or(RefreshOutcome::Cancelled)
        }

        async fn interactive_refresh(&self) -> RefreshOutcome {
            self.interactive_calls.fetch_add(1, Ordering::SeqCst);
            self.interactive.lock().pop_front().unwrap_or(RefreshOutcome::Cancelled)
        }
    }

    fn token(value: &str) -> RefreshOutcome {
        RefreshOutcome::Token(AccessToken::new(value))
    }

    #[test]
    fn test_acquire_hydrates_from_storage() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(ACCESS_TOKEN_KEY, "persisted").unwrap();

        let store = CredentialStore::new(Arc::new(ScriptedProvider::default()), storage);
        assert!(!store.has_token());
        assert_eq!(store.acquire(), Some(AccessToken::new("persisted")));
        assert!(store.has_token());
    }

    #[test]
    fn test_acquire_without_token() {
        let store = CredentialStore::new(
            Arc::new(ScriptedProvider::default()),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(store.acquire(), None);
    }

    #[test]
    fn test_store_and_invalidate_persist() {
        let storage = Arc::new(MemoryStore::new());
        let bus = SessionBus::new(8);
        let mut events = bus.subscribe();
        let store = CredentialStore::new(Arc::new(ScriptedProvider::default()), storage.clone())
            .with_bus(bus);

        store.store(AccessToken::new("t1"));
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("t1"));

        store.invalidate();
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.acquire(), None);

        assert_eq!(
            events.drain(),
            vec![
                SessionEvent::CredentialChanged { present: true },
                SessionEvent::CredentialChanged { present: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_prefers_silent() {
        let provider = Arc::new(ScriptedProvider::default().silent(token("silent")));
        let store = CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(store.refresh().await, Some(AccessToken::new("silent")));
        assert_eq!(provider.interactive_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.acquire(), Some(AccessToken::new("silent")));
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_interactive() {
        let provider = Arc::new(ScriptedProvider::default().interactive(token("prompted")));
        let store = CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(store.refresh().await, Some(AccessToken::new("prompted")));
        assert_eq!(provider.silent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.interactive_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_cancelled_keeps_old_token() {
        let store = CredentialStore::new(
            Arc::new(ScriptedProvider::default()),
            Arc::new(MemoryStore::new()),
        );
        store.store(AccessToken::new("old"));

        assert_eq!(store.refresh().await, None);
        assert_eq!(store.acquire(), Some(AccessToken::new("old")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_prompt_once() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        }
        .silent(token("fresh")));
        let store = Arc::new(CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new())));

        let (a, b) = tokio::join!(store.refresh(), store.refresh());

        assert_eq!(a, Some(AccessToken::new("fresh")));
        assert_eq!(b, Some(AccessToken::new("fresh")));
        assert_eq!(provider.silent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.interactive_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_reuses_replaced_token() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new()));
        store.store(AccessToken::new("t2"));

        assert_eq!(store.refresh_after(&AccessToken::new("t1")).await, Some(AccessToken::new("t2")));
        assert_eq!(provider.silent_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.interactive_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_without_credential_does_not_prompt() {
        let provider = Arc::new(ScriptedProvider::default().silent(token("unused")));
        let store = CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(store.refresh_after(&AccessToken::new("t1")).await, None);
        assert_eq!(provider.silent_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.acquire(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_refresh_prompts_once() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let store = Arc::new(CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new())));
        store.store(AccessToken::new("t1"));
        let rejected = AccessToken::new("t1");

        let (a, b) = tokio::join!(store.refresh_after(&rejected), store.refresh_after(&rejected));
        assert_eq!((a, b), (None, None));

        // a later 401 for the same token stays declined
        assert_eq!(store.refresh_after(&rejected).await, None);
        assert_eq!(provider.silent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.interactive_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.acquire(), Some(AccessToken::new("t1")));
    }

    #[tokio::test]
    async fn test_new_credential_clears_declined_refresh() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = CredentialStore::new(provider.clone(), Arc::new(MemoryStore::new()));
        store.store(AccessToken::new("t1"));
        assert_eq!(store.refresh_after(&AccessToken::new("t1")).await, None);

        store.invalidate();
        store.store(AccessToken::new("t1"));
        assert_eq!(store.refresh_after(&AccessToken::new("t1")).await, None);

        assert_eq!(provider.interactive_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_refresh_discards_token() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        }
        .silent(token("late")));
        let store = Arc::new(CredentialStore::new(provider, Arc::new(MemoryStore::new())));

        let refreshing = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.invalidate();

        assert_eq!(refreshing.await.unwrap(), None);
        assert_eq!(store.acquire(), None);
    }
}
