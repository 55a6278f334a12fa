// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! - [`MockDirectory`]: in-memory directory with scripted failures, call
//!   counters, call timestamps and an optional gate that holds calls.
//! - [`MockIdentityProvider`]: queued sign-in and refresh outcomes.
//! - [`FailingStore`]: a key/value store whose every operation fails.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use rolegate_core::error::{DirectoryError, ProviderError, StorageError};
use rolegate_core::types::{AccessToken, Identity, Privilege};
use rolegate_directory::{AssignmentPage, DirectoryApi, RoleAssignment};
use rolegate_session::{IdentityProvider, KeyValueStore, RefreshOutcome, SignInGrant};

use super::fixtures::IdentityFixtures;

// =============================================================================
// MockDirectory
// =============================================================================

/// Directory endpoints, for scripting and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `users/{userKey}`.
    User,
    /// `roleassignments?userKey=`.
    Assignments,
    /// `roles/{roleId}`.
    Privileges,
}

#[derive(Debug, Default)]
struct DirectoryState {
    super_admins: HashSet<String>,
    assignment_pages: HashMap<String, Vec<Vec<String>>>,
    roles: HashMap<String, Vec<Privilege>>,
    accepted_tokens: Option<HashSet<String>>,
    rejected_tokens: HashMap<Endpoint, HashSet<String>>,
    role_delays: HashMap<String, Duration>,
    failures: HashMap<Endpoint, VecDeque<DirectoryError>>,
    calls: HashMap<Endpoint, Vec<Instant>>,
    tokens_seen: Vec<String>,
    page_tokens_seen: Vec<Option<String>>,
    role_ids_seen: Vec<String>,
}

/// An in-memory [`DirectoryApi`].
///
/// Unknown users are not super admins and have no assignments; unknown
/// roles are `NotFound`.
#[derive(Debug, Default)]
pub struct MockDirectory {
    state: Mutex<DirectoryState>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    in_flight: AtomicUsize,
}

impl MockDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `user_key` as super admin (or not).
    pub fn set_super_admin(&self, user_key: &str, is_admin: bool) {
        let mut state = self.state.lock();
        if is_admin {
            state.super_admins.insert(user_key.to_string());
        } else {
            state.super_admins.remove(user_key);
        }
    }

    /// Assigns `role_ids` to `user_key` on a single page.
    pub fn set_assignments(&self, user_key: &str, role_ids: &[&str]) {
        self.set_assignment_pages(user_key, vec![role_ids.to_vec()]);
    }

    /// Assigns roles to `user_key` split over several pages.
    pub fn set_assignment_pages(&self, user_key: &str, pages: Vec<Vec<&str>>) {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self.state.lock().assignment_pages.insert(user_key.to_string(), pages);
    }

    /// Defines the privileges of `role_id`.
    pub fn set_role(&self, role_id: &str, privileges: Vec<Privilege>) {
        self.state.lock().roles.insert(role_id.to_string(), privileges);
    }

    /// Rejects every token except `tokens` with 401.
    pub fn accept_only(&self, tokens: &[&str]) {
        self.state.lock().accepted_tokens = Some(tokens.iter().map(|t| t.to_string()).collect());
    }

    /// Rejects `token` with 401 at `endpoint` only.
    pub fn reject_at(&self, endpoint: Endpoint, token: &str) {
        self.state
            .lock()
            .rejected_tokens
            .entry(endpoint)
            .or_default()
            .insert(token.to_string());
    }

    /// Delays every privilege fetch of `role_id` by `delay`.
    pub fn set_role_delay(&self, role_id: &str, delay: Duration) {
        self.state.lock().role_delays.insert(role_id.to_string(), delay);
    }

    /// Makes the next call to `endpoint` fail with `error`.
    pub fn fail_next(&self, endpoint: Endpoint, error: DirectoryError) {
        self.fail_times(endpoint, 1, error);
    }

    /// Makes the next `times` calls to `endpoint` fail with `error`.
    pub fn fail_times(&self, endpoint: Endpoint, times: usize, error: DirectoryError) {
        let mut state = self.state.lock();
        let queue = state.failures.entry(endpoint).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Holds every subsequent call until [`MockDirectory::release`] or
    /// [`MockDirectory::open`].
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `calls` held calls proceed.
    pub fn release(&self, calls: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(calls);
        }
    }

    /// Removes the gate and lets every held call proceed.
    pub fn open(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.close();
        }
    }

    /// Number of calls currently inside the directory (including held ones).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of calls made to `endpoint`.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state.lock().calls.get(&endpoint).map_or(0, Vec::len)
    }

    /// Number of calls made to any endpoint.
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().map(Vec::len).sum()
    }

    /// When each call to `endpoint` arrived.
    pub fn call_times(&self, endpoint: Endpoint) -> Vec<Instant> {
        self.state.lock().calls.get(&endpoint).cloned().unwrap_or_default()
    }

    /// Every bearer token presented, in order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.state.lock().tokens_seen.clone()
    }

    /// Every page token requested, in order.
    pub fn page_tokens_seen(&self) -> Vec<Option<String>> {
        self.state.lock().page_tokens_seen.clone()
    }

    /// Every role id fetched, in order.
    pub fn role_ids_seen(&self) -> Vec<String> {
        self.state.lock().role_ids_seen.clone()
    }

    /// Records the call, waits at the gate and returns a scripted failure.
    async fn enter(&self, endpoint: Endpoint, token: &AccessToken) -> Result<(), DirectoryError> {
        {
            let mut state = self.state.lock();
            state.calls.entry(endpoint).or_default().push(Instant::now());
            state.tokens_seen.push(token.expose().to_string());
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);

        let mut state = self.state.lock();
        if let Some(accepted) = &state.accepted_tokens {
            if !accepted.contains(token.expose()) {
                return Err(DirectoryError::unauthorized("token rejected"));
            }
        }
        if state
            .rejected_tokens
            .get(&endpoint)
            .is_some_and(|rejected| rejected.contains(token.expose()))
        {
            return Err(DirectoryError::unauthorized("token rejected"));
        }
        match state.failures.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryApi for MockDirectory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_super_admin(&self, token: &AccessToken, user_key: &str) -> Result<bool, DirectoryError> {
        self.enter(Endpoint::User, token).await?;
        Ok(self.state.lock().super_admins.contains(user_key))
    }

    async fn role_assignments(
        &self,
        token: &AccessToken,
        user_key: &str,
        page_token: Option<&str>,
    ) -> Result<AssignmentPage, DirectoryError> {
        self.state.lock().page_tokens_seen.push(page_token.map(str::to_string));
        self.enter(Endpoint::Assignments, token).await?;

        let state = self.state.lock();
        let Some(pages) = state.assignment_pages.get(user_key) else {
            return Ok(AssignmentPage::default());
        };

        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| DirectoryError::from_status(400, format!("bad page token {}", token), None))?,
        };

        let assignments = pages
            .get(index)
            .map(|ids| ids.iter().map(RoleAssignment::new).collect())
            .unwrap_or_default();

        if index + 1 < pages.len() {
            Ok(AssignmentPage::with_next(assignments, format!("page-{}", index + 1)))
        } else {
            Ok(AssignmentPage::last(assignments))
        }
    }

    async fn role_privileges(&self, token: &AccessToken, role_id: &str) -> Result<Vec<Privilege>, DirectoryError> {
        let delay = {
            let mut state = self.state.lock();
            state.role_ids_seen.push(role_id.to_string());
            state.role_delays.get(role_id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.enter(Endpoint::Privileges, token).await?;

        self.state
            .lock()
            .roles
            .get(role_id)
            .cloned()
            .ok_or_else(|| DirectoryError::from_status(404, format!("role {} not found", role_id), None))
    }
}

// =============================================================================
// MockIdentityProvider
// =============================================================================

/// An [`IdentityProvider`] with scripted outcomes.
///
/// Sign-in succeeds with the configured identity and token unless a failure
/// is queued. Refreshes pop queued outcomes and default to `Cancelled`.
#[derive(Debug)]
pub struct MockIdentityProvider {
    identity: Mutex<Identity>,
    token: Mutex<String>,
    sign_in_failures: Mutex<VecDeque<ProviderError>>,
    sign_out_failure: Mutex<Option<ProviderError>>,
    silent: Mutex<VecDeque<RefreshOutcome>>,
    interactive: Mutex<VecDeque<RefreshOutcome>>,
    refresh_delay: Mutex<Duration>,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    silent_calls: AtomicUsize,
    interactive_calls: AtomicUsize,
}

impl MockIdentityProvider {
    /// Creates a provider signing in as `identity` with token `token-1`.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Mutex::new(identity),
            token: Mutex::new("token-1".to_string()),
            sign_in_failures: Mutex::new(VecDeque::new()),
            sign_out_failure: Mutex::new(None),
            silent: Mutex::new(VecDeque::new()),
            interactive: Mutex::new(VecDeque::new()),
            refresh_delay: Mutex::new(Duration::ZERO),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            silent_calls: AtomicUsize::new(0),
            interactive_calls: AtomicUsize::new(0),
        }
    }

    /// Switches the identity returned by the next sign-in.
    pub fn set_identity(&self, identity: Identity) {
        *self.identity.lock() = identity;
    }

    /// Sets the token returned by sign-in.
    pub fn set_token(&self, token: &str) {
        *self.token.lock() = token.to_string();
    }

    /// Makes the next sign-in fail with `error`.
    pub fn fail_next_sign_in(&self, error: ProviderError) {
        self.sign_in_failures.lock().push_back(error);
    }

    /// Makes the next sign-out fail with `error`.
    pub fn fail_next_sign_out(&self, error: ProviderError) {
        *self.sign_out_failure.lock() = Some(error);
    }

    /// Queues a silent refresh outcome.
    pub fn push_silent(&self, outcome: RefreshOutcome) {
        self.silent.lock().push_back(outcome);
    }

    /// Queues an interactive refresh outcome.
    pub fn push_interactive(&self, outcome: RefreshOutcome) {
        self.interactive.lock().push_back(outcome);
    }

    /// Makes every refresh take `delay`.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = delay;
    }

    /// Number of sign-ins attempted.
    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::Acquire)
    }

    /// Number of sign-outs attempted.
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::Acquire)
    }

    /// Number of silent refreshes attempted.
    pub fn silent_calls(&self) -> usize {
        self.silent_calls.load(Ordering::Acquire)
    }

    /// Number of interactive refreshes (prompts) attempted.
    pub fn interactive_calls(&self) -> usize {
        self.interactive_calls.load(Ordering::Acquire)
    }

    async fn delay(&self) {
        let delay = *self.refresh_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new(IdentityFixtures::admin())
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn sign_in(&self) -> Result<SignInGrant, ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::AcqRel);
        if let Some(error) = self.sign_in_failures.lock().pop_front() {
            return Err(error);
        }
        let identity = self.identity.lock().clone();
        let token = AccessToken::new(self.token.lock().clone());
        Ok(SignInGrant::new(identity, token))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::AcqRel);
        match self.sign_out_failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn silent_refresh(&self) -> RefreshOutcome {
        self.silent_calls.fetch_add(1, Ordering::AcqRel);
        self.delay().await;
        self.silent.lock().pop_front().unwrap_or(RefreshOutcome::Cancelled)
    }

    async fn interactive_refresh(&self) -> RefreshOutcome {
        self.interactive_calls.fetch_add(1, Ordering::AcqRel);
        self.delay().await;
        self.interactive.lock().pop_front().unwrap_or(RefreshOutcome::Cancelled)
    }
}

// =============================================================================
// FailingStore
// =============================================================================

/// A [`KeyValueStore`] whose every operation fails with an I/O error.
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    /// Creates a failing store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    fn fail(&self, key: &str) -> StorageError {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        StorageError::io(key, std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
    }
}

impl KeyValueStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Err(self.fail(key))
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(self.fail(key))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Err(self.fail(key))
    }
}
