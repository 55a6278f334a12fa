// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Resolver Integration Tests
//!
//! Eligibility resolution against the mock directory:
//! - super admin short-circuit, delegated-only and missing privileges
//! - fail-closed results for missing tokens, exhausted retries and 403s
//! - the single token refresh on 401
//! - pagination, de-duplication and concurrent privilege fetches

use std::sync::Arc;
use std::time::Duration;

use rolegate_core::catalog::{PrivilegeCatalog, DIRECTORY_SERVICE};
use rolegate_core::error::DirectoryError;
use rolegate_core::types::{AccessToken, Privilege, RoleEligibility};
use rolegate_session::{CredentialStore, EligibilityResolver, MemoryStore, RefreshOutcome};

use rolegate_tests::prelude::*;

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn test_super_admin_skips_assignments() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .super_admin(IdentityFixtures::ADMIN_KEY)
        .role("r1", PrivilegeFixtures::full_catalog())
        .assign(IdentityFixtures::ADMIN_KEY, &["r1"])
        .build();
    let test = TestSessionBuilder::new(directory).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_super_admin();
    assert_eq!(test.directory.calls(Endpoint::User), 1);
    assert_eq!(test.directory.calls(Endpoint::Assignments), 0);
    assert_eq!(test.directory.calls(Endpoint::Privileges), 0);
}

#[tokio::test]
async fn test_full_catalog_is_delegated_only() {
    init_test_logging();
    let test = TestSessionBuilder::new(delegated_admin_directory()).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_delegated_only();
    assert_eq!(test.directory.role_ids_seen(), vec!["role-delegated".to_string()]);
}

#[tokio::test]
async fn test_missing_privilege_is_reported() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .role("r1", PrivilegeFixtures::catalog_without("USERS_RETRIEVE"))
        .assign(IdentityFixtures::ADMIN_KEY, &["r1"])
        .build();
    let test = TestSessionBuilder::new(directory).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_missing(&[Privilege::new("USERS_RETRIEVE", DIRECTORY_SERVICE)]);
}

#[tokio::test]
async fn test_no_assignments_misses_whole_catalog() {
    init_test_logging();
    let test = TestSessionBuilder::new(DirectoryBuilder::new().build()).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_missing(&PrivilegeFixtures::full_catalog());
    assert_eq!(test.directory.calls(Endpoint::Privileges), 0);
}

#[tokio::test]
async fn test_wrong_scope_does_not_count() {
    init_test_logging();
    let mut privileges = PrivilegeFixtures::catalog_without("USERS_RETRIEVE");
    privileges.push(PrivilegeFixtures::users_retrieve_wrong_scope());
    privileges.push(PrivilegeFixtures::unrelated());

    let directory = DirectoryBuilder::new()
        .role("r1", privileges)
        .assign(IdentityFixtures::ADMIN_KEY, &["r1"])
        .build();
    let test = TestSessionBuilder::new(directory).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_missing(&[Privilege::new("USERS_RETRIEVE", DIRECTORY_SERVICE)]);
}

#[tokio::test]
async fn test_custom_catalog() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .role("r1", vec![PrivilegeFixtures::manage_devices()])
        .assign(IdentityFixtures::ADMIN_KEY, &["r1"])
        .build();
    let test = TestSessionBuilder::new(directory)
        .catalog(PrivilegeCatalog::from_entries([PrivilegeFixtures::manage_devices()]))
        .build();

    test.sign_in_and_resolve().await.assert_delegated_only();
}

// =============================================================================
// Order Invariance And Idempotence
// =============================================================================

#[tokio::test]
async fn test_result_independent_of_assignment_order() {
    init_test_logging();
    let (first_half, second_half) = PrivilegeFixtures::catalog_halves();

    let mut results = Vec::new();
    for order in [["a", "b"], ["b", "a"]] {
        let directory = DirectoryBuilder::new()
            .role("a", first_half.clone())
            .role("b", second_half.clone())
            .assign(IdentityFixtures::ADMIN_KEY, &order)
            .build();
        let test = TestSessionBuilder::new(directory).build();
        results.push(test.sign_in_and_resolve().await);
    }

    results[0].assert_delegated_only();
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_partial_roles_union_in_any_order() {
    init_test_logging();
    let (first_half, second_half) = PrivilegeFixtures::catalog_halves();
    let missing = first_half[0].clone();

    let mut results = Vec::new();
    for order in [["a", "b"], ["b", "a"]] {
        let directory = DirectoryBuilder::new()
            .role("a", first_half[1..].to_vec())
            .role("b", second_half.clone())
            .assign(IdentityFixtures::ADMIN_KEY, &order)
            .build();
        let test = TestSessionBuilder::new(directory).build();
        results.push(test.sign_in_and_resolve().await);
    }

    results[0].assert_missing(&[missing]);
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .role("r1", PrivilegeFixtures::catalog_without("REPORTS_ACCESS"))
        .assign(IdentityFixtures::ADMIN_KEY, &["r1"])
        .build();
    let test = TestSessionBuilder::new(directory).build();
    let identity = test.session.sign_in().await.unwrap();

    let first = test.session.resolver().resolve(&identity).await;
    let second = test.session.resolver().resolve(&identity).await;

    assert_eq!(first, second);
    assert_eq!(test.directory.calls(Endpoint::User), 2);
}

// =============================================================================
// Fail-Closed Results
// =============================================================================

#[tokio::test]
async fn test_missing_token_requires_reauth_without_calls() {
    init_test_logging();
    let directory = delegated_admin_directory();
    let provider = Arc::new(MockIdentityProvider::default());
    let credentials = Arc::new(CredentialStore::new(provider, Arc::new(MemoryStore::new())));
    let resolver = EligibilityResolver::new(
        directory.clone(),
        credentials,
        Arc::new(PrivilegeCatalog::delegated_admin()),
    );

    let eligibility = resolver.resolve(&IdentityFixtures::admin()).await;

    eligibility.assert_reauth_required();
    assert_eq!(directory.total_calls(), 0);
}

#[tokio::test]
async fn test_no_identity_is_unauthenticated() {
    init_test_logging();
    let test = TestSessionBuilder::new(delegated_admin_directory()).build();

    let eligibility = test.session.resolver().resolve_for(None).await;

    assert_eq!(eligibility, RoleEligibility::unauthenticated());
    assert_eq!(test.directory.total_calls(), 0);
}

#[tokio::test]
async fn test_invalidated_token_requires_reauth() {
    init_test_logging();
    let test = TestSessionBuilder::new(delegated_admin_directory()).build();
    test.session.sign_in().await.unwrap();
    test.session.credentials().invalidate();

    let eligibility = test.session.refresh_eligibility().await;

    eligibility.assert_reauth_required();
    assert_eq!(test.directory.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_closed() {
    init_test_logging();
    let directory = delegated_admin_directory();
    directory.fail_times(Endpoint::Privileges, 3, DirectoryError::rate_limited());
    let test = TestSessionBuilder::new(directory)
        .retry(RetryFixtures::deterministic())
        .build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_check_failed();
    assert_eq!(test.directory.calls(Endpoint::Privileges), 3);
    assert_increasing_gaps(
        &test.directory.call_times(Endpoint::Privileges),
        Duration::from_millis(1000),
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers() {
    init_test_logging();
    let directory = delegated_admin_directory();
    directory.fail_times(Endpoint::Assignments, 2, DirectoryError::server(503, "unavailable"));
    let test = TestSessionBuilder::new(directory)
        .retry(RetryFixtures::deterministic())
        .build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_delegated_only();
    assert_eq!(test.directory.calls(Endpoint::Assignments), 3);

    let retry = test.session.snapshot().retry;
    assert_eq!(retry.retry_success, 1);
    assert_eq!(retry.total_retries, 2);
    assert_eq!(retry.exhausted, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_for_retry_after() {
    init_test_logging();
    let directory = delegated_admin_directory();
    directory.fail_next(
        Endpoint::User,
        DirectoryError::from_status(429, "quota", Some(Duration::from_secs(5))),
    );
    let test = TestSessionBuilder::new(directory)
        .retry(RetryFixtures::deterministic())
        .build();

    test.sign_in_and_resolve().await.assert_delegated_only();

    let calls = test.directory.call_times(Endpoint::User);
    assert_eq!(calls.len(), 2);
    assert!(calls[1] - calls[0] >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_forbidden_fails_closed_without_retry() {
    init_test_logging();
    let directory = delegated_admin_directory();
    directory.fail_next(Endpoint::User, DirectoryError::forbidden("caller lacks directory read"));
    let test = TestSessionBuilder::new(directory).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_check_failed();
    assert_eq!(test.directory.calls(Endpoint::User), 1);
    assert_eq!(test.directory.calls(Endpoint::Assignments), 0);
}

#[tokio::test]
async fn test_unknown_role_fails_closed() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .role("r1", PrivilegeFixtures::full_catalog())
        .assign(IdentityFixtures::ADMIN_KEY, &["r1", "deleted-role"])
        .build();
    let test = TestSessionBuilder::new(directory).build();

    test.sign_in_and_resolve().await.assert_check_failed();
}

// =============================================================================
// Token Refresh
// =============================================================================

#[tokio::test]
async fn test_unauthorized_refreshes_once_and_succeeds() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .role("role-delegated", PrivilegeFixtures::full_catalog())
        .assign(IdentityFixtures::ADMIN_KEY, &["role-delegated"])
        .accept_only(&["token-2"])
        .build();
    let test = TestSessionBuilder::new(directory).build();
    test.provider.push_silent(RefreshOutcome::Token(AccessToken::new("token-2")));

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_delegated_only();
    assert_eq!(test.provider.silent_calls(), 1);
    assert_eq!(test.provider.interactive_calls(), 0);
    assert_eq!(
        test.directory.tokens_seen(),
        vec!["token-1", "token-2", "token-2", "token-2"]
    );
    assert_eq!(
        test.session.credentials().acquire().map(|t| t.expose().to_string()),
        Some("token-2".to_string())
    );
}

#[tokio::test]
async fn test_interactive_refresh_after_silent_cancel() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .super_admin(IdentityFixtures::ADMIN_KEY)
        .accept_only(&["token-2"])
        .build();
    let test = TestSessionBuilder::new(directory).build();
    test.provider.push_interactive(RefreshOutcome::Token(AccessToken::new("token-2")));

    test.sign_in_and_resolve().await.assert_super_admin();
    assert_eq!(test.provider.silent_calls(), 1);
    assert_eq!(test.provider.interactive_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_refresh_requires_reauth() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .super_admin(IdentityFixtures::ADMIN_KEY)
        .accept_only(&["token-2"])
        .build();
    let test = TestSessionBuilder::new(directory).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_reauth_required();
    assert_eq!(test.directory.calls(Endpoint::User), 1);
    assert_eq!(test.provider.silent_calls(), 1);
    assert_eq!(test.provider.interactive_calls(), 1);
}

#[tokio::test]
async fn test_second_unauthorized_fails_closed() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .super_admin(IdentityFixtures::ADMIN_KEY)
        .accept_only(&["token-3"])
        .build();
    let test = TestSessionBuilder::new(directory).build();
    test.provider.push_silent(RefreshOutcome::Token(AccessToken::new("token-2")));

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_check_failed();
    assert_eq!(test.directory.tokens_seen(), vec!["token-1", "token-2"]);
    assert_eq!(test.provider.silent_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_unauthorized_reuses_refreshed_token() {
    init_test_logging();
    let (first_half, second_half) = PrivilegeFixtures::catalog_halves();
    let directory = DirectoryBuilder::new()
        .role("a", first_half)
        .role("b", second_half)
        .slow_role("b", Duration::from_millis(100))
        .assign(IdentityFixtures::ADMIN_KEY, &["a", "b"])
        .reject_at(Endpoint::Privileges, "token-1")
        .build();
    let test = TestSessionBuilder::new(directory).build();
    test.provider.set_refresh_delay(Duration::from_millis(10));
    test.provider.push_interactive(RefreshOutcome::Token(AccessToken::new("token-2")));

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_delegated_only();
    assert_eq!(test.provider.silent_calls(), 1);
    assert_eq!(test.provider.interactive_calls(), 1, "user prompted twice");
    assert_eq!(test.directory.calls(Endpoint::Privileges), 4);
    assert_eq!(
        test.session.credentials().acquire().map(|t| t.expose().to_string()),
        Some("token-2".to_string())
    );
}

// =============================================================================
// Pagination And Concurrency
// =============================================================================

#[tokio::test]
async fn test_assignment_pages_are_followed_and_deduplicated() {
    init_test_logging();
    let (first_half, second_half) = PrivilegeFixtures::catalog_halves();
    let directory = DirectoryBuilder::new()
        .role("a", first_half)
        .role("b", second_half)
        .role("c", vec![PrivilegeFixtures::unrelated()])
        .assign_pages(IdentityFixtures::ADMIN_KEY, vec![vec!["a"], vec!["b", "a"], vec!["c"]])
        .build();
    let test = TestSessionBuilder::new(directory).build();

    let eligibility = test.sign_in_and_resolve().await;

    eligibility.assert_delegated_only();
    assert_eq!(
        test.directory.page_tokens_seen(),
        vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
    );
    let mut fetched = test.directory.role_ids_seen();
    fetched.sort();
    assert_eq!(fetched, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_privileges_are_fetched_concurrently() {
    init_test_logging();
    let directory = DirectoryBuilder::new()
        .role("a", PrivilegeFixtures::catalog_halves().0)
        .role("b", PrivilegeFixtures::catalog_halves().1)
        .role("c", vec![PrivilegeFixtures::unrelated()])
        .assign(IdentityFixtures::ADMIN_KEY, &["a", "b", "c"])
        .build();
    let test = TestSessionBuilder::new(directory.clone()).build();
    test.session.sign_in().await.unwrap();

    directory.hold();
    let session = test.session.clone();
    let task = tokio::spawn(async move { session.refresh_eligibility().await });

    // user lookup and the single assignments page
    directory.release(2);
    let all_held = wait_until(Duration::from_secs(5), || {
        directory.calls(Endpoint::Privileges) == 3 && directory.in_flight() == 3
    })
    .await;
    assert!(all_held, "privilege fetches did not overlap");

    directory.open();
    task.await.unwrap().assert_delegated_only();
}
