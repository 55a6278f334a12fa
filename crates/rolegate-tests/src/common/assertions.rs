// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Domain-specific assertion helpers with informative failure messages.

use std::time::Duration;

use tokio::time::Instant;

use rolegate_core::bus::{SessionEvent, SessionSubscriber};
use rolegate_core::types::{CheckOutcome, Privilege, RoleEligibility, REAUTH_REQUIRED};

// =============================================================================
// Eligibility Assertions
// =============================================================================

/// Assertion extensions for [`RoleEligibility`].
pub trait EligibilityAssertions {
    /// Assert `{true, true, []}`.
    fn assert_super_admin(&self);

    /// Assert `{false, true, []}`.
    fn assert_delegated_only(&self);

    /// Assert a verified `{false, false, missing}`.
    fn assert_missing(&self, missing: &[Privilege]);

    /// Assert `{false, false, [REAUTH_REQUIRED]}`.
    fn assert_reauth_required(&self);

    /// Assert a failed check: `{false, false, []}`.
    fn assert_check_failed(&self);

    /// Assert `is_super_admin ⇒ is_delegated_admin`.
    fn assert_consistent(&self);
}

impl EligibilityAssertions for RoleEligibility {
    fn assert_super_admin(&self) {
        assert!(
            self.is_super_admin() && self.is_delegated_admin() && self.missing_privileges().is_empty(),
            "Expected super admin eligibility, got {:?}",
            self
        );
        assert_eq!(self.outcome(), CheckOutcome::Verified);
    }

    fn assert_delegated_only(&self) {
        assert!(
            !self.is_super_admin() && self.is_delegated_admin() && self.missing_privileges().is_empty(),
            "Expected delegated-only eligibility, got {:?}",
            self
        );
        assert_eq!(self.outcome(), CheckOutcome::Verified);
    }

    fn assert_missing(&self, missing: &[Privilege]) {
        let mut expected = missing.to_vec();
        expected.sort();
        assert!(
            !self.is_super_admin() && !self.is_delegated_admin(),
            "Expected no elevated role, got {:?}",
            self
        );
        assert_eq!(self.missing_privileges(), expected.as_slice(), "Unexpected missing privileges");
        assert_eq!(self.outcome(), CheckOutcome::Verified);
    }

    fn assert_reauth_required(&self) {
        assert!(
            !self.is_super_admin() && !self.is_delegated_admin(),
            "Expected fail-closed eligibility, got {:?}",
            self
        );
        assert_eq!(self.missing_privileges().len(), 1, "Expected only the sentinel, got {:?}", self);
        assert_eq!(self.missing_privileges()[0].name, REAUTH_REQUIRED);
        assert_eq!(self.outcome(), CheckOutcome::ReauthRequired);
    }

    fn assert_check_failed(&self) {
        assert!(
            !self.is_super_admin() && !self.is_delegated_admin() && self.missing_privileges().is_empty(),
            "Expected {{false, false, []}}, got {:?}",
            self
        );
        assert_eq!(self.outcome(), CheckOutcome::CheckFailed);
    }

    fn assert_consistent(&self) {
        assert!(
            !self.is_super_admin() || self.is_delegated_admin(),
            "Super admin without delegated admin: {:?}",
            self
        );
    }
}

// =============================================================================
// Timing Assertions
// =============================================================================

/// Assert that the gaps between consecutive instants strictly increase and
/// the first gap is at least `min_first_gap`.
pub fn assert_increasing_gaps(times: &[Instant], min_first_gap: Duration) {
    assert!(times.len() >= 2, "Need at least two instants, got {}", times.len());

    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1].duration_since(w[0])).collect();
    assert!(
        gaps[0] >= min_first_gap,
        "First gap {:?} shorter than {:?}",
        gaps[0],
        min_first_gap
    );
    for pair in gaps.windows(2) {
        assert!(pair[1] > pair[0], "Gaps are not increasing: {:?}", gaps);
    }
}

// =============================================================================
// Event Assertions
// =============================================================================

/// Drains `subscriber` and returns the kinds of the queued events.
pub fn drain_kinds(subscriber: &mut SessionSubscriber) -> Vec<&'static str> {
    subscriber.drain().iter().map(SessionEvent::kind).collect()
}

/// Assert that `subscriber` has exactly the given queued event kinds.
pub fn assert_event_kinds(subscriber: &mut SessionSubscriber, expected: &[&str]) {
    let kinds = drain_kinds(subscriber);
    assert_eq!(kinds, expected, "Unexpected session events");
}
