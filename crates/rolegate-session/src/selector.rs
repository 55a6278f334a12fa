// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session role selector state machine.
//!
//! ```text
//!                sign_in                 select_role(r), r permitted
//!  NoIdentity ───────────► Authenticated ─────────────────────────► RoleSelected(r)
//!      ▲                        ▲                                        │
//!      │                        └────────── select_role(None) ◄──────────┘
//!      └──────────── sign_out (from any state) ──────────────────────────┘
//! ```
//!
//! The selector is synchronous and performs no I/O. The session wraps it in
//! a lock and runs resolutions outside of it; [`RoleSelector::apply_eligibility`]
//! is the single point where a resolution result enters the state.
//!
//! Each sign-in or sign-out starts a new epoch. Results tagged with an older
//! epoch are discarded, so a resolution started for a previous identity can
//! never land on the current one.

use serde::Serialize;

use rolegate_core::error::AuthError;
use rolegate_core::types::{Identity, RoleEligibility, SelectedRole};

// =============================================================================
// Phase / Guard
// =============================================================================

/// The externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "role", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Nobody is signed in.
    NoIdentity,
    /// Signed in without an elevated role.
    Authenticated,
    /// Signed in with an elevated role.
    RoleSelected(SelectedRole),
}

impl SessionPhase {
    /// Returns the phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::NoIdentity => "no_identity",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::RoleSelected(_) => "role_selected",
        }
    }
}

/// Guard protecting the selected role while the identity is changing it.
///
/// Set when `select_role(None)` begins; cleared when a concrete role is
/// selected or on sign-out. While set, resolution results still update the
/// eligibility but never touch the selected role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGuard {
    /// No role change in progress.
    #[default]
    Idle,
    /// The identity cleared its role and has not picked a new one.
    Changing,
}

// =============================================================================
// Transition results
// =============================================================================

/// What a successful `select_role` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    /// The role was cleared.
    Cleared,
    /// An elevated role became active.
    Selected(SelectedRole),
}

/// What applying a resolution result did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The result belonged to a superseded epoch and was dropped.
    Stale,
    /// The eligibility was replaced.
    Applied {
        /// A persisted role that was restored as part of this update.
        restored: Option<SelectedRole>,
        /// A persisted role the verified eligibility no longer permits.
        discarded: Option<SelectedRole>,
    },
}

impl ApplyOutcome {
    /// Returns `true` unless the result was stale.
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

// =============================================================================
// RoleSelector
// =============================================================================

/// Identity, eligibility and selected role of the single session.
#[derive(Debug, Clone, Default)]
pub struct RoleSelector {
    epoch: u64,
    identity: Option<Identity>,
    eligibility: RoleEligibility,
    selected: SelectedRole,
    guard: RoleGuard,
    /// Persisted role waiting for an eligibility that permits it.
    restorable: Option<SelectedRole>,
}

impl RoleSelector {
    /// Creates a selector with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SessionPhase {
        match (&self.identity, self.selected) {
            (None, _) => SessionPhase::NoIdentity,
            (Some(_), SelectedRole::None) => SessionPhase::Authenticated,
            (Some(_), role) => SessionPhase::RoleSelected(role),
        }
    }

    /// Returns the current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the signed-in identity.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns the current eligibility.
    pub fn eligibility(&self) -> &RoleEligibility {
        &self.eligibility
    }

    /// Returns the selected role.
    pub fn selected(&self) -> SelectedRole {
        self.selected
    }

    /// Returns the role-change guard.
    pub fn guard(&self) -> RoleGuard {
        self.guard
    }

    /// Returns `true` while a role change is in progress.
    pub fn is_changing_role(&self) -> bool {
        self.guard == RoleGuard::Changing
    }

    /// Returns the persisted role waiting to be restored.
    pub fn restorable(&self) -> Option<SelectedRole> {
        self.restorable
    }

    /// `NoIdentity → Authenticated`. Returns the new epoch.
    ///
    /// `persisted` is the role stored by a previous session; it is restored
    /// once a resolution permits it.
    pub fn sign_in(&mut self, identity: Identity, persisted: Option<SelectedRole>) -> u64 {
        self.epoch += 1;
        self.identity = Some(identity);
        self.eligibility = RoleEligibility::pending();
        self.selected = SelectedRole::None;
        self.guard = RoleGuard::Idle;
        self.restorable = persisted.filter(|role| !role.is_none());
        self.epoch
    }

    /// `any → NoIdentity`. Clears everything, including the guard.
    pub fn sign_out(&mut self) -> u64 {
        self.epoch += 1;
        self.identity = None;
        self.eligibility = RoleEligibility::unauthenticated();
        self.selected = SelectedRole::None;
        self.guard = RoleGuard::Idle;
        self.restorable = None;
        self.epoch
    }

    /// Selects `role`, or clears the selection for [`SelectedRole::None`].
    ///
    /// Fails without changing anything if nobody is signed in or the current
    /// eligibility does not permit `role`.
    pub fn select_role(&mut self, role: SelectedRole) -> Result<RoleChange, AuthError> {
        if self.identity.is_none() {
            return Err(AuthError::Unauthenticated);
        }

        if role.is_none() {
            self.guard = RoleGuard::Changing;
            self.selected = SelectedRole::None;
            self.restorable = None;
            return Ok(RoleChange::Cleared);
        }

        if !self.eligibility.permits(role) {
            return Err(AuthError::ineligible(role));
        }

        self.selected = role;
        self.guard = RoleGuard::Idle;
        self.restorable = None;
        Ok(RoleChange::Selected(role))
    }

    /// Applies a resolution result started in `epoch`.
    ///
    /// Replaces the eligibility. Never overwrites a selected role; restores
    /// the persisted role only when the guard is idle and nothing is
    /// selected.
    pub fn apply_eligibility(&mut self, epoch: u64, eligibility: RoleEligibility) -> ApplyOutcome {
        if epoch != self.epoch || self.identity.is_none() {
            return ApplyOutcome::Stale;
        }

        let mut restored = None;
        let mut discarded = None;

        if self.guard == RoleGuard::Idle && self.selected.is_none() {
            if let Some(role) = self.restorable {
                if eligibility.permits(role) {
                    self.selected = role;
                    self.restorable = None;
                    restored = Some(role);
                } else if eligibility.is_verified() {
                    self.restorable = None;
                    discarded = Some(role);
                }
            }
        }

        self.eligibility = eligibility;
        ApplyOutcome::Applied { restored, discarded }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::types::{CheckOutcome, Privilege};

    fn identity() -> Identity {
        Identity::new("user-1", "user@example.com", "User")
    }

    fn signed_in(eligibility: RoleEligibility) -> RoleSelector {
        let mut selector = RoleSelector::new();
        let epoch = selector.sign_in(identity(), None);
        selector.apply_eligibility(epoch, eligibility);
        selector
    }

    #[test]
    fn test_initial_phase() {
        let selector = RoleSelector::new();
        assert_eq!(selector.phase(), SessionPhase::NoIdentity);
        assert_eq!(selector.eligibility().outcome(), CheckOutcome::Unauthenticated);
    }

    #[test]
    fn test_sign_in_is_authenticated_and_pending() {
        let mut selector = RoleSelector::new();
        let epoch = selector.sign_in(identity(), None);

        assert_eq!(epoch, 1);
        assert_eq!(selector.phase(), SessionPhase::Authenticated);
        assert_eq!(selector.eligibility().outcome(), CheckOutcome::Pending);
    }

    #[test]
    fn test_select_requires_identity() {
        let mut selector = RoleSelector::new();
        assert!(matches!(
            selector.select_role(SelectedRole::SuperAdmin),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_ineligible_selection_changes_nothing() {
        let mut selector = signed_in(RoleEligibility::from_missing(vec![]));
        selector.select_role(SelectedRole::DelegatedAdmin).unwrap();
        let before = selector.clone();

        let result = selector.select_role(SelectedRole::SuperAdmin);

        assert!(matches!(
            result,
            Err(AuthError::IneligibleRole { role: SelectedRole::SuperAdmin })
        ));
        assert_eq!(selector.selected(), before.selected());
        assert_eq!(selector.guard(), before.guard());
        assert_eq!(selector.phase(), SessionPhase::RoleSelected(SelectedRole::DelegatedAdmin));
    }

    #[test]
    fn test_clear_sets_guard_and_select_clears_it() {
        let mut selector = signed_in(RoleEligibility::super_admin());
        selector.select_role(SelectedRole::SuperAdmin).unwrap();

        assert_eq!(selector.select_role(SelectedRole::None).unwrap(), RoleChange::Cleared);
        assert!(selector.is_changing_role());
        assert_eq!(selector.phase(), SessionPhase::Authenticated);

        selector.select_role(SelectedRole::DelegatedAdmin).unwrap();
        assert!(!selector.is_changing_role());
    }

    #[test]
    fn test_stale_epoch_is_discarded() {
        let mut selector = RoleSelector::new();
        let old = selector.sign_in(identity(), None);
        selector.sign_out();
        selector.sign_in(identity(), None);

        assert_eq!(
            selector.apply_eligibility(old, RoleEligibility::super_admin()),
            ApplyOutcome::Stale
        );
        assert_eq!(selector.eligibility().outcome(), CheckOutcome::Pending);
    }

    #[test]
    fn test_apply_never_overwrites_selected_role() {
        let mut selector = signed_in(RoleEligibility::super_admin());
        selector.select_role(SelectedRole::SuperAdmin).unwrap();

        let epoch = selector.epoch();
        selector.apply_eligibility(epoch, RoleEligibility::check_failed());

        assert_eq!(selector.selected(), SelectedRole::SuperAdmin);
        assert!(!selector.eligibility().is_super_admin());
    }

    #[test]
    fn test_restore_after_resolution() {
        let mut selector = RoleSelector::new();
        let epoch = selector.sign_in(identity(), Some(SelectedRole::DelegatedAdmin));

        let outcome = selector.apply_eligibility(epoch, RoleEligibility::from_missing(vec![]));

        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                restored: Some(SelectedRole::DelegatedAdmin),
                discarded: None
            }
        );
        assert_eq!(selector.phase(), SessionPhase::RoleSelected(SelectedRole::DelegatedAdmin));
    }

    #[test]
    fn test_restore_waits_for_verified_answer() {
        let mut selector = RoleSelector::new();
        let epoch = selector.sign_in(identity(), Some(SelectedRole::SuperAdmin));

        selector.apply_eligibility(epoch, RoleEligibility::check_failed());
        assert_eq!(selector.restorable(), Some(SelectedRole::SuperAdmin));

        let outcome = selector.apply_eligibility(
            epoch,
            RoleEligibility::from_missing(vec![Privilege::new("A", "svc")]),
        );
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                restored: None,
                discarded: Some(SelectedRole::SuperAdmin)
            }
        );
        assert_eq!(selector.selected(), SelectedRole::None);
    }

    #[test]
    fn test_guard_blocks_restore_but_not_eligibility() {
        let mut selector = RoleSelector::new();
        let epoch = selector.sign_in(identity(), Some(SelectedRole::SuperAdmin));
        selector.select_role(SelectedRole::None).unwrap();

        let outcome = selector.apply_eligibility(epoch, RoleEligibility::super_admin());

        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                restored: None,
                discarded: None
            }
        );
        assert!(selector.eligibility().is_super_admin());
        assert_eq!(selector.selected(), SelectedRole::None);
    }

    #[test]
    fn test_sign_out_clears_everything() {
        let mut selector = signed_in(RoleEligibility::super_admin());
        selector.select_role(SelectedRole::None).unwrap();
        selector.sign_out();

        assert_eq!(selector.phase(), SessionPhase::NoIdentity);
        assert_eq!(selector.selected(), SelectedRole::None);
        assert_eq!(selector.guard(), RoleGuard::Idle);
        assert!(selector.identity().is_none());
        assert!(!selector.eligibility().is_delegated_admin());
    }
}
