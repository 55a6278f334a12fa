// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rolegate-session
//!
//! The authorization resolution engine of a delegated-administration
//! console.
//!
//! ## Components
//!
//! - [`CredentialStore`]: Keeps the short-lived bearer token valid
//! - [`EligibilityResolver`]: Diff-matches directory privileges against the
//!   catalog to decide which elevated roles an identity may hold
//! - [`RoleSelector`]: The `NoIdentity → Authenticated → RoleSelected`
//!   state machine with its role-change guard
//! - [`Session`]: The aggregate shared by the composition root
//! - [`EligibilityWatcher`]: Recomputes eligibility on session events
//!
//! ## Example
//!
//! ```rust,ignore
//! use rolegate_session::Session;
//!
//! let session = Session::builder(provider, directory)
//!     .durable_store(Arc::new(FileStore::open("./data")?))
//!     .build();
//! let _watcher = session.spawn_watcher();
//!
//! session.sign_in().await?;
//! let eligibility = session.refresh_eligibility().await;
//! if eligibility.is_delegated_admin() {
//!     session.select_role(SelectedRole::DelegatedAdmin)?;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod credential;
pub mod provider;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod storage;
pub mod watcher;

pub use credential::CredentialStore;
pub use provider::{IdentityProvider, RefreshOutcome, SignInGrant};
pub use resolver::EligibilityResolver;
pub use selector::{ApplyOutcome, RoleChange, RoleGuard, RoleSelector, SessionPhase};
pub use session::{Session, SessionBuilder, SessionSnapshot};
pub use storage::{FileStore, KeyValueStore, MemoryStore, ACCESS_TOKEN_KEY, SELECTED_ROLE_KEY};
pub use watcher::EligibilityWatcher;
