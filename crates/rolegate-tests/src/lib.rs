// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rolegate Integration Tests
//!
//! Integration tests for the rolegate authorization engine, plus the
//! fixtures, mocks and harness they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Identities, privilege sets, config files, retry policies
//!   - `builders`: Builders for mock directories and wired sessions
//!   - `assertions`: Eligibility and event assertions
//!   - `mocks`: Scripted directory, identity provider and failing store
//!   - `harness`: Timeouts, temp directories and `wait_until`
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p rolegate-tests
//!
//! # Run specific test suite
//! cargo test -p rolegate-tests --test integration_resolver
//! cargo test -p rolegate-tests --test integration_session
//! cargo test -p rolegate-tests --test integration_directory
//! ```
//!
//! ## Test Categories
//!
//! ### Core Tests (`integration_core.rs`)
//! - Eligibility invariants, catalog, retry timing, session bus
//!
//! ### Resolver Tests (`integration_resolver.rs`)
//! - Super admin short-circuit, delegated admin, missing privileges
//! - Missing token, 401 refresh, 429 backoff, pagination
//!
//! ### Session Tests (`integration_session.rs`)
//! - Role selection, persistence and restore
//! - Role-change guard against in-flight resolutions
//! - Sign-out, watcher
//!
//! ### Directory Tests (`integration_directory.rs`)
//! - HTTP client against an in-process axum server
//!
//! ### Config Tests (`integration_config.rs`)
//! - File loading, environment overrides, runtime wiring
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use rolegate_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let directory = DirectoryBuilder::new().super_admin(IdentityFixtures::ADMIN_KEY).build();
//!     let test = TestSessionBuilder::new(directory).build();
//!     test.session.sign_in().await.unwrap();
//!     test.session.refresh_eligibility().await.assert_super_admin();
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::builders::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
