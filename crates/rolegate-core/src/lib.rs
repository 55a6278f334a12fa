// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rolegate-core
//!
//! Core abstractions and shared types for the rolegate delegated-administration
//! authorization engine.
//!
//! This crate provides the foundational types used across all rolegate
//! components:
//!
//! - **Types**: `Identity`, `AccessToken`, `Credential`, `Privilege`,
//!   `RoleEligibility`, `SelectedRole`
//! - **Error**: Authorization taxonomy plus directory, provider and storage errors
//! - **Catalog**: The privilege catalog required for delegated-admin eligibility
//! - **Retry**: Exponential backoff with additive jitter
//! - **Bus**: Broadcast bus carrying session change events
//!
//! ## Example
//!
//! ```rust,ignore
//! use rolegate_core::catalog::{PrivilegeCatalog, PrivilegeSet};
//!
//! let catalog = PrivilegeCatalog::delegated_admin();
//! let held: PrivilegeSet = catalog.iter().cloned().collect();
//! assert!(catalog.missing_from(&held).is_empty());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod types;

// =============================================================================
// Authorization Modules
// =============================================================================

pub mod catalog;
pub mod retry;

// =============================================================================
// Event Modules
// =============================================================================

pub mod bus;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use types::*;

pub use catalog::{PrivilegeCatalog, PrivilegeSet};

pub use retry::{
    ExponentialBackoff, NoRetry, RetryConfig, RetryDecision, RetryMetrics, RetryMetricsSnapshot,
    RetryObserver, RetryPolicy, RetryStrategy, Retryable,
};

pub use bus::{BusStats, SessionBus, SessionEnvelope, SessionEvent, SessionSubscriber, DEFAULT_BUS_CAPACITY};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
