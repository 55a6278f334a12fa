// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # rolegate-directory
//!
//! Access to the organization's directory service, the authority for role
//! assignments and the privileges each role grants.
//!
//! - [`DirectoryApi`]: The three calls the eligibility resolver needs
//! - [`HttpDirectoryClient`]: A `reqwest` implementation over the Admin SDK
//!   REST endpoints
//!
//! Every call takes the caller's bearer token explicitly. The client never
//! stores or refreshes tokens; that is the credential store's job.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod http;

pub use api::{AssignmentPage, DirectoryApi, RoleAssignment};
pub use http::{HttpDirectoryClient, HttpDirectoryConfig};
