// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Background eligibility recomputation.
//!
//! The watcher subscribes to the session bus and runs
//! [`Session::refresh_eligibility`] whenever the session enters
//! `Authenticated` (sign-in, role cleared) or a recompute is requested.
//! Triggers that queue up while a resolution is running are coalesced into
//! one follow-up run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;

use rolegate_core::bus::SessionSubscriber;
use rolegate_core::error::BusError;

use crate::session::Session;

/// Handle to the running watcher task. Dropping it stops the task.
#[derive(Debug)]
pub struct EligibilityWatcher {
    handle: JoinHandle<()>,
    runs: Arc<AtomicU64>,
}

impl EligibilityWatcher {
    /// Spawns a watcher for `session`.
    ///
    /// The task holds only a weak reference, so it ends when the session is
    /// dropped.
    pub fn spawn(session: &Arc<Session>) -> Self {
        let events = session.subscribe();
        let runs = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run(Arc::downgrade(session), events, runs.clone()));

        Self { handle, runs }
    }

    /// Number of resolutions the watcher has run.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Returns `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the watcher.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for EligibilityWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(session: Weak<Session>, mut events: SessionSubscriber, runs: Arc<AtomicU64>) {
    tracing::debug!("Eligibility watcher started");

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(BusError::Closed) => break,
        };

        if !event.triggers_recompute() {
            continue;
        }

        let skipped = events.drain().len();
        if skipped > 0 {
            tracing::trace!(skipped, "Coalesced queued session events");
        }

        let Some(session) = session.upgrade() else {
            break;
        };

        tracing::debug!(trigger = event.kind(), "Recomputing eligibility");
        session.refresh_eligibility().await;
        runs.fetch_add(1, Ordering::AcqRel);
    }

    tracing::debug!("Eligibility watcher stopped");
}
