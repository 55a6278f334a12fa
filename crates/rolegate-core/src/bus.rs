// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session event bus.
//!
//! Every observable session change (sign-in, sign-out, credential changes,
//! eligibility updates, role selection) is published on a
//! `tokio::sync::broadcast` channel. The eligibility watcher subscribes to
//! it to trigger recomputation, and front-ends subscribe to refresh their
//! view of the session.
//!
//! ```text
//!   Session / CredentialStore
//!            │ publish
//!            ▼
//!   ┌──────────────────────┐
//!   │ SessionBus (1:N)     │
//!   └──────────────────────┘
//!      │           │
//!      ▼           ▼
//!   Watcher     UI / CLI
//! ```
//!
//! Publishing never fails: a bus without subscribers simply drops events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::BusError;
use crate::types::{RoleEligibility, SelectedRole};

/// Default channel capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SessionEvent
// =============================================================================

/// A change in session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An identity signed in and a new epoch started.
    SignedIn {
        /// Subject identifier of the new identity.
        subject_id: String,
        /// The epoch the sign-in started.
        epoch: u64,
    },

    /// The identity signed out; all session state was cleared.
    SignedOut,

    /// The access credential was stored, refreshed or invalidated.
    CredentialChanged {
        /// Whether a credential is now held.
        present: bool,
    },

    /// A resolution for `epoch` was applied.
    EligibilityUpdated {
        /// The epoch the resolution was started in.
        epoch: u64,
        /// The new eligibility.
        eligibility: RoleEligibility,
    },

    /// An elevated role became active.
    RoleSelected {
        /// The selected role.
        role: SelectedRole,
        /// `true` if the role was restored from persisted state rather than
        /// picked explicitly.
        restored: bool,
    },

    /// The active role was cleared by the identity.
    RoleCleared,

    /// A caller asked for eligibility to be recomputed.
    RecomputeRequested,
}

impl SessionEvent {
    /// Returns the event name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { .. } => "signed_in",
            SessionEvent::SignedOut => "signed_out",
            SessionEvent::CredentialChanged { .. } => "credential_changed",
            SessionEvent::EligibilityUpdated { .. } => "eligibility_updated",
            SessionEvent::RoleSelected { .. } => "role_selected",
            SessionEvent::RoleCleared => "role_cleared",
            SessionEvent::RecomputeRequested => "recompute_requested",
        }
    }

    /// Returns `true` if this event should trigger an eligibility resolution.
    pub fn triggers_recompute(&self) -> bool {
        matches!(
            self,
            SessionEvent::SignedIn { .. } | SessionEvent::RoleCleared | SessionEvent::RecomputeRequested
        )
    }
}

/// A published event with its timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEnvelope {
    /// The event.
    #[serde(flatten)]
    pub event: SessionEvent,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Bus Statistics
// =============================================================================

/// Statistics for the session bus.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BusStats {
    /// Total events published.
    pub events_published: u64,
    /// Events dropped because a subscriber lagged.
    pub events_dropped: u64,
    /// Events published while nobody was subscribed.
    pub events_unobserved: u64,
    /// Current number of subscribers.
    pub subscriber_count: u64,
}

#[derive(Debug, Default)]
struct AtomicBusStats {
    events_published: AtomicU64,
    events_dropped: AtomicU64,
    events_unobserved: AtomicU64,
}

// =============================================================================
// SessionBus
// =============================================================================

/// A cloneable broadcast bus for [`SessionEvent`]s.
#[derive(Clone)]
pub struct SessionBus {
    sender: broadcast::Sender<SessionEnvelope>,
    capacity: usize,
    stats: Arc<AtomicBusStats>,
}

impl SessionBus {
    /// Creates a bus buffering up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            capacity: capacity.max(1),
            stats: Arc::new(AtomicBusStats::default()),
        }
    }

    /// Publishes an event to every subscriber.
    ///
    /// Returns the number of subscribers that will see it.
    pub fn publish(&self, event: SessionEvent) -> usize {
        tracing::trace!(event = event.kind(), "Publishing session event");
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);

        let envelope = SessionEnvelope {
            event,
            timestamp: Utc::now(),
        };

        match self.sender.send(envelope) {
            Ok(count) => count,
            Err(_) => {
                self.stats.events_unobserved.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Creates a new subscriber that sees events published from now on.
    pub fn subscribe(&self) -> SessionSubscriber {
        SessionSubscriber {
            receiver: self.sender.subscribe(),
            stats: self.stats.clone(),
        }
    }

    /// Returns the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns current statistics.
    pub fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.stats.events_published.load(Ordering::Relaxed),
            events_dropped: self.stats.events_dropped.load(Ordering::Relaxed),
            events_unobserved: self.stats.events_unobserved.load(Ordering::Relaxed),
            subscriber_count: self.subscriber_count() as u64,
        }
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl std::fmt::Debug for SessionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBus")
            .field("capacity", &self.capacity)
            .field("subscriber_count", &self.subscriber_count())
            .field("events_published", &self.stats.events_published.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// SessionSubscriber
// =============================================================================

/// A subscriber to the session bus.
pub struct SessionSubscriber {
    receiver: broadcast::Receiver<SessionEnvelope>,
    stats: Arc<AtomicBusStats>,
}

impl SessionSubscriber {
    /// Receives the next event.
    ///
    /// Lagging is logged and skipped. Fails only once every sender is gone.
    pub async fn recv(&mut self) -> Result<SessionEvent, BusError> {
        self.recv_envelope().await.map(|envelope| envelope.event)
    }

    /// Receives the next event with its timestamp.
    pub async fn recv_envelope(&mut self) -> Result<SessionEnvelope, BusError> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Ok(envelope),
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.stats.events_dropped.fetch_add(count, Ordering::Relaxed);
                    tracing::warn!(count, "Session subscriber lagged, events dropped");
                }
            }
        }
    }

    /// Tries to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<Option<SessionEvent>, BusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => return Ok(Some(envelope.event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.stats.events_dropped.fetch_add(count, Ordering::Relaxed);
                }
            }
        }
    }

    /// Drains every event that is already queued.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl std::fmt::Debug for SessionSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSubscriber").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
