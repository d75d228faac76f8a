//! Client and event types for change broadcasting.

use crate::types::{HistorySnapshot, Rejection};
use serde::{Deserialize, Serialize};

/// Identifiers every change notification is sent under.
///
/// Clients that filter on one exact identifier still receive the signal.
pub const CHANGE_IDENTIFIERS: [&str; 2] = ["store_changed", "history_updated"];

/// Configuration for a connected client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Max pending events; further events are skipped until the client
    /// drains its queue.
    /// Default: 64
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: EventFilter,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            filter: EventFilter::all(),
        }
    }
}

/// Which events a client wants.
#[derive(Clone, Debug)]
pub struct EventFilter {
    /// Change identifiers to accept (None = all).
    pub identifiers: Option<Vec<String>>,

    /// Receive `rejected` and `warning` events.
    pub include_notices: bool,

    /// Accept a full `state` payload after acknowledging a change.
    pub accept_state_push: bool,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl EventFilter {
    /// Everything, including state pushes.
    pub fn all() -> Self {
        Self {
            identifiers: None,
            include_notices: true,
            accept_state_push: true,
        }
    }

    /// Change notifications under the given identifiers only.
    pub fn identifiers(identifiers: Vec<String>) -> Self {
        Self {
            identifiers: Some(identifiers),
            include_notices: false,
            accept_state_push: false,
        }
    }

    /// Change notifications only; clients re-pull state themselves.
    pub fn changes_only() -> Self {
        Self {
            identifiers: None,
            include_notices: false,
            accept_state_push: false,
        }
    }

    pub(crate) fn wants_identifier(&self, identifier: &str) -> bool {
        match &self.identifiers {
            Some(ids) => ids.iter().any(|id| id == identifier),
            None => true,
        }
    }
}

/// Events delivered to clients.
///
/// Change events are wake-up signals: clients re-fetch authoritative state
/// from the store on receipt. Only `State` carries a payload of record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HistoryEvent {
    /// The history changed.
    StoreChanged { identifier: String, generation: u64 },

    /// Content was refused admission.
    Rejected { rejection: Rejection },

    /// Human-readable notice for the user.
    Warning { message: String },

    /// Full state pushed after an acknowledgement.
    State {
        generation: u64,
        snapshot: HistorySnapshot,
    },

    /// The client was removed.
    Dropped { reason: DropReason },
}

/// Why a client was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// Engine is shutting down.
    Shutdown,
}

/// Unique identifier for a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

/// Handle held by a connected client.
pub struct ClientHandle {
    pub id: ClientId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<HistoryEvent>,
}

impl ClientHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<HistoryEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<HistoryEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<HistoryEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<HistoryEvent> {
        self.receiver.try_iter().collect()
    }
}
