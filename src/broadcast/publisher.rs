//! Publisher fanning history events out to connected clients.

use crate::history::HistoryStore;
use crate::types::Rejection;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::types::{
    ClientConfig, ClientHandle, ClientId, DropReason, HistoryEvent, CHANGE_IDENTIFIERS,
};

/// Outcome of a single delivery attempt.
enum Delivery {
    Sent,
    /// Queue full; the client still has unread wake-ups.
    Full,
    /// No listener on the other end.
    Disconnected,
}

/// Internal client state.
struct Client {
    config: ClientConfig,
    sender: Sender<HistoryEvent>,
    /// Generation of the last state push this client received.
    last_pushed: Option<u64>,
}

impl Client {
    fn try_send(&self, event: HistoryEvent) -> Delivery {
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Disconnected(_)) => Delivery::Disconnected,
        }
    }
}

/// Best-effort broadcaster of history changes.
///
/// Delivery is fire-and-forget: nothing waits for acknowledgement, and a
/// client that cannot be reached is skipped (queue full) or forgotten
/// (receiver gone) without surfacing an error.
pub struct Publisher {
    /// Connected clients by ID.
    clients: RwLock<HashMap<ClientId, Client>>,
    /// Counter for generating client IDs.
    next_id: AtomicU64,
    /// Bumped on every change notification.
    generation: AtomicU64,
    /// Source of truth for state pushes.
    store: Arc<HistoryStore>,
}

impl Publisher {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
            store,
        }
    }

    /// Connect a new client.
    pub fn subscribe(&self, config: ClientConfig) -> ClientHandle {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.clients.write().insert(
            id,
            Client {
                config,
                sender,
                last_pushed: None,
            },
        );

        ClientHandle { id, receiver }
    }

    /// Disconnect a client.
    pub fn unsubscribe(&self, id: ClientId) {
        if let Some(client) = self.clients.write().remove(&id) {
            let _ = client.sender.try_send(HistoryEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Drop every client, telling each why.
    pub fn shutdown(&self) {
        for (_, client) in self.clients.write().drain() {
            let _ = client.sender.try_send(HistoryEvent::Dropped {
                reason: DropReason::Shutdown,
            });
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Generation of the most recent change notification.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // --- Publishing ---

    /// Notify every client that the history changed.
    ///
    /// The signal goes out once per identifier in [`CHANGE_IDENTIFIERS`].
    /// Returns the new generation.
    pub fn publish_changed(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        for identifier in CHANGE_IDENTIFIERS {
            let event = HistoryEvent::StoreChanged {
                identifier: identifier.to_string(),
                generation,
            };
            self.broadcast(|client| client.config.filter.wants_identifier(identifier), event);
        }
        generation
    }

    /// Tell clients that content was refused.
    pub fn publish_rejected(&self, rejection: &Rejection) {
        self.broadcast(
            |client| client.config.filter.include_notices,
            HistoryEvent::Rejected {
                rejection: rejection.clone(),
            },
        );
        self.publish_warning(rejection.message());
    }

    pub fn publish_warning(&self, message: impl Into<String>) {
        self.broadcast(
            |client| client.config.filter.include_notices,
            HistoryEvent::Warning {
                message: message.into(),
            },
        );
    }

    /// Handle a client acknowledging a change notification.
    ///
    /// If the client accepts state pushes and has not received data for this
    /// generation yet, the current snapshot is sent directly. Returns whether
    /// a push happened.
    pub fn acknowledge(&self, id: ClientId, generation: u64) -> bool {
        let generation = generation.min(self.generation());
        {
            let clients = self.clients.read();
            match clients.get(&id) {
                Some(client) if client.config.filter.accept_state_push => {
                    if client.last_pushed.is_some_and(|pushed| pushed >= generation) {
                        return false;
                    }
                }
                _ => return false,
            }
        }

        let snapshot = self.store.snapshot();
        let mut clients = self.clients.write();
        let Some(client) = clients.get_mut(&id) else {
            return false;
        };
        match client.try_send(HistoryEvent::State {
            generation,
            snapshot,
        }) {
            Delivery::Sent => {
                client.last_pushed = Some(generation);
                true
            }
            Delivery::Full => false,
            Delivery::Disconnected => {
                clients.remove(&id);
                false
            }
        }
    }

    /// Internal broadcast helper. Forgets clients whose receiver is gone.
    fn broadcast<F>(&self, filter: F, event: HistoryEvent)
    where
        F: Fn(&Client) -> bool,
    {
        let verbose = self.store.settings().verbose();
        let mut to_remove = Vec::new();

        {
            let clients = self.clients.read();
            for (id, client) in clients.iter() {
                if !filter(client) {
                    continue;
                }
                match client.try_send(event.clone()) {
                    Delivery::Sent => {}
                    Delivery::Full => {
                        if verbose {
                            debug!(client = id.0, "client queue full, skipping event");
                        }
                    }
                    Delivery::Disconnected => {
                        if verbose {
                            debug!(client = id.0, "no listener for client, removing");
                        }
                        to_remove.push(*id);
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut clients = self.clients.write();
            for id in to_remove {
                clients.remove(&id);
            }
        }
    }
}
