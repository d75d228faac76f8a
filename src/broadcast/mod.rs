//! Change broadcasting to connected clients.
//!
//! Each client gets a bounded in-process channel. The publisher sends:
//! - change notifications, once per identifier in [`CHANGE_IDENTIFIERS`]
//! - rejection and warning notices
//! - an optional full-state push after a client acknowledges a change
//!
//! Notifications are edge-triggered wake-ups with no ordering guarantee
//! across clients; a client that wakes up re-reads the history.
//!
//! # Example
//!
//! ```ignore
//! let handle = publisher.subscribe(ClientConfig::default());
//!
//! loop {
//!     match handle.recv() {
//!         Ok(HistoryEvent::StoreChanged { generation, .. }) => {
//!             publisher.acknowledge(handle.id, generation);
//!         }
//!         Ok(HistoryEvent::State { snapshot, .. }) => render(snapshot),
//!         Ok(HistoryEvent::Dropped { .. }) | Err(_) => break,
//!         Ok(_) => {}
//!     }
//! }
//! ```

mod publisher;
mod types;

pub use publisher::Publisher;
pub use types::{
    ClientConfig, ClientHandle, ClientId, DropReason, EventFilter, HistoryEvent,
    CHANGE_IDENTIFIERS,
};
