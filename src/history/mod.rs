//! History storage.
//!
//! The [`HistoryStore`] is the single owner of the item collection. It
//! enforces:
//! - unique ids and unique contents
//! - newest-first ordering with monotonic timestamps
//! - the `maxHistorySize` cap, evicting the oldest items first
//!
//! Favorites are a derived view over the items and are evicted like any
//! other item.

mod store;

pub use store::{check_admission, HistoryStats, HistoryStore};
