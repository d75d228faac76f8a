//! Key/value persistence for history and settings.
//!
//! The engine only needs `load(key)` and `save(key, value)`. Three backing
//! strategies implement [`PersistenceAdapter`]:
//! - [`FilePersistence`]: durable, one checksummed file per key
//! - [`MemoryPersistence`]: process-lifetime only
//! - [`MirroredPersistence`]: a primary with a fallback backup
//!
//! [`HistorySaver`] serialises history saves for one store.
//!
//! Layout: [`HISTORY_KEY`] holds `{ items, favorites }` (favorites is a
//! derived cache), [`SETTINGS_KEY`] holds `{ settings }`.

mod file;
mod memory;
mod mirrored;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
pub use mirrored::MirroredPersistence;

use crate::config::{Settings, SettingsRecord};
use crate::error::{HistoryError, Result};
use crate::history::HistoryStore;
use crate::types::HistorySnapshot;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key for the persisted history record.
pub const HISTORY_KEY: &str = "clipboardHistory";

/// Key for the persisted settings record.
pub const SETTINGS_KEY: &str = "settings";

/// Asynchronous key/value storage.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Read a value. `Ok(None)` if the key was never written.
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn save(&self, key: &str, value: Value) -> Result<()>;
}

/// Load the persisted history, if any.
pub async fn load_history(adapter: &dyn PersistenceAdapter) -> Result<Option<HistorySnapshot>> {
    match adapter.load(HISTORY_KEY).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| HistoryError::Deserialization(e.to_string())),
        None => Ok(None),
    }
}

/// Save the history and verify it by reading it back.
pub async fn save_history(
    adapter: &dyn PersistenceAdapter,
    snapshot: &HistorySnapshot,
) -> Result<()> {
    let value = serde_json::to_value(snapshot)?;
    adapter.save(HISTORY_KEY, value).await?;

    let stored = load_history(adapter).await?.ok_or_else(|| {
        HistoryError::PersistenceVerification("history record missing after save".into())
    })?;

    let expected = snapshot.items.iter().map(|i| &i.id);
    let actual = stored.items.iter().map(|i| &i.id);
    if !expected.eq(actual) {
        return Err(HistoryError::PersistenceVerification(format!(
            "saved {} items, read back {}",
            snapshot.items.len(),
            stored.items.len()
        )));
    }
    Ok(())
}

/// Writes the store's history through an adapter, one save at a time.
///
/// The snapshot is taken after the save lock is acquired, so the last save
/// to finish always carries the newest state. Every writer of the history
/// record must share one saver.
pub struct HistorySaver {
    adapter: Arc<dyn PersistenceAdapter>,
    store: Arc<HistoryStore>,
    lock: Mutex<()>,
}

impl HistorySaver {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>, store: Arc<HistoryStore>) -> Self {
        Self {
            adapter,
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.adapter
    }

    /// Save the current history and verify it.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let snapshot = self.store.snapshot();
        save_history(self.adapter.as_ref(), &snapshot).await
    }
}

/// Load persisted settings, if any.
pub async fn load_settings(adapter: &dyn PersistenceAdapter) -> Result<Option<Settings>> {
    match adapter.load(SETTINGS_KEY).await? {
        Some(value) => serde_json::from_value::<SettingsRecord>(value)
            .map(|record| Some(record.settings))
            .map_err(|e| HistoryError::Deserialization(e.to_string())),
        None => Ok(None),
    }
}

pub async fn save_settings(adapter: &dyn PersistenceAdapter, settings: &Settings) -> Result<()> {
    let record = SettingsRecord {
        settings: settings.clone(),
    };
    adapter.save(SETTINGS_KEY, serde_json::to_value(record)?).await
}
