//! Command entry point for clients.
//!
//! Commands and responses are serde-tagged so any transport can carry them
//! as JSON:
//!
//! ```text
//! {"command": "toggleFavorite", "id": "5f0c..."}
//! {"result": "success", "success": true}
//! ```

use crate::broadcast::Publisher;
use crate::error::{HistoryError, Result};
use crate::history::HistoryStore;
use crate::persist::HistorySaver;
use crate::types::{Category, HistorySnapshot, Item, ItemId, ItemInput, Rejection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A client request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    GetSnapshot,
    Add {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<Category>,
        #[serde(default, rename = "isFavorite")]
        is_favorite: bool,
    },
    Delete {
        id: ItemId,
    },
    DeleteMany {
        ids: Vec<ItemId>,
    },
    ToggleFavorite {
        id: ItemId,
    },
    MoveToTop {
        id: ItemId,
    },
    Clear,
    Export,
    Import {
        items: Vec<Item>,
    },
}

/// Result of a successfully dispatched command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Response {
    Snapshot { snapshot: HistorySnapshot },
    Added { item: Item },
    Rejected { rejection: Rejection },
    Success { success: bool },
    Deleted { count: usize },
    Exported { items: Vec<Item> },
    Imported { count: usize },
}

/// Translates commands into store operations.
///
/// Holds no state of its own: every successful mutation publishes a change
/// notification and saves the history. A failed save is returned to the
/// caller but the in-memory change stands.
pub struct MutationGateway {
    store: Arc<HistoryStore>,
    publisher: Arc<Publisher>,
    saver: Option<Arc<HistorySaver>>,
}

impl MutationGateway {
    pub fn new(store: Arc<HistoryStore>, publisher: Arc<Publisher>) -> Self {
        Self {
            store,
            publisher,
            saver: None,
        }
    }

    /// Save the history after every mutation. Share the saver with every
    /// other writer of the same store.
    pub fn with_saver(mut self, saver: Arc<HistorySaver>) -> Self {
        self.saver = Some(saver);
        self
    }

    pub async fn execute(&self, command: Command) -> Result<Response> {
        match command {
            Command::GetSnapshot => Ok(Response::Snapshot {
                snapshot: self.store.snapshot(),
            }),
            Command::Add {
                content,
                category,
                is_favorite,
            } => {
                let input = ItemInput {
                    content,
                    category,
                    is_favorite,
                };
                match self.add(input).await? {
                    Ok(item) => Ok(Response::Added { item }),
                    Err(rejection) => Ok(Response::Rejected { rejection }),
                }
            }
            Command::Delete { id } => {
                self.delete(&id).await?;
                Ok(Response::Success { success: true })
            }
            Command::DeleteMany { ids } => Ok(Response::Deleted {
                count: self.delete_many(&ids).await?,
            }),
            Command::ToggleFavorite { id } => {
                self.toggle_favorite(&id).await?;
                Ok(Response::Success { success: true })
            }
            Command::MoveToTop { id } => {
                self.move_to_top(&id).await?;
                Ok(Response::Success { success: true })
            }
            Command::Clear => {
                self.clear().await?;
                Ok(Response::Success { success: true })
            }
            Command::Export => Ok(Response::Exported {
                items: self.store.items(),
            }),
            Command::Import { items } => Ok(Response::Imported {
                count: self.import(items).await?,
            }),
        }
    }

    /// Manually add content. The inner result carries an admission rejection.
    pub async fn add(&self, input: ItemInput) -> Result<std::result::Result<Item, Rejection>> {
        match self.store.insert_or_promote(input) {
            Ok(item) => {
                self.committed().await?;
                Ok(Ok(item))
            }
            Err(HistoryError::Rejected(rejection)) => {
                self.publisher.publish_rejected(&rejection);
                Ok(Err(rejection))
            }
            Err(e) => Err(e),
        }
    }

    /// Returns whether the item existed. Absent ids still succeed.
    pub async fn delete(&self, id: &ItemId) -> Result<bool> {
        let removed = self.store.delete(id);
        self.committed().await?;
        Ok(removed)
    }

    pub async fn delete_many(&self, ids: &[ItemId]) -> Result<usize> {
        let removed = self.store.delete_many(ids);
        self.committed().await?;
        Ok(removed)
    }

    pub async fn toggle_favorite(&self, id: &ItemId) -> Result<Item> {
        let item = self.store.toggle_favorite(id)?;
        self.committed().await?;
        Ok(item)
    }

    pub async fn move_to_top(&self, id: &ItemId) -> Result<Item> {
        let item = self.store.move_to_top(id)?;
        self.committed().await?;
        Ok(item)
    }

    pub async fn clear(&self) -> Result<usize> {
        let removed = self.store.clear();
        self.committed().await?;
        Ok(removed)
    }

    pub async fn import(&self, items: Vec<Item>) -> Result<usize> {
        let imported = self.store.import(items);
        self.committed().await?;
        Ok(imported)
    }

    /// Publish, then save.
    async fn committed(&self) -> Result<()> {
        self.publisher.publish_changed();
        if let Some(saver) = &self.saver {
            if let Err(e) = saver.save().await {
                warn!(error = %e, "failed to persist history after mutation");
                return Err(e);
            }
        }
        Ok(())
    }
}
