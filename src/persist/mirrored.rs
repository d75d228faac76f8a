//! Primary persistence with a backup copy.

use super::PersistenceAdapter;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Writes through to both adapters; reads the primary and falls back to the
/// backup when the primary has nothing or fails.
///
/// Only primary failures fail a save. The backup is a convenience copy.
pub struct MirroredPersistence {
    primary: Arc<dyn PersistenceAdapter>,
    backup: Arc<dyn PersistenceAdapter>,
}

impl MirroredPersistence {
    pub fn new(primary: Arc<dyn PersistenceAdapter>, backup: Arc<dyn PersistenceAdapter>) -> Self {
        Self { primary, backup }
    }
}

#[async_trait]
impl PersistenceAdapter for MirroredPersistence {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        match self.primary.load(key).await {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => self.backup.load(key).await,
            Err(e) => {
                warn!(key, error = %e, "primary load failed, using backup");
                self.backup.load(key).await
            }
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        if let Err(e) = self.backup.save(key, value.clone()).await {
            warn!(key, error = %e, "backup save failed");
        }
        self.primary.save(key, value).await
    }
}
