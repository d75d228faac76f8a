//! In-memory persistence (process lifetime only).

use super::PersistenceAdapter;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Session-scoped key/value store.
#[derive(Default)]
pub struct MemoryPersistence {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryPersistence {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}
