//! Error handling and edge case tests.

use async_trait::async_trait;
use clipboard_history::{
    Command, Engine, EngineConfig, FilePersistence, HistoryError, HistoryStore, ItemId, ItemInput,
    MemoryPersistence, PersistenceAdapter, RejectReason, Response, Result, Settings,
    SettingsProvider, HISTORY_KEY,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn test_store(settings: Settings) -> HistoryStore {
    HistoryStore::new(SettingsProvider::new(settings))
}

/// Accepts writes but never stores them.
struct Forgetful;

#[async_trait]
impl PersistenceAdapter for Forgetful {
    async fn load(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn save(&self, _key: &str, _value: Value) -> Result<()> {
        Ok(())
    }
}

// --- Admission Errors ---

#[test]
fn test_oversize_text_rejected() {
    let store = test_store(Settings {
        max_content_length: 10,
        ..Default::default()
    });

    let result = store.insert_or_promote(ItemInput::new("x".repeat(11)));
    match result {
        Err(HistoryError::Rejected(rejection)) => {
            assert_eq!(rejection.reason, RejectReason::TooLarge);
            assert_eq!(rejection.measured, 11);
            assert_eq!(rejection.limit, 10);
        }
        other => panic!("Expected rejection, got {:?}", other),
    }
    assert!(store.is_empty());
}

#[test]
fn test_text_at_limit_admitted() {
    let store = test_store(Settings {
        max_content_length: 10,
        ..Default::default()
    });
    assert!(store.insert_or_promote(ItemInput::new("x".repeat(10))).is_ok());
}

#[test]
fn test_oversize_image_rejected() {
    let store = test_store(Settings {
        max_image_size_kb: 1,
        ..Default::default()
    });
    // 4096 base64 chars decode to 3 KB
    let image = format!("data:image/png;base64,{}", "A".repeat(4096));

    let result = store.insert_or_promote(ItemInput::new(image));
    assert!(matches!(result, Err(HistoryError::Rejected(_))));
    assert!(result.unwrap_err().is_rejection());
}

#[test]
fn test_rejected_duplicate_does_not_promote() {
    let store = test_store(Settings::default());
    let original = store.insert_or_promote(ItemInput::new("old")).unwrap();
    store.insert_or_promote(ItemInput::new("new")).unwrap();

    store
        .settings()
        .update(Settings {
            max_content_length: 2,
            ..Default::default()
        })
        .unwrap();

    assert!(store.insert_or_promote(ItemInput::new("old")).is_err());
    assert_eq!(store.items()[1].id, original.id);
}

// --- Unknown Item Errors ---

#[test]
fn test_toggle_unknown_item() {
    let store = test_store(Settings::default());
    let result = store.toggle_favorite(&ItemId::from("missing"));
    assert!(matches!(result, Err(HistoryError::ItemNotFound(_))));
}

#[test]
fn test_move_unknown_item() {
    let store = test_store(Settings::default());
    store.insert_or_promote(ItemInput::new("present")).unwrap();

    let result = store.move_to_top(&ItemId::from("missing"));
    assert!(matches!(result, Err(HistoryError::ItemNotFound(_))));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_is_idempotent() {
    let store = test_store(Settings::default());
    let item = store.insert_or_promote(ItemInput::new("gone")).unwrap();

    assert!(store.delete(&item.id));
    assert!(!store.delete(&item.id));
    assert!(store.is_empty());
}

// --- Settings Errors ---

#[test]
fn test_zero_history_size_invalid() {
    let provider = SettingsProvider::default();
    let result = provider.update(Settings {
        max_history_size: 0,
        ..Default::default()
    });
    assert!(matches!(result, Err(HistoryError::InvalidSettings(_))));
    assert_eq!(provider.current(), Settings::default());
}

#[tokio::test]
async fn test_invalid_persisted_settings_fall_back() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence
        .save("settings", json!({"settings": {"maxHistorySize": 0}}))
        .await
        .unwrap();

    let engine = Engine::open(persistence, EngineConfig::default())
        .await
        .unwrap();
    assert_eq!(engine.settings().current(), Settings::default());
}

#[tokio::test]
async fn test_partial_settings_filled_with_defaults() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence
        .save("settings", json!({"settings": {"maxImageSizeKB": 512}}))
        .await
        .unwrap();

    let engine = Engine::open(persistence, EngineConfig::default())
        .await
        .unwrap();
    let settings = engine.settings().current();
    assert_eq!(settings.max_image_size_kb, 512);
    assert_eq!(settings.max_history_size, 50);
}

// --- Persistence Errors ---

#[tokio::test]
async fn test_unverified_save_reported() {
    let engine = Engine::open(Arc::new(Forgetful), EngineConfig::default())
        .await
        .unwrap();

    let result = engine.gateway().add(ItemInput::new("lost")).await;
    assert!(matches!(result, Err(HistoryError::PersistenceVerification(_))));
    // The in-memory commit stands
    assert_eq!(engine.store().len(), 1);
}

#[tokio::test]
async fn test_corrupt_history_starts_empty() {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence
        .save(HISTORY_KEY, json!({"items": "not a list"}))
        .await
        .unwrap();

    let engine = Engine::open(persistence, EngineConfig::default())
        .await
        .unwrap();
    assert!(engine.store().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history");
    {
        let persistence = FilePersistence::open(&path).unwrap();
        let engine = Engine::open(Arc::new(persistence), EngineConfig::default())
            .await
            .unwrap();
        engine.gateway().add(ItemInput::new("doomed")).await.unwrap().unwrap();
    }

    let file = path.join(format!("{HISTORY_KEY}.bin"));
    let mut bytes = std::fs::read(&file).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&file, bytes).unwrap();

    let persistence = FilePersistence::open(&path).unwrap();
    assert!(matches!(
        persistence.load(HISTORY_KEY).await,
        Err(HistoryError::ChecksumMismatch { .. })
    ));
    let engine = Engine::open(Arc::new(persistence), EngineConfig::default())
        .await
        .unwrap();
    assert!(engine.store().is_empty());
}

#[tokio::test]
async fn test_corrupt_length_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history");
    {
        let persistence = FilePersistence::open(&path).unwrap();
        let engine = Engine::open(Arc::new(persistence), EngineConfig::default())
            .await
            .unwrap();
        engine.gateway().add(ItemInput::new("doomed")).await.unwrap().unwrap();
    }

    let file = path.join(format!("{HISTORY_KEY}.bin"));
    let mut bytes = std::fs::read(&file).unwrap();
    bytes[9..17].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
    std::fs::write(&file, bytes).unwrap();

    let persistence = FilePersistence::open(&path).unwrap();
    assert!(matches!(
        persistence.load(HISTORY_KEY).await,
        Err(HistoryError::Corruption(_))
    ));
    let engine = Engine::open(Arc::new(persistence), EngineConfig::default())
        .await
        .unwrap();
    assert!(engine.store().is_empty());
}

#[test]
fn test_directory_locked() {
    let dir = TempDir::new().unwrap();
    let _held = FilePersistence::open(dir.path()).unwrap();
    let result = FilePersistence::open(dir.path());
    assert!(matches!(result, Err(HistoryError::Locked)));
}

// --- Command Errors ---

#[test]
fn test_malformed_command() {
    let result: std::result::Result<Command, _> =
        serde_json::from_str(r#"{"command":"toggleFavorite"}"#);
    assert!(result.is_err());

    let result: std::result::Result<Command, _> = serde_json::from_str(r#"{"command":"explode"}"#);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_delete_many_with_unknown_ids() {
    let engine = Engine::open(Arc::new(MemoryPersistence::new()), EngineConfig::default())
        .await
        .unwrap();
    let response = engine
        .execute(Command::DeleteMany {
            ids: vec![ItemId::from("a"), ItemId::from("b")],
        })
        .await
        .unwrap();
    assert_eq!(response, Response::Deleted { count: 0 });
}
