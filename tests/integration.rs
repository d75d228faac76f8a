//! Integration tests for the clipboard history engine.

use clipboard_history::{
    Category, ClientConfig, Command, Engine, EngineConfig, EventFilter, FilePersistence,
    HistoryEvent, ItemInput, MemoryPersistence, MirroredPersistence, PersistenceAdapter, Response,
    Settings,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn test_engine(dir: &TempDir) -> Engine {
    let persistence = FilePersistence::open(dir.path().join("history")).unwrap();
    Engine::open(Arc::new(persistence), EngineConfig::default())
        .await
        .unwrap()
}

fn contents(engine: &Engine) -> Vec<String> {
    engine
        .store()
        .items()
        .into_iter()
        .map(|item| item.content)
        .collect()
}

// --- Realistic Workflow Tests ---

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = TempDir::new().unwrap();

    let favorite_id = {
        let engine = test_engine(&dir).await;
        for content in ["npm install", "https://docs.rs", "fn main() { let x = 1; }"] {
            engine.gateway().add(ItemInput::new(content)).await.unwrap().unwrap();
        }
        let head = engine.store().head().unwrap();
        engine.gateway().toggle_favorite(&head.id).await.unwrap();
        head.id
    };

    // Lock is released once the first engine is gone
    let engine = test_engine(&dir).await;
    assert_eq!(
        contents(&engine),
        vec!["fn main() { let x = 1; }", "https://docs.rs", "npm install"]
    );

    let snapshot = engine.store().snapshot();
    assert_eq!(snapshot.favorites.len(), 1);
    assert_eq!(snapshot.favorites[0].id, favorite_id);
    assert_eq!(snapshot.items[0].category, Category::Code);
    assert_eq!(snapshot.items[1].category, Category::Url);
}

#[tokio::test]
async fn test_copy_again_promotes() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir).await;

    let first = engine.gateway().add(ItemInput::new("alpha")).await.unwrap().unwrap();
    engine.gateway().add(ItemInput::new("beta")).await.unwrap().unwrap();
    let again = engine.gateway().add(ItemInput::new("alpha")).await.unwrap().unwrap();

    assert_eq!(contents(&engine), vec!["alpha", "beta"]);
    assert_ne!(first.id, again.id);
    assert!(again.created_at > first.created_at);
    assert!(engine.store().get(&first.id).is_none());
}

#[tokio::test]
async fn test_client_pulls_after_change() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir).await;
    let client = engine.subscribe(ClientConfig {
        buffer_size: 16,
        filter: EventFilter::changes_only(),
    });

    engine
        .execute(Command::Add {
            content: "shared".into(),
            category: None,
            is_favorite: false,
        })
        .await
        .unwrap();

    // Wake-up, then re-read authoritative state
    let event = client.try_recv().unwrap();
    assert!(matches!(event, HistoryEvent::StoreChanged { .. }));
    let Response::Snapshot { snapshot } = engine.execute(Command::GetSnapshot).await.unwrap()
    else {
        panic!("Expected Snapshot");
    };
    assert_eq!(snapshot.items[0].content, "shared");
}

#[tokio::test]
async fn test_state_push_once_per_generation() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir).await;
    let client = engine.subscribe(ClientConfig::default());

    engine.gateway().add(ItemInput::new("one")).await.unwrap().unwrap();
    let generation = engine.publisher().generation();

    assert!(engine.publisher().acknowledge(client.id, generation));
    // Both identifiers arrive, but only one push per generation
    assert!(!engine.publisher().acknowledge(client.id, generation));

    let pushes: Vec<_> = client
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            HistoryEvent::State { snapshot, .. } => Some(snapshot),
            _ => None,
        })
        .collect();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].items[0].content, "one");
}

#[tokio::test]
async fn test_settings_change_applies_to_next_commit() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir).await;

    engine
        .update_settings(Settings {
            max_content_length: 5,
            ..Default::default()
        })
        .await
        .unwrap();

    let rejected = engine.gateway().add(ItemInput::new("longer text")).await.unwrap();
    assert!(rejected.is_err());
    assert!(engine.store().is_empty());

    engine.update_settings(Settings::default()).await.unwrap();
    assert!(engine
        .gateway()
        .add(ItemInput::new("longer text"))
        .await
        .unwrap()
        .is_ok());
}

#[tokio::test]
async fn test_settings_persist_across_restart() {
    let dir = TempDir::new().unwrap();
    {
        let engine = test_engine(&dir).await;
        engine
            .update_settings(Settings {
                max_history_size: 7,
                verbose_logging: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let engine = test_engine(&dir).await;
    let settings = engine.settings().current();
    assert_eq!(settings.max_history_size, 7);
    assert!(settings.verbose_logging);
}

#[tokio::test]
async fn test_export_to_another_engine() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let source = test_engine(&source_dir).await;
    let target = test_engine(&target_dir).await;

    for content in ["a", "b", "c"] {
        source.gateway().add(ItemInput::new(content)).await.unwrap().unwrap();
    }
    let Response::Exported { items } = source.execute(Command::Export).await.unwrap() else {
        panic!("Expected Exported");
    };

    let response = target.execute(Command::Import { items }).await.unwrap();
    assert_eq!(response, Response::Imported { count: 3 });
    assert_eq!(contents(&target), vec!["c", "b", "a"]);
}

// --- Persistence Strategy Tests ---

#[tokio::test]
async fn test_concurrent_adds_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let engine = test_engine(&dir).await;
        let gateway = engine.gateway();
        let (first, second) = tokio::join!(
            gateway.add(ItemInput::new("first")),
            gateway.add(ItemInput::new("second"))
        );
        first.unwrap().unwrap();
        second.unwrap().unwrap();
    }

    let engine = test_engine(&dir).await;
    assert_eq!(engine.store().len(), 2);
}

#[tokio::test]
async fn test_mirrored_backup_restores_history() {
    let dir = TempDir::new().unwrap();
    let backup: Arc<dyn PersistenceAdapter> =
        Arc::new(FilePersistence::open(dir.path().join("backup")).unwrap());

    {
        let primary: Arc<dyn PersistenceAdapter> = Arc::new(MemoryPersistence::new());
        let mirrored = MirroredPersistence::new(primary, Arc::clone(&backup));
        let engine = Engine::open(Arc::new(mirrored), EngineConfig::default())
            .await
            .unwrap();
        engine.gateway().add(ItemInput::new("kept")).await.unwrap().unwrap();
    }

    // Fresh, empty primary: history comes from the backup
    let primary: Arc<dyn PersistenceAdapter> = Arc::new(MemoryPersistence::new());
    let mirrored = MirroredPersistence::new(primary, backup);
    let engine = Engine::open(Arc::new(mirrored), EngineConfig::default())
        .await
        .unwrap();
    assert_eq!(contents(&engine), vec!["kept"]);
}

#[tokio::test]
async fn test_session_only_persistence() {
    let engine = Engine::open(Arc::new(MemoryPersistence::new()), EngineConfig::default())
        .await
        .unwrap();
    engine.gateway().add(ItemInput::new("ephemeral")).await.unwrap().unwrap();

    let fresh = Engine::open(Arc::new(MemoryPersistence::new()), EngineConfig::default())
        .await
        .unwrap();
    assert!(fresh.store().is_empty());
}

#[tokio::test]
async fn test_shutdown_drops_clients() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir).await;
    let client = engine.subscribe(ClientConfig::default());

    engine.shutdown();
    assert_eq!(engine.publisher().client_count(), 0);
    assert!(matches!(
        client.try_recv().unwrap(),
        HistoryEvent::Dropped { .. }
    ));
}
