//! Engine tying all components together.

use crate::broadcast::{ClientConfig, ClientHandle, Publisher};
use crate::capture::{CaptureHandle, CaptureLoop, SnapshotSource};
use crate::config::{CaptureConfig, Settings, SettingsProvider};
use crate::error::Result;
use crate::gateway::{Command, MutationGateway, Response};
use crate::history::HistoryStore;
use crate::persist::{load_history, load_settings, save_settings, HistorySaver, PersistenceAdapter};
use std::sync::Arc;
use tracing::{info, warn};

/// Engine configuration.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Capture loop timing.
    pub capture: CaptureConfig,

    /// Used when no settings were persisted yet.
    pub default_settings: Settings,
}

/// The clipboard history engine.
///
/// Provides a unified interface for:
/// - running the capture loop against a snapshot source
/// - executing client commands
/// - connecting clients for change notifications
/// - changing settings at runtime
///
/// Construct once per process; components share the store by `Arc`.
pub struct Engine {
    config: EngineConfig,
    settings: SettingsProvider,
    store: Arc<HistoryStore>,
    publisher: Arc<Publisher>,
    gateway: MutationGateway,
    saver: Arc<HistorySaver>,
}

impl Engine {
    /// Open the engine, restoring settings and history from `persistence`.
    ///
    /// Unreadable persisted records are logged and replaced by defaults or an
    /// empty history.
    pub async fn open(
        persistence: Arc<dyn PersistenceAdapter>,
        config: EngineConfig,
    ) -> Result<Self> {
        let settings = match load_settings(persistence.as_ref()).await {
            Ok(Some(settings)) if settings.validate().is_ok() => settings,
            Ok(Some(settings)) => {
                warn!(?settings, "persisted settings invalid, using defaults");
                config.default_settings.clone()
            }
            Ok(None) => config.default_settings.clone(),
            Err(e) => {
                warn!(error = %e, "failed to load settings, using defaults");
                config.default_settings.clone()
            }
        };
        settings.validate()?;

        let provider = SettingsProvider::new(settings);
        let store = Arc::new(HistoryStore::new(provider.clone()));

        match load_history(persistence.as_ref()).await {
            Ok(Some(snapshot)) => {
                let restored = store.restore(snapshot);
                info!(restored, "restored clipboard history");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load history, starting empty"),
        }

        let publisher = Arc::new(Publisher::new(Arc::clone(&store)));
        let saver = Arc::new(HistorySaver::new(persistence, Arc::clone(&store)));
        let gateway = MutationGateway::new(Arc::clone(&store), Arc::clone(&publisher))
            .with_saver(Arc::clone(&saver));

        Ok(Self {
            config,
            settings: provider,
            store,
            publisher,
            gateway,
            saver,
        })
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn settings(&self) -> &SettingsProvider {
        &self.settings
    }

    /// Connect a client for change notifications.
    pub fn subscribe(&self, config: ClientConfig) -> ClientHandle {
        self.publisher.subscribe(config)
    }

    pub async fn execute(&self, command: Command) -> Result<Response> {
        self.gateway.execute(command).await
    }

    /// Validate, persist and apply new settings.
    ///
    /// A smaller `maxHistorySize` evicts immediately; clients are notified
    /// only if that changed the history.
    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        self.settings.update(settings.clone())?;
        save_settings(self.saver.adapter().as_ref(), &settings).await?;

        let evicted = self.store.enforce_limit();
        if evicted > 0 {
            info!(evicted, "history trimmed after settings change");
            self.publisher.publish_changed();
            self.saver.save().await?;
        }
        Ok(())
    }

    /// Start capturing from `source` on the current runtime.
    pub fn start_capture(&self, source: Arc<dyn SnapshotSource>) -> CaptureHandle {
        let capture = CaptureLoop::new(
            source,
            Arc::clone(&self.store),
            Arc::clone(&self.publisher),
            self.config.capture.clone(),
        )
        .with_saver(Arc::clone(&self.saver));
        Arc::new(capture).spawn()
    }

    /// Disconnect every client.
    pub fn shutdown(&self) {
        self.publisher.shutdown();
    }
}
