//! # Clipboard History
//!
//! Capture, deduplication and synchronization engine for a clipboard history.
//!
//! ## Core Concepts
//!
//! - **History**: Bounded, newest-first, content-unique list of items
//! - **Capture**: Polling loop with forced checks on copy/paste triggers
//! - **Broadcast**: Best-effort change notifications to connected clients
//! - **Persistence**: Pluggable key/value adapters for history and settings
//!
//! ## Example
//!
//! ```ignore
//! use clipboard_history::{Engine, EngineConfig, FilePersistence, Command};
//!
//! let persistence = Arc::new(FilePersistence::open("./history")?);
//! let engine = Engine::open(persistence, EngineConfig::default()).await?;
//!
//! // Watch for changes
//! let client = engine.subscribe(ClientConfig::default());
//!
//! // Capture from a snapshot source
//! let capture = engine.start_capture(source);
//! capture.trigger(Trigger::Copy);
//!
//! // Execute a client command
//! let response = engine.execute(Command::GetSnapshot).await?;
//! ```

pub mod broadcast;
pub mod capture;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod history;
pub mod persist;
pub mod types;

// Re-exports
pub use broadcast::{
    ClientConfig, ClientHandle, ClientId, DropReason, EventFilter, HistoryEvent, Publisher,
    CHANGE_IDENTIFIERS,
};
pub use capture::{
    CaptureHandle, CaptureLoop, CaptureState, CheckOutcome, ForcedCheck, MemorySource, SkipReason,
    SnapshotKind, SnapshotSource, SourceRead, Trigger,
};
pub use classify::{classify, size_metric};
pub use config::{CaptureConfig, Settings, SettingsProvider};
pub use engine::{Engine, EngineConfig};
pub use error::{HistoryError, Result};
pub use gateway::{Command, MutationGateway, Response};
pub use history::{check_admission, HistoryStats, HistoryStore};
pub use persist::{
    FilePersistence, HistorySaver, MemoryPersistence, MirroredPersistence, PersistenceAdapter,
    HISTORY_KEY, SETTINGS_KEY,
};
pub use types::*;
