//! The external snapshot source consumed by the capture loop.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;

/// Which representation of the clipboard to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Image,
    Text,
}

/// Why a read produced nothing to commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The user is typing.
    UserTyping,
    /// There is an uncommitted selection.
    ActiveSelection,
    /// The current context may not be read (e.g. a password field).
    RestrictedContext,
    /// The read itself failed.
    Unreadable(String),
}

impl SkipReason {
    /// Interaction heuristics are advisory; a forced check reads through them.
    pub fn bypassed_when_forced(&self) -> bool {
        matches!(self, SkipReason::UserTyping | SkipReason::ActiveSelection)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UserTyping => f.write_str("user typing"),
            SkipReason::ActiveSelection => f.write_str("active selection"),
            SkipReason::RestrictedContext => f.write_str("restricted context"),
            SkipReason::Unreadable(why) => write!(f, "unreadable: {why}"),
        }
    }
}

/// Result of one read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRead {
    /// Whether the representation is present at all.
    pub available: bool,
    pub raw: Option<String>,
    /// Set when the caller should not commit this read.
    pub skip: Option<SkipReason>,
}

impl SourceRead {
    pub fn content(raw: impl Into<String>) -> Self {
        Self {
            available: true,
            raw: Some(raw.into()),
            skip: None,
        }
    }

    /// Nothing of this kind is on the clipboard.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            available: false,
            raw: None,
            skip: Some(reason),
        }
    }

    /// Content was read but the source advises against committing it.
    pub fn advised_skip(raw: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            available: true,
            raw: Some(raw.into()),
            skip: Some(reason),
        }
    }
}

/// Reads the current external clipboard state.
///
/// Implementations must not block; a read that cannot complete should
/// report [`SkipReason::Unreadable`] rather than return nothing.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn read(&self, kind: SnapshotKind) -> SourceRead;
}

/// A source whose contents are set programmatically.
///
/// Useful for embedding the engine behind a clipboard driver that pushes
/// changes, and for tests.
#[derive(Default)]
pub struct MemorySource {
    state: Mutex<MemorySourceState>,
}

#[derive(Default)]
struct MemorySourceState {
    text: Option<String>,
    image: Option<String>,
    skip: Option<SkipReason>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.lock().text = Some(text.into());
    }

    pub fn clear_text(&self) {
        self.state.lock().text = None;
    }

    /// Set image data (a `data:image/...` URL).
    pub fn set_image(&self, data_url: impl Into<String>) {
        self.state.lock().image = Some(data_url.into());
    }

    pub fn clear_image(&self) {
        self.state.lock().image = None;
    }

    /// Attach a skip reason to every read until cleared.
    pub fn set_skip(&self, reason: Option<SkipReason>) {
        self.state.lock().skip = reason;
    }
}

#[async_trait]
impl SnapshotSource for MemorySource {
    async fn read(&self, kind: SnapshotKind) -> SourceRead {
        let state = self.state.lock();
        let raw = match kind {
            SnapshotKind::Image => state.image.clone(),
            SnapshotKind::Text => state.text.clone(),
        };
        match (raw, state.skip.clone()) {
            (Some(raw), Some(reason)) => SourceRead::advised_skip(raw, reason),
            (None, Some(reason)) => SourceRead::skipped(reason),
            (Some(raw), None) => SourceRead::content(raw),
            (None, None) => SourceRead::unavailable(),
        }
    }
}
