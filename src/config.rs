//! Engine configuration.
//!
//! [`Settings`] is the user-facing configuration record; it is persisted
//! alongside the history and may change at runtime. [`CaptureConfig`] holds
//! the capture loop timing, which is fixed for the lifetime of a loop.

use crate::error::{HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

/// Runtime-adjustable limits and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Max items kept in history.
    /// Default: 50
    pub max_history_size: usize,

    /// Max chars for text, url and code content.
    /// Default: 50 000
    pub max_content_length: u64,

    /// Max decoded size for images.
    /// Default: 2048
    #[serde(rename = "maxImageSizeKB")]
    pub max_image_size_kb: u64,

    /// Emit debug diagnostics for skips and delivery failures.
    pub verbose_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_history_size: 50,
            max_content_length: 50_000,
            max_image_size_kb: 2048,
            verbose_logging: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.max_history_size == 0 {
            return Err(HistoryError::InvalidSettings(
                "maxHistorySize must be at least 1".into(),
            ));
        }
        if self.max_content_length == 0 {
            return Err(HistoryError::InvalidSettings(
                "maxContentLength must be at least 1".into(),
            ));
        }
        if self.max_image_size_kb == 0 {
            return Err(HistoryError::InvalidSettings(
                "maxImageSizeKB must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Persisted wrapper: `{ "settings": { ... } }`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub settings: Settings,
}

/// Capture loop timing.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Interval between periodic checks.
    pub poll_interval: Duration,

    /// In-flight age after which the check guard is force-cleared.
    pub stale_after: Duration,

    /// Delay before the follow-up check of a forced trigger.
    pub forced_recheck_delay: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stale_after: Duration::from_secs(10),
            forced_recheck_delay: Duration::from_millis(300),
        }
    }
}

/// Read-only settings view with change notifications.
///
/// Cloning shares the underlying channel, so every clone observes updates.
#[derive(Clone)]
pub struct SettingsProvider {
    sender: watch::Sender<Settings>,
}

impl SettingsProvider {
    pub fn new(settings: Settings) -> Self {
        let (sender, _) = watch::channel(settings);
        Self { sender }
    }

    /// Current settings snapshot.
    pub fn current(&self) -> Settings {
        self.sender.borrow().clone()
    }

    pub fn verbose(&self) -> bool {
        self.sender.borrow().verbose_logging
    }

    /// Receiver that is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.sender.subscribe()
    }

    /// Validate and publish new settings.
    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.sender.send_replace(settings);
        Ok(())
    }
}

impl Default for SettingsProvider {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
