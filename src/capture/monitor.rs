//! The capture loop: polls and forced checks of the snapshot source.

use super::guard::{Acquire, CheckGuard};
use super::source::{SkipReason, SnapshotKind, SnapshotSource, SourceRead};
use crate::broadcast::Publisher;
use crate::config::CaptureConfig;
use crate::error::{HistoryError, Result};
use crate::history::HistoryStore;
use crate::persist::HistorySaver;
use crate::types::{Category, ContentHash, Item, ItemInput, Rejection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Logical state of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Checking,
    /// A wedged check was just evicted from the guard.
    StaleRecovery,
}

impl CaptureState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CaptureState::Checking,
            2 => CaptureState::StaleRecovery,
            _ => CaptureState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CaptureState::Idle => 0,
            CaptureState::Checking => 1,
            CaptureState::StaleRecovery => 2,
        }
    }
}

/// External signal that the user just copied or pasted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Copy,
    Paste,
}

/// Result of one capture cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckOutcome {
    Committed(Item),
    Rejected(Rejection),
    /// Same content as the last commit.
    Unchanged,
    Skipped(SkipReason),
    /// Nothing on the clipboard.
    Empty,
    /// Another check is in flight.
    Busy,
}

impl CheckOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CheckOutcome::Committed(_))
    }
}

/// Outcomes of a forced trigger: the immediate check and the delayed
/// follow-up (None when cancelled because the first one committed).
#[derive(Clone, Debug, PartialEq)]
pub struct ForcedCheck {
    pub first: CheckOutcome,
    pub second: Option<CheckOutcome>,
}

impl ForcedCheck {
    pub fn committed(&self) -> bool {
        self.first.is_committed() || self.second.as_ref().is_some_and(|o| o.is_committed())
    }
}

/// Fingerprints of the last content seen per representation.
///
/// A slot is cleared when its representation is absent or went unread.
#[derive(Default)]
struct LastSeen {
    text: Option<ContentHash>,
    image: Option<ContentHash>,
}

impl LastSeen {
    fn get(&self, kind: SnapshotKind) -> Option<ContentHash> {
        match kind {
            SnapshotKind::Image => self.image,
            SnapshotKind::Text => self.text,
        }
    }

    fn set(&mut self, kind: SnapshotKind, hash: Option<ContentHash>) {
        match kind {
            SnapshotKind::Image => self.image = hash,
            SnapshotKind::Text => self.text = hash,
        }
    }
}

/// Polls the snapshot source and commits new content into the store.
///
/// Ticks keep firing while a slow read is outstanding; the guard ensures only
/// one check reads and commits at a time, and a check stuck past
/// `stale_after` loses its claim to the next one.
pub struct CaptureLoop {
    source: Arc<dyn SnapshotSource>,
    store: Arc<HistoryStore>,
    publisher: Arc<Publisher>,
    saver: Option<Arc<HistorySaver>>,
    config: CaptureConfig,
    guard: CheckGuard,
    state: AtomicU8,
    last_seen: Mutex<LastSeen>,
    /// Checks spawned by the run loop.
    tasks: TaskTracker,
}

impl CaptureLoop {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: Arc<HistoryStore>,
        publisher: Arc<Publisher>,
        config: CaptureConfig,
    ) -> Self {
        // Don't re-promote what is already at the head after a restart.
        let mut last_seen = LastSeen::default();
        if let Some(head) = store.head() {
            let kind = match head.category {
                Category::Image => SnapshotKind::Image,
                Category::Text | Category::Url | Category::Code => SnapshotKind::Text,
            };
            last_seen.set(kind, Some(head.fingerprint()));
        }

        Self {
            source,
            store,
            publisher,
            saver: None,
            guard: CheckGuard::new(config.stale_after),
            config,
            state: AtomicU8::new(CaptureState::Idle.as_u8()),
            last_seen: Mutex::new(last_seen),
            tasks: TaskTracker::new(),
        }
    }

    /// Save the history after every commit.
    pub fn with_saver(mut self, saver: Arc<HistorySaver>) -> Self {
        self.saver = Some(saver);
        self
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: CaptureState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn verbose(&self) -> bool {
        self.store.settings().verbose()
    }

    /// Run one capture cycle.
    ///
    /// A forced check reads through interaction skips (typing, selection).
    pub async fn check(&self, forced: bool) -> CheckOutcome {
        let ticket = match self.guard.try_acquire() {
            Acquire::Acquired(ticket) => {
                self.set_state(CaptureState::Checking);
                ticket
            }
            // Stays in StaleRecovery until the recovering check finishes.
            Acquire::Recovered(ticket, age) => {
                self.set_state(CaptureState::StaleRecovery);
                warn!(?age, "capture check exceeded staleness threshold, guard reset");
                ticket
            }
            Acquire::Busy => {
                if self.verbose() {
                    debug!(forced, "capture check already in flight");
                }
                return CheckOutcome::Busy;
            }
        };

        let outcome = self.run_cycle(forced).await;
        match &outcome {
            CheckOutcome::Committed(item) => {
                self.publisher.publish_changed();
                if let Err(e) = self.persist().await {
                    warn!(error = %e, "failed to persist history after capture");
                }
                debug!(
                    id = %item.id,
                    category = %item.category,
                    forced,
                    "captured clipboard content"
                );
            }
            CheckOutcome::Skipped(reason) => {
                if self.verbose() {
                    debug!(%reason, forced, "capture skipped");
                }
            }
            CheckOutcome::Rejected(_)
            | CheckOutcome::Unchanged
            | CheckOutcome::Empty
            | CheckOutcome::Busy => {}
        }

        if ticket.release() {
            self.set_state(CaptureState::Idle);
        }
        outcome
    }

    /// Image first; an image commit ends the cycle.
    async fn run_cycle(&self, forced: bool) -> CheckOutcome {
        let image = self.source.read(SnapshotKind::Image).await;
        let image_outcome = self.process(SnapshotKind::Image, image, forced);
        if image_outcome.is_committed() {
            // Text went unread this cycle; compare it afresh next time.
            self.last_seen.lock().set(SnapshotKind::Text, None);
            return image_outcome;
        }

        let text = self.source.read(SnapshotKind::Text).await;
        let text_outcome = self.process(SnapshotKind::Text, text, forced);

        match (image_outcome, text_outcome) {
            (_, committed @ CheckOutcome::Committed(_)) => committed,
            (rejected @ CheckOutcome::Rejected(_), _) => rejected,
            (_, text_outcome) => text_outcome,
        }
    }

    fn process(&self, kind: SnapshotKind, read: SourceRead, forced: bool) -> CheckOutcome {
        if let Some(reason) = read.skip {
            if !(forced && reason.bypassed_when_forced()) {
                return CheckOutcome::Skipped(reason);
            }
        }

        let raw = match read.raw {
            Some(raw) if read.available && !raw.trim().is_empty() => raw,
            _ => {
                // Content that comes back after being replaced is new again.
                self.last_seen.lock().set(kind, None);
                return CheckOutcome::Empty;
            }
        };

        let fingerprint = ContentHash::of(&raw);
        if self.last_seen.lock().get(kind) == Some(fingerprint) {
            return CheckOutcome::Unchanged;
        }

        let mut input = ItemInput::new(raw);
        if kind == SnapshotKind::Image {
            input = input.with_category(Category::Image);
        }

        match self.store.insert_or_promote(input) {
            Ok(item) => {
                self.last_seen.lock().set(kind, Some(fingerprint));
                CheckOutcome::Committed(item)
            }
            Err(HistoryError::Rejected(rejection)) => {
                // Remember it so the warning fires once, not every tick.
                self.last_seen.lock().set(kind, Some(fingerprint));
                self.publisher.publish_rejected(&rejection);
                CheckOutcome::Rejected(rejection)
            }
            Err(e) => CheckOutcome::Skipped(SkipReason::Unreadable(e.to_string())),
        }
    }

    async fn persist(&self) -> Result<()> {
        match &self.saver {
            Some(saver) => saver.save().await,
            None => Ok(()),
        }
    }

    /// Handle a copy/paste signal.
    ///
    /// Checks immediately and schedules a follow-up after
    /// `forced_recheck_delay`, since the external write can lag the signal.
    /// The follow-up is cancelled if the first check commits.
    pub async fn forced_check(self: Arc<Self>, trigger: Trigger) -> ForcedCheck {
        let recheck = CancellationToken::new();
        let delayed = {
            let this = Arc::clone(&self);
            let token = recheck.clone();
            let delay = self.config.forced_recheck_delay;
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => None,
                    _ = tokio::time::sleep(delay) => Some(this.check(true).await),
                }
            })
        };

        let first = self.check(true).await;
        if first.is_committed() {
            recheck.cancel();
        }

        let second = match delayed.await {
            Ok(second) => second,
            Err(e) => {
                warn!(?trigger, error = %e, "delayed capture check failed");
                None
            }
        };
        ForcedCheck { first, second }
    }

    /// Run until `cancel` fires.
    ///
    /// Each tick and trigger runs its check as its own task so a slow read
    /// never delays the timer.
    pub async fn run(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<Trigger>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut triggers_open = true;

        info!(interval = ?self.config.poll_interval, "capture loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    self.tasks.spawn(async move {
                        this.check(false).await;
                    });
                }
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(trigger) => {
                        let this = Arc::clone(&self);
                        self.tasks.spawn(async move {
                            this.forced_check(trigger).await;
                        });
                    }
                    None => triggers_open = false,
                },
            }
        }
        info!("capture loop stopped");
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self: Arc<Self>) -> CaptureHandle {
        let (sender, receiver) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&self).run(receiver, cancel.clone()));
        CaptureHandle {
            capture: self,
            triggers: sender,
            cancel,
            task,
        }
    }
}

/// Control handle for a running capture loop.
pub struct CaptureHandle {
    capture: Arc<CaptureLoop>,
    triggers: mpsc::Sender<Trigger>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    /// Request a forced check. Returns false if the loop is gone or the
    /// trigger queue is full.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.triggers.try_send(trigger).is_ok()
    }

    pub fn capture(&self) -> &Arc<CaptureLoop> {
        &self.capture
    }

    /// Stop the loop and wait for it and its in-flight checks to exit.
    ///
    /// Checks are waited on for at most `stale_after`; a check wedged in the
    /// source past that may still commit afterwards.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await?;

        let tasks = &self.capture.tasks;
        tasks.close();
        let limit = self.capture.config.stale_after;
        if tokio::time::timeout(limit, tasks.wait()).await.is_err() {
            warn!(pending = tasks.len(), "capture checks still running after shutdown");
        }
        Ok(())
    }
}
