//! Clipboard capture.
//!
//! The [`CaptureLoop`] moves between three states:
//! - `Idle`: waiting for a tick or a trigger
//! - `Checking`: reading the source and possibly committing
//! - `StaleRecovery`: a wedged check was evicted from the guard
//!
//! Periodic ticks honour the source's skip advice (typing, selection);
//! forced checks from copy/paste triggers read through it.

mod guard;
mod monitor;
mod source;

pub use monitor::{CaptureHandle, CaptureLoop, CaptureState, CheckOutcome, ForcedCheck, Trigger};
pub use source::{MemorySource, SkipReason, SnapshotKind, SnapshotSource, SourceRead};
