//! Single in-flight guard with staleness recovery.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct InFlight {
    ticket: u64,
    started: Instant,
}

/// Admits one check at a time.
///
/// A check that holds the guard longer than `stale_after` is presumed wedged
/// and its claim is overridden by the next caller.
pub(crate) struct CheckGuard {
    slot: Mutex<Option<InFlight>>,
    next_ticket: Mutex<u64>,
    stale_after: Duration,
}

pub(crate) enum Acquire<'a> {
    Acquired(GuardTicket<'a>),
    /// The previous holder was stale for this long and has been evicted.
    Recovered(GuardTicket<'a>, Duration),
    Busy,
}

impl CheckGuard {
    pub(crate) fn new(stale_after: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            next_ticket: Mutex::new(0),
            stale_after,
        }
    }

    pub(crate) fn try_acquire(&self) -> Acquire<'_> {
        let now = Instant::now();
        let mut slot = self.slot.lock();

        let stale_for = match slot.as_ref() {
            Some(held) => {
                let age = now.duration_since(held.started);
                if age < self.stale_after {
                    return Acquire::Busy;
                }
                Some(age)
            }
            None => None,
        };

        let ticket = {
            let mut next = self.next_ticket.lock();
            *next += 1;
            *next
        };
        *slot = Some(InFlight {
            ticket,
            started: now,
        });

        let guard = GuardTicket {
            guard: self,
            ticket,
        };
        match stale_for {
            Some(age) => Acquire::Recovered(guard, age),
            None => Acquire::Acquired(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Clear the slot if `ticket` still owns it.
    fn release(&self, ticket: u64) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(held) if held.ticket == ticket => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

/// Proof of holding the guard; releases on drop.
pub(crate) struct GuardTicket<'a> {
    guard: &'a CheckGuard,
    ticket: u64,
}

impl GuardTicket<'_> {
    /// Release now. Returns false if the claim was already overridden.
    pub(crate) fn release(self) -> bool {
        let released = self.guard.release(self.ticket);
        std::mem::forget(self);
        released
    }
}

impl Drop for GuardTicket<'_> {
    fn drop(&mut self) {
        self.guard.release(self.ticket);
    }
}
