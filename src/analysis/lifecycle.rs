use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// Ownership state of an analysis buffer pair.
///
/// `Active` accepts fetches. `Draining` refuses new fetches and waits for
/// in-flight ones to finish. `Freed` means the buffers are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Draining,
    Freed,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Active,
            1 => LifecycleState::Draining,
            _ => LifecycleState::Freed,
        }
    }
}

/// Liveness flag plus in-flight counter guarding a fetch across await points.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    in_flight: AtomicUsize,
    drained: Notify,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Active as u8),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Register an in-flight operation. Returns `None` unless `Active`.
    pub fn try_enter(&self) -> Option<FetchGuard<'_>> {
        // Count first, then check: a concurrent `deactivate` either sees this
        // operation in the counter or this operation sees the new state.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = FetchGuard { lifecycle: self };
        if self.is_active() {
            Some(guard)
        } else {
            None
        }
    }

    /// Stop honouring new operations. Returns false if already deactivated.
    pub fn deactivate(&self) -> bool {
        let swapped = self
            .state
            .compare_exchange(
                LifecycleState::Active as u8,
                LifecycleState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if swapped {
            debug!(in_flight = self.in_flight(), "lifecycle draining");
        }
        swapped
    }

    /// Deactivate, wait until nothing is in flight, then mark `Freed`.
    pub async fn drain(&self) {
        self.deactivate();

        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                break;
            }
            notified.await;
        }

        self.state
            .store(LifecycleState::Freed as u8, Ordering::SeqCst);
        debug!("lifecycle freed");
    }

    fn leave(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Marks one in-flight operation; released on drop.
#[derive(Debug)]
pub struct FetchGuard<'a> {
    lifecycle: &'a Lifecycle,
}

impl FetchGuard<'_> {
    /// Whether the owner is still active. Checked after a fetch resolves.
    pub fn still_active(&self) -> bool {
        self.lifecycle.is_active()
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.leave();
    }
}
