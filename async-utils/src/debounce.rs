use std::future::pending;
use std::time::Duration;
use tokio::time::Instant;
use tokio::time::sleep_until;

/// Trailing-edge debounce slot.
///
/// Every [`push`](Debounce::push) replaces the pending value and restarts the
/// quiet window. The value becomes due once the window elapses without another
/// push. The slot owns no timer: the caller asks for the
/// [`deadline`](Debounce::deadline), sleeps on it, then calls
/// [`take_due`](Debounce::take_due).
#[derive(Debug)]
pub struct Debounce<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Replace the pending value and restart the window at `now`.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// When the pending value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.window)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its window has elapsed by `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Drop the pending value without emitting it.
    pub fn clear(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

/// Sleep until `deadline`, or forever when there is none.
///
/// Lets an optional timer sit in a `tokio::select!` arm.
pub async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}
