use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use outrider_domain::{OpHandle, OutriderError, Result};

// ---------------------------------------------------------------------------
// AlarmState
// ---------------------------------------------------------------------------

/// The action an alarm runs when it resolves.
///
/// `Ok(())` — the timer fired at its fire time.
/// `Err(Timeout)` — the fire time had already elapsed at scheduling; the
/// facade runs the action synchronously without arming a timer.
/// `Err(Cancelled)` — the alarm was cancelled before firing.
pub(crate) type AlarmAction = Box<dyn FnOnce(Result<()>) + Send>;

// ---

/// One registered alarm: an absolute fire time, a cancellable timer, and a
/// write-once action.
///
/// Exactly-once resolution is structural: the action lives in a
/// `Mutex<Option<…>>` and is taken out at most once, by whichever of the
/// timer path and the cancel path gets there first.
pub(crate) struct AlarmState {
    // ---
    pub(crate) handle: OpHandle,
    pub(crate) when: Instant,

    cancelled: Notify,
    action: Mutex<Option<AlarmAction>>,
}

// ---

impl AlarmState {
    // ---
    pub(crate) fn new(handle: OpHandle, when: Instant, action: AlarmAction) -> Arc<Self> {
        Arc::new(Self {
            handle,
            when,
            cancelled: Notify::new(),
            action: Mutex::new(Some(action)),
        })
    }

    // ---

    fn take_action(&self) -> Option<AlarmAction> {
        self.action.lock().take()
    }

    // ---

    /// Disarm the timer and resolve the action with a cancellation outcome.
    ///
    /// Idempotent, callable from any thread; a no-op if the alarm already
    /// fired.
    pub(crate) fn cancel(&self) {
        // ---
        if let Some(action) = self.take_action() {
            debug!(handle = %self.handle, "alarm cancelled before firing");
            action(Err(OutriderError::Cancelled));
        }
        self.cancelled.notify_one();
    }

    // ---

    /// Timer task body.  Runs on the reactor; exits on fire or cancel.
    pub(crate) async fn run(self: Arc<Self>) {
        // ---
        tokio::select! {
            _ = tokio::time::sleep_until(self.when.into()) => {
                if let Some(action) = self.take_action() {
                    debug!(handle = %self.handle, "alarm fired");
                    action(Ok(()));
                }
            }
            _ = self.cancelled.notified() => {
                // cancel() has already resolved the action
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    // ---

    fn counting_action(hits: &Arc<AtomicUsize>, oks: &Arc<AtomicUsize>) -> AlarmAction {
        // ---
        let hits = Arc::clone(hits);
        let oks = Arc::clone(oks);
        Box::new(move |outcome| {
            hits.fetch_add(1, Ordering::SeqCst);
            if outcome.is_ok() {
                oks.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn alarm_fires_once_at_its_fire_time() {
        // ---
        let hits = Arc::new(AtomicUsize::new(0));
        let oks = Arc::new(AtomicUsize::new(0));

        let when = Instant::now() + Duration::from_millis(50);
        let state = AlarmState::new(OpHandle::new(), when, counting_action(&hits, &oks));

        let task = tokio::spawn(Arc::clone(&state).run());
        tokio::time::sleep(Duration::from_millis(60)).await;
        task.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(oks.load(Ordering::SeqCst), 1);

        // Cancelling after the fact is a harmless no-op.
        state.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn cancel_resolves_with_cancellation_and_disarms() {
        // ---
        let hits = Arc::new(AtomicUsize::new(0));
        let oks = Arc::new(AtomicUsize::new(0));

        let when = Instant::now() + Duration::from_secs(3600);
        let state = AlarmState::new(OpHandle::new(), when, counting_action(&hits, &oks));

        let task = tokio::spawn(Arc::clone(&state).run());
        tokio::task::yield_now().await;

        state.cancel();
        state.cancel(); // idempotent
        task.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1, "resolved exactly once");
        assert_eq!(oks.load(Ordering::SeqCst), 0, "resolved with cancellation");
    }
}
