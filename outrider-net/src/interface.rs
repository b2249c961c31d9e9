//! [`NetworkInterface`] — public entry point for submitting and cancelling
//! remote commands and alarms.
//!
//! # Threading
//!
//! One dedicated networking thread drives the reactor: a current-thread
//! tokio runtime parked on a shutdown signal.  Sessions, attempts, and
//! alarm timers all run as tasks on that runtime; caller threads only
//! enqueue work through the runtime handle and are woken by completion
//! continuations (on the baton of their choosing).
//!
//! # Registries
//!
//! Two handle→operation maps exist only for cancellation lookup, never for
//! liveness: sessions are held weakly (the in-flight task chain owns them),
//! and each operation erases itself when fully done.  The registry lock is
//! held for insert/lookup/erase only, never across a suspension point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use outrider_domain::{
    //
    BatonPtr,
    CommandOutcome,
    OpHandle,
    OutriderError,
    PoolPtr,
    PoolStats,
    RemoteRequest,
    Result,
};

use super::alarm::AlarmState;
use super::counters::{CounterSnapshot, NetworkCounters};
use super::session::CommandSession;

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Interface lifecycle.  Transitions are monotonic — there is no way back
/// from a later state to an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecycleState {
    // ---
    NotStarted = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

// ---

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecycleState::Running,
            2 => LifecycleState::ShuttingDown,
            3 => LifecycleState::Stopped,
            _ => LifecycleState::NotStarted,
        }
    }
}

// ---------------------------------------------------------------------------
// Reactor
// ---------------------------------------------------------------------------

/// The networking thread and its runtime handle.
struct Reactor {
    // ---
    handle: tokio::runtime::Handle,
    stop: Arc<Notify>,
    thread: std::thread::JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// NetworkInterface
// ---------------------------------------------------------------------------

/// Cheap-clone facade over the shared interface state, in the spirit of a
/// session-manager handle: callers keep a clone, completions run wherever
/// their baton says.
#[derive(Clone)]
pub struct NetworkInterface {
    // ---
    inner: Arc<Inner>,
}

// ---

struct Inner {
    // ---
    instance_name: String,
    pool: PoolPtr,
    counters: Arc<NetworkCounters>,

    state: AtomicU8,
    reactor: Mutex<Option<Reactor>>,

    in_progress: Mutex<HashMap<OpHandle, Weak<CommandSession>>>,
    in_progress_alarms: Mutex<HashMap<OpHandle, Arc<AlarmState>>>,
}

// ---

impl Inner {
    // ---
    fn lifecycle(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn quiesced(&self) -> bool {
        self.in_progress.lock().is_empty() && self.in_progress_alarms.lock().is_empty()
    }
}

// ---

impl NetworkInterface {
    // ---
    pub fn new(instance_name: impl Into<String>, pool: PoolPtr) -> Self {
        // ---
        Self {
            inner: Arc::new(Inner {
                instance_name: instance_name.into(),
                pool,
                counters: Arc::new(NetworkCounters::new()),
                state: AtomicU8::new(LifecycleState::NotStarted as u8),
                reactor: Mutex::new(None),
                in_progress: Mutex::new(HashMap::new()),
                in_progress_alarms: Mutex::new(HashMap::new()),
            }),
        }
    }

    // ---

    /// Start the networking thread.  Must be called exactly once, before
    /// any submission.
    pub fn startup(&self) -> Result<()> {
        // ---
        let inner = &self.inner;
        let mut reactor = inner.reactor.lock();

        if inner.lifecycle() != LifecycleState::NotStarted {
            return Err(OutriderError::Internal("startup called twice".into()));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| OutriderError::Internal(format!("failed to build reactor: {e}")))?;
        let handle = runtime.handle().clone();

        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let drain_view = Arc::clone(inner);

        let thread = std::thread::Builder::new()
            .name("outrider-net".into())
            .spawn(move || {
                runtime.block_on(async move {
                    stop_signal.notified().await;
                    // shutdown() has already fanned out cancellation; wait
                    // here until every session and alarm has unwound.
                    while !drain_view.quiesced() {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                });
            })
            .map_err(|e| OutriderError::Internal(format!("failed to spawn networking thread: {e}")))?;

        *reactor = Some(Reactor {
            handle,
            stop,
            thread,
        });
        inner.state.store(LifecycleState::Running as u8, Ordering::Release);

        info!(instance = %inner.instance_name, "network interface started");
        Ok(())
    }

    // ---

    /// Stop the interface: cancel every outstanding command and alarm, wait
    /// for the networking thread to quiesce and exit.
    ///
    /// Idempotent.  Commands resolve with `ShutdownInProgress`, alarms with
    /// `Cancelled`; every outstanding operation has resolved by the time
    /// the first `shutdown()` call returns.  A concurrent second call
    /// returns immediately while the first finishes the job.
    pub fn shutdown(&self) {
        // ---
        let inner = &self.inner;

        let reactor = {
            let mut guard = inner.reactor.lock();
            match inner.lifecycle() {
                LifecycleState::NotStarted => {
                    inner
                        .state
                        .store(LifecycleState::Stopped as u8, Ordering::Release);
                    return;
                }
                LifecycleState::Running => {
                    inner
                        .state
                        .store(LifecycleState::ShuttingDown as u8, Ordering::Release);
                    guard.take()
                }
                LifecycleState::ShuttingDown | LifecycleState::Stopped => return,
            }
        };

        info!(instance = %inner.instance_name, "network interface shutting down");

        // Resolve everything outstanding before stopping the reactor.
        let sessions: Vec<_> = inner
            .in_progress
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for session in sessions {
            session.cancel(OutriderError::ShutdownInProgress);
        }

        let alarms: Vec<_> = {
            let mut map = inner.in_progress_alarms.lock();
            map.drain().map(|(_, alarm)| alarm).collect()
        };
        for alarm in alarms {
            alarm.cancel();
        }

        if let Some(reactor) = reactor {
            reactor.stop.notify_one();
            if reactor.thread.join().is_err() {
                warn!("networking thread panicked during shutdown");
            }
        }

        inner
            .state
            .store(LifecycleState::Stopped as u8, Ordering::Release);
        info!(instance = %inner.instance_name, "network interface stopped");
    }

    // ---

    pub fn in_shutdown(&self) -> bool {
        self.inner.lifecycle() >= LifecycleState::ShuttingDown
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.lifecycle()
    }

    // ---

    /// Submit a command against one or more candidate targets.
    ///
    /// Exactly one terminal outcome is delivered to `on_finish`, on `baton`,
    /// no matter how the race between the candidates, the deadline, and any
    /// cancellation plays out.
    pub fn submit_command(
        &self,
        handle: OpHandle,
        request: RemoteRequest,
        deadline: Option<Instant>,
        baton: BatonPtr,
        on_finish: impl FnOnce(CommandOutcome) + Send + 'static,
    ) -> Result<()> {
        // ---
        let inner = &self.inner;

        if request.targets.is_empty() {
            return Err(OutriderError::Internal(
                "command names no candidate targets".into(),
            ));
        }
        if inner.lifecycle() != LifecycleState::Running {
            return Err(OutriderError::ShutdownInProgress);
        }
        let reactor_handle = inner
            .reactor
            .lock()
            .as_ref()
            .map(|r| r.handle.clone())
            .ok_or(OutriderError::ShutdownInProgress)?;

        debug!(
            %handle,
            candidates = request.targets.len(),
            bytes = request.payload.len(),
            "command submitted"
        );

        let session = CommandSession::new(
            handle,
            request,
            deadline,
            Arc::clone(&inner.pool),
            Arc::clone(&inner.counters),
            baton,
            Box::new(on_finish),
        );
        inner
            .in_progress
            .lock()
            .insert(handle, Arc::downgrade(&session));

        // A shutdown that began between the state check and the insert may
        // have missed this session in its cancellation sweep.  Resolve and
        // erase it here, before handing it to a reactor that may already be
        // gone; the registry mutex orders this load against the sweep, so
        // one of the two always sees the session.
        if inner.lifecycle() != LifecycleState::Running {
            session.cancel(OutriderError::ShutdownInProgress);
            inner.in_progress.lock().remove(&handle);
            return Ok(());
        }

        // From here the entry stays registered until the driver's teardown,
        // which also keeps the reactor alive until the session unwinds.
        let registry = Arc::clone(inner);
        reactor_handle.spawn(Arc::clone(&session).run(Box::new(move || {
            registry.in_progress.lock().remove(&handle);
        })));

        Ok(())
    }

    // ---

    /// Cancel an in-flight command.  Unknown or already-completed handles
    /// are a silent no-op — cancellation racing completion is expected.
    pub fn cancel_command(&self, handle: OpHandle) {
        // ---
        let session = self
            .inner
            .in_progress
            .lock()
            .get(&handle)
            .and_then(Weak::upgrade);

        match session {
            Some(session) => session.cancel(OutriderError::Cancelled),
            None => debug!(%handle, "cancel for unknown or completed command — ignored"),
        }
    }

    // ---

    /// Schedule `action` to run at the absolute time `when`.
    ///
    /// A fire time at or before now runs the action synchronously with
    /// `Err(Timeout)` before this call returns, so the caller can tell an
    /// already-elapsed schedule from a normal fire.  Otherwise the action
    /// eventually receives `Ok(())` when the timer fires or
    /// `Err(Cancelled)` if the alarm is cancelled first — exactly one of
    /// the three, exactly once.
    pub fn schedule_alarm(
        &self,
        handle: OpHandle,
        when: Instant,
        action: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Result<()> {
        // ---
        let inner = &self.inner;

        if inner.lifecycle() != LifecycleState::Running {
            return Err(OutriderError::ShutdownInProgress);
        }

        if when <= Instant::now() {
            debug!(%handle, "alarm fire time already elapsed — running action now");
            action(Err(OutriderError::Timeout));
            return Ok(());
        }

        let reactor_handle = inner
            .reactor
            .lock()
            .as_ref()
            .map(|r| r.handle.clone())
            .ok_or(OutriderError::ShutdownInProgress)?;

        let state = AlarmState::new(handle, when, Box::new(action));
        inner
            .in_progress_alarms
            .lock()
            .insert(handle, Arc::clone(&state));

        let registry = Arc::clone(inner);
        let timer_state = Arc::clone(&state);
        reactor_handle.spawn(async move {
            timer_state.run().await;
            registry.in_progress_alarms.lock().remove(&handle);
        });

        // Same sweep race as submit_command.
        if inner.lifecycle() != LifecycleState::Running {
            if let Some(state) = inner.in_progress_alarms.lock().remove(&handle) {
                state.cancel();
            }
        }

        Ok(())
    }

    // ---

    /// Cancel a scheduled alarm.  Idempotent; a no-op if the alarm already
    /// fired or was never known.
    pub fn cancel_alarm(&self, handle: OpHandle) {
        // ---
        let alarm = self.inner.in_progress_alarms.lock().remove(&handle);
        match alarm {
            Some(alarm) => alarm.cancel(),
            None => debug!(%handle, "cancel for unknown or fired alarm — ignored"),
        }
    }

    // ---
    // Diagnostics
    // ---

    pub fn instance_name(&self) -> &str {
        &self.inner.instance_name
    }

    /// Local host name, for diagnostics.
    pub fn host_name(&self) -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".into())
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Connection-pool occupancy snapshot.
    pub fn connection_stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Operation and byte counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.inner.counters.snapshot()
    }

    /// Free-form one-line diagnostic summary.
    pub fn diagnostic_string(&self) -> String {
        // ---
        let inner = &self.inner;
        let snap = inner.counters.snapshot();
        format!(
            "NetworkInterface[{}] state={:?} inProgress={} inProgressAlarms={} \
             sent={} succeeded={} failed={} timedOut={} cancelled={}",
            inner.instance_name,
            inner.lifecycle(),
            inner.in_progress.lock().len(),
            inner.in_progress_alarms.lock().len(),
            snap.sent,
            snap.succeeded,
            snap.failed,
            snap.timed_out,
            snap.cancelled,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
