//! [`CommandSession`] — one logical in-flight command.
//!
//! A session owns the set of [`RequestAttempt`]s racing against each other,
//! the deadline timer, and the single completion delivered to the caller
//! exactly once.  The [`FinishLine`] arbitrates which participant — a
//! finished attempt, the deadline, or an external cancel — resolves the
//! outcome; everyone else's result is discarded after its connection has
//! been returned.
//!
//! # Dispatch policy
//!
//! Parallel fan-out: every candidate target is launched at once and the
//! first admission wins.  A successful response admits immediately; a
//! failure only admits once it is the last attempt still standing, so a
//! fast-fail from an unreachable host can never outrank a slower success
//! from a healthy one.  A staggered policy (launch the next candidate only
//! after a per-attempt delay) would bias the race further toward healthy
//! hosts and could be layered on top without touching the admission rules.
//!
//! # Lifecycle
//!
//! `Created → Dispatching → Racing → Resolving → Done`.  The session's
//! driver task fans out the attempts, joins them all (every join implies
//! that attempt's connection is back in the pool), and then runs its
//! one-time teardown behind the finish line's done latch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use outrider_domain::{
    //
    BatonPtr,
    CommandOutcome,
    HostAndPort,
    OpHandle,
    OutriderError,
    PoolPtr,
    RemoteRequest,
    RemoteResponse,
    Result,
};

use super::attempt::RequestAttempt;
use super::counters::NetworkCounters;
use super::finish_line::FinishLine;

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Completion continuation for one command.
pub(crate) type OnFinish = Box<dyn FnOnce(CommandOutcome) + Send>;

/// One-time cleanup run when the session is fully done (outcome resolved
/// and every attempt unwound).  The facade uses this to erase its registry
/// entry.
pub(crate) type Teardown = Box<dyn FnOnce() + Send>;

// ---

/// Move-only resolution token: holds the caller's continuation and the
/// baton it must run on.  Taking it out of its slot is the one and only way
/// to resolve the outcome, which makes double-resolution structurally
/// impossible.
struct Resolver {
    // ---
    on_finish: OnFinish,
    baton: BatonPtr,
}

// ---------------------------------------------------------------------------
// CommandSession
// ---------------------------------------------------------------------------

pub(crate) struct CommandSession {
    // ---
    pub(crate) handle: OpHandle,
    pub(crate) request: RemoteRequest,

    /// Absolute expiration, `None` for no expiration.
    pub(crate) deadline: Option<Instant>,

    pub(crate) pool: PoolPtr,
    pub(crate) counters: Arc<NetworkCounters>,
    pub(crate) finish_line: FinishLine,

    resolver: Mutex<Option<Resolver>>,

    /// Weak so the session never keeps an attempt alive past its own
    /// completion; an attempt may briefly outlive cancellation intent while
    /// unwinding.
    attempts: Mutex<Vec<Weak<RequestAttempt>>>,

    /// Attempts that have not yet reported a terminal result.  The last
    /// failure to report is the one that admits on behalf of the all-failed
    /// case.
    attempts_left: AtomicUsize,

    /// Most informative failure seen so far (see
    /// [`OutriderError::informativeness`]).
    best_failure: Mutex<Option<OutriderError>>,

    /// Flips to `true` the instant the outcome is resolved; wakes the
    /// deadline watcher.
    settled_tx: watch::Sender<bool>,

    started: Instant,
}

// ---

impl CommandSession {
    // ---
    pub(crate) fn new(
        handle: OpHandle,
        request: RemoteRequest,
        deadline: Option<Instant>,
        pool: PoolPtr,
        counters: Arc<NetworkCounters>,
        baton: BatonPtr,
        on_finish: OnFinish,
    ) -> Arc<Self> {
        // ---
        debug_assert!(!request.targets.is_empty(), "command without candidates");
        let candidates = request.targets.len();
        let (settled_tx, _) = watch::channel(false);

        Arc::new(Self {
            handle,
            request,
            deadline,
            pool,
            counters,
            finish_line: FinishLine::new(),
            resolver: Mutex::new(Some(Resolver { on_finish, baton })),
            attempts: Mutex::new(Vec::with_capacity(candidates)),
            attempts_left: AtomicUsize::new(candidates),
            best_failure: Mutex::new(None),
            settled_tx,
            started: Instant::now(),
        })
    }

    // ---

    /// Has any participant already won the race?
    pub(crate) fn decided(&self) -> bool {
        self.finish_line.is_decided()
    }

    // ---

    /// Driver task.  Fans the attempts out, arms the deadline, joins
    /// everything, then runs the one-time teardown.
    pub(crate) async fn run(self: Arc<Self>, teardown: Teardown) {
        // ---
        // A deadline already in the past resolves immediately, before any
        // connection is ever requested.
        if let Some(deadline) = self.deadline {
            if deadline <= Instant::now() {
                if self.finish_line.admit_weak() {
                    debug!(handle = %self.handle, "deadline elapsed before dispatch");
                    self.settle(Err(OutriderError::Timeout));
                }
                if self.finish_line.mark_done_at_least_once() {
                    teardown();
                }
                return;
            }
        }

        let deadline_watcher = self.deadline.map(|deadline| {
            let session = Arc::clone(&self);
            tokio::spawn(async move {
                let mut settled = session.settled_tx.subscribe();
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline.into()) => session.deadline_fired(),
                    _ = wait_for(&mut settled) => {} // disarmed
                }
            })
        });

        // Parallel fan-out: one attempt per candidate, all at once.
        let join_handles: Vec<_> = self
            .request
            .targets
            .clone()
            .into_iter()
            .map(|target| {
                let attempt = RequestAttempt::new(Arc::clone(&self), target);
                self.attempts.lock().push(Arc::downgrade(&attempt));
                tokio::spawn(attempt.run())
            })
            .collect();

        // Every join implies that attempt has reported and returned its
        // connection.  The outcome is necessarily resolved by now: the last
        // reporting attempt settles if nothing else already has.
        for join in join_handles {
            let _ = join.await;
        }
        debug_assert!(self.decided(), "all attempts reported but no admission");

        if let Some(watcher) = deadline_watcher {
            let _ = watcher.await;
        }

        if self.finish_line.mark_done_at_least_once() {
            teardown();
        }
    }

    // ---

    /// The single path by which an attempt reports its terminal result.
    ///
    /// Called exactly once per attempt (the attempt's task calls it at its
    /// single exit point).  A success races for strong admission right away;
    /// a failure is banked and only admits once every attempt has failed.
    pub(crate) fn report(&self, target: &HostAndPort, result: Result<RemoteResponse>) {
        // ---
        match result {
            Ok(response) => {
                if self.finish_line.admit_strong() {
                    info!(
                        handle = %self.handle,
                        target = %target,
                        elapsed_ms = response.elapsed.as_millis() as u64,
                        "command succeeded"
                    );
                    self.settle(Ok(response));
                    self.cancel_live_attempts();
                } else {
                    debug!(
                        handle = %self.handle,
                        target = %target,
                        "late success discarded — race already decided"
                    );
                }
                // Either way this attempt is accounted for.
                self.attempts_left.fetch_sub(1, Ordering::AcqRel);
            }

            Err(error) => {
                debug!(handle = %self.handle, target = %target, %error, "attempt failed");

                {
                    let mut best = self.best_failure.lock();
                    let more_informative = best
                        .as_ref()
                        .map_or(true, |held| error.informativeness() > held.informativeness());
                    if more_informative {
                        *best = Some(error);
                    }
                }

                // Last attempt standing: the all-failed case admits here.
                if self.attempts_left.fetch_sub(1, Ordering::AcqRel) == 1
                    && self.finish_line.admit_strong()
                {
                    if let Some(best) = self.best_failure.lock().take() {
                        self.settle(Err(best));
                    }
                }
            }
        }
    }

    // ---

    /// Deadline path: weak admission, so it can preempt attempts that have
    /// not produced a result yet.
    fn deadline_fired(&self) {
        // ---
        if self.finish_line.admit_weak() {
            info!(
                handle = %self.handle,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "command timed out"
            );
            self.settle(Err(OutriderError::Timeout));
            self.cancel_live_attempts();
        }
    }

    // ---

    /// External cancel path (caller cancel or interface shutdown).
    ///
    /// Safe from any thread; a no-op if the outcome already resolved —
    /// cancellation racing completion is expected and harmless.
    pub(crate) fn cancel(&self, reason: OutriderError) {
        // ---
        if self.finish_line.admit_weak() {
            info!(handle = %self.handle, %reason, "command cancelled");
            self.settle(Err(reason));
            self.cancel_live_attempts();
        } else {
            debug!(handle = %self.handle, "cancel after resolution — ignored");
        }
    }

    // ---

    /// Resolve the outcome promise.  Callers must hold an admission from the
    /// finish line; the resolver token can only be taken once regardless.
    fn settle(&self, outcome: CommandOutcome) {
        // ---
        match &outcome {
            Ok(response) => self.counters.record_succeeded(response.payload.len()),
            Err(OutriderError::Timeout) => self.counters.record_timed_out(),
            Err(OutriderError::Cancelled) | Err(OutriderError::ShutdownInProgress) => {
                self.counters.record_cancelled()
            }
            Err(_) => self.counters.record_failed(),
        }

        if let Some(resolver) = self.resolver.lock().take() {
            let on_finish = resolver.on_finish;
            resolver
                .baton
                .run(Box::new(move || on_finish(outcome)));
        }

        self.settled_tx.send_replace(true);
    }

    // ---

    /// Tell every still-live attempt to stand down.  Attempts unwind on
    /// their own time; their connections come back as they do.
    fn cancel_live_attempts(&self) {
        // ---
        for attempt in self.attempts.lock().iter() {
            if let Some(attempt) = attempt.upgrade() {
                attempt.cancel();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Wait until the settled flag flips.
async fn wait_for(settled: &mut watch::Receiver<bool>) {
    // ---
    while !*settled.borrow_and_update() {
        if settled.changed().await.is_err() {
            // Session dropped without settling — cannot happen while the
            // driver holds it, but never spin.
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::time::Duration;

    use tokio::sync::oneshot;

    use outrider_domain::{HostAndPort, InlineBaton, OpHandle, PoolPtr};
    use outrider_link_sim::{DispatchOutcome, HostProfile, SimConfig, SimPool};

    use super::*;

    // ---

    fn host(name: &str) -> HostAndPort {
        HostAndPort::new(name, 7400)
    }

    /// Build a session around `pool` and run it to completion, returning the
    /// delivered outcome.
    async fn run_session(
        pool: &Arc<SimPool>,
        targets: Vec<HostAndPort>,
        deadline: Option<Instant>,
    ) -> CommandOutcome {
        // ---
        let (tx, rx) = oneshot::channel();
        let session = CommandSession::new(
            OpHandle::new(),
            RemoteRequest::new(targets, b"ping".to_vec()),
            deadline,
            Arc::clone(pool) as PoolPtr,
            Arc::new(NetworkCounters::new()),
            Arc::new(InlineBaton),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        session.run(Box::new(|| {})).await;
        rx.await.expect("outcome delivered")
    }

    // ---

    /// Host A's lease fails fast, host B answers later: B's success must win
    /// and A's failure is discarded.
    #[tokio::test(start_paused = true)]
    async fn success_outranks_earlier_failure() {
        // ---
        let a = host("a.example.net");
        let b = host("b.example.net");

        let pool = SimPool::new(
            SimConfig::new()
                .host(a.clone(), HostProfile::unreachable("connection refused"))
                .host(b.clone(), HostProfile::healthy(b"pong").dispatch_latency_ms(20)),
        );

        let deadline = Instant::now() + Duration::from_millis(100);
        let outcome = run_session(&pool, vec![a, b.clone()], Some(deadline)).await;

        let response = outcome.expect("B's success wins");
        assert_eq!(response.target, b);
        assert_eq!(response.payload, b"pong");
        assert_eq!(pool.outstanding(), 0, "every lease returned");
    }

    // ---

    /// All candidates fail: the most informative failure is surfaced.
    #[tokio::test(start_paused = true)]
    async fn all_failed_surfaces_most_informative_failure() {
        // ---
        let a = host("refused.example.net");
        let b = host("reset.example.net");

        let pool = SimPool::new(
            SimConfig::new()
                .host(a.clone(), HostProfile::unreachable("connection refused"))
                .host(
                    b.clone(),
                    HostProfile::healthy(b"")
                        .dispatch(DispatchOutcome::TransportError("peer reset".into())),
                ),
        );

        let outcome = run_session(&pool, vec![a, b.clone()], None).await;

        match outcome {
            Err(OutriderError::Transport { target, .. }) => assert_eq!(target, b),
            other => panic!("expected the transport failure to win, got {other:?}"),
        }
        assert_eq!(pool.outstanding(), 0);
    }

    // ---

    /// A deadline 0ms in the past resolves Timeout without leasing anything.
    #[tokio::test(start_paused = true)]
    async fn past_deadline_times_out_without_leasing() {
        // ---
        let a = host("never-asked.example.net");
        let pool = SimPool::new(SimConfig::new().host(a.clone(), HostProfile::healthy(b"pong")));

        let deadline = Instant::now() - Duration::from_millis(1);
        let outcome = run_session(&pool, vec![a], Some(deadline)).await;

        assert_eq!(outcome, Err(OutriderError::Timeout));
        assert_eq!(pool.stats().total_leases, 0, "no connection was leased");
    }

    // ---

    /// One candidate whose lease never completes, deadline 50ms: Timeout at
    /// ~50ms and no connection ever leaks.
    #[tokio::test(start_paused = true)]
    async fn timeout_preempts_stalled_lease() {
        // ---
        let a = host("tarpit.example.net");
        let pool = SimPool::new(
            SimConfig::new().host(a.clone(), HostProfile::healthy(b"pong").lease_latency_ms(10_000)),
        );

        // Virtual clock: `begin` must come from tokio's time source or the
        // elapsed assertion below would read the (frozen) wall clock.
        let begin = tokio::time::Instant::now();
        let deadline = Instant::now() + Duration::from_millis(50);
        let outcome = run_session(&pool, vec![a], Some(deadline)).await;

        assert_eq!(outcome, Err(OutriderError::Timeout));
        assert!(begin.elapsed() >= Duration::from_millis(50));
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.stats().total_leases, 0, "abandoned lease never granted");
    }

    // ---

    /// The deadline fires while a response is still in flight: the attempt
    /// is cancelled mid-dispatch and its connection still comes back.
    #[tokio::test(start_paused = true)]
    async fn timeout_mid_dispatch_returns_the_connection() {
        // ---
        let a = host("slow.example.net");
        let pool = SimPool::new(
            SimConfig::new().host(a.clone(), HostProfile::healthy(b"pong").dispatch_latency_ms(500)),
        );

        let deadline = Instant::now() + Duration::from_millis(50);
        let outcome = run_session(&pool, vec![a], Some(deadline)).await;

        assert_eq!(outcome, Err(OutriderError::Timeout));
        assert_eq!(pool.stats().total_leases, 1);
        assert_eq!(pool.outstanding(), 0, "in-flight connection reclaimed");
    }

    // ---

    /// Cancelling after resolution neither panics nor alters the outcome.
    #[tokio::test(start_paused = true)]
    async fn cancel_after_resolution_is_a_no_op() {
        // ---
        let a = host("a.example.net");
        let pool = SimPool::new(SimConfig::new().host(a.clone(), HostProfile::healthy(b"pong")));

        let (tx, rx) = oneshot::channel();
        let session = CommandSession::new(
            OpHandle::new(),
            RemoteRequest::to_target(a, b"ping".to_vec()),
            None,
            Arc::clone(&pool) as PoolPtr,
            Arc::new(NetworkCounters::new()),
            Arc::new(InlineBaton),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        Arc::clone(&session).run(Box::new(|| {})).await;
        let outcome = rx.await.unwrap();
        assert!(outcome.is_ok());

        session.cancel(OutriderError::Cancelled);
        session.cancel(OutriderError::Cancelled);
        // The successful outcome already went out; nothing more to observe.
    }

    // ---

    /// External cancel before the race resolves delivers a cancel outcome
    /// and unwinds every attempt.
    #[tokio::test(start_paused = true)]
    async fn external_cancel_wins_over_in_flight_attempts() {
        // ---
        let a = host("slow.example.net");
        let pool = SimPool::new(
            SimConfig::new().host(a.clone(), HostProfile::healthy(b"pong").dispatch_latency_ms(500)),
        );

        let (tx, rx) = oneshot::channel();
        let session = CommandSession::new(
            OpHandle::new(),
            RemoteRequest::to_target(a, b"ping".to_vec()),
            None,
            Arc::clone(&pool) as PoolPtr,
            Arc::new(NetworkCounters::new()),
            Arc::new(InlineBaton),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        let driver = tokio::spawn(Arc::clone(&session).run(Box::new(|| {})));

        // Let the attempt get its connection and start dispatching.
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.cancel(OutriderError::Cancelled);

        driver.await.unwrap();
        assert_eq!(rx.await.unwrap(), Err(OutriderError::Cancelled));
        assert_eq!(pool.outstanding(), 0);
    }
}
