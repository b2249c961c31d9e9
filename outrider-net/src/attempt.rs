//! [`RequestAttempt`] — one candidate-host try for one command.
//!
//! An attempt leases a connection, sends the request, and awaits the reply,
//! checking for cancellation before every suspension point.  Whatever
//! happens — success, failure, or cancellation at any stage — the leased
//! connection is moved into [`ConnectionPool::reclaim`] on that exit path,
//! so a connection can neither leak nor be returned twice, and the terminal
//! result is reported to the owning session from the task's single exit
//! point.
//!
//! There are no retries here: trying another candidate is the session's
//! race, not this component's.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::debug;

use outrider_domain::{
    //
    HostAndPort,
    OutriderError,
    ReclaimStatus,
    RemoteResponse,
    Result,
};

use super::session::CommandSession;

// ---------------------------------------------------------------------------
// AttemptPhase
// ---------------------------------------------------------------------------

/// Where the attempt currently is, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum AttemptPhase {
    // ---
    Unstarted = 0,
    AwaitingConnection = 1,
    Sending = 2,
    AwaitingResponse = 3,
    Finished = 4,
}

// ---

impl AttemptPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => AttemptPhase::AwaitingConnection,
            2 => AttemptPhase::Sending,
            3 => AttemptPhase::AwaitingResponse,
            4 => AttemptPhase::Finished,
            _ => AttemptPhase::Unstarted,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestAttempt
// ---------------------------------------------------------------------------

pub(crate) struct RequestAttempt {
    // ---
    session: Arc<CommandSession>,
    target: HostAndPort,

    /// Flipped by [`cancel`](Self::cancel); observed between suspension
    /// points and raced against every await.
    cancel_tx: watch::Sender<bool>,

    phase: AtomicU8,
}

// ---

impl RequestAttempt {
    // ---
    pub(crate) fn new(session: Arc<CommandSession>, target: HostAndPort) -> Arc<Self> {
        // ---
        debug_assert!(
            session.request.targets.contains(&target),
            "attempt target must be one of the command's candidates"
        );

        let (cancel_tx, _) = watch::channel(false);
        Arc::new(Self {
            session,
            target,
            cancel_tx,
            phase: AtomicU8::new(AttemptPhase::Unstarted as u8),
        })
    }

    // ---

    pub(crate) fn phase(&self) -> AttemptPhase {
        AttemptPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: AttemptPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    // ---

    /// Advisory cancel.  If the attempt has not leased yet, the eventual
    /// lease is abandoned; if a send is in flight, the exchange is dropped
    /// and the connection reclaimed as failed.  The attempt still reports
    /// its own termination afterwards.
    pub(crate) fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    // ---

    /// Task body.  The one call to [`CommandSession::report`] at the single
    /// exit point is what makes double-reporting structurally impossible.
    pub(crate) async fn run(self: Arc<Self>) {
        // ---
        let result = self.drive().await;
        self.set_phase(AttemptPhase::Finished);
        self.session.report(&self.target, result);
    }

    // ---

    async fn drive(&self) -> Result<RemoteResponse> {
        // ---
        let mut cancel_rx = self.cancel_tx.subscribe();

        // Preempted while still queued (timeout or cancel already won): do
        // not touch the pool at all.
        if *cancel_rx.borrow() || self.session.decided() {
            return Err(OutriderError::Cancelled);
        }

        self.set_phase(AttemptPhase::AwaitingConnection);
        debug!(target = %self.target, "requesting connection lease");

        let lease = tokio::select! {
            lease = self.session.pool.lease(&self.target, self.session.deadline) => lease,
            _ = cancel_signalled(&mut cancel_rx) => {
                // The dropped lease future is the pool's to clean up; a
                // connection produced after abandonment comes back unused.
                return Err(OutriderError::Cancelled);
            }
        };

        // Lease failures go straight to the session — no retry here.
        let mut conn = lease?;

        // Lost the race while leasing: hand the connection back untouched.
        if *cancel_rx.borrow() || self.session.decided() {
            self.session.pool.reclaim(conn, ReclaimStatus::Healthy);
            return Err(OutriderError::Cancelled);
        }

        self.set_phase(AttemptPhase::Sending);
        self.session
            .counters
            .record_sent(self.session.request.payload.len());
        let sent_at = Instant::now();

        let exchange = {
            let dispatch = conn.dispatch(&self.session.request);
            tokio::pin!(dispatch);
            tokio::select! {
                reply = std::future::poll_fn(|cx| {
                    let poll = dispatch.as_mut().poll(cx);
                    if poll.is_pending() {
                        // First pending poll: the request is on the wire.
                        self.set_phase(AttemptPhase::AwaitingResponse);
                    }
                    poll
                }) => Some(reply),
                _ = cancel_signalled(&mut cancel_rx) => None,
            }
        };

        match exchange {
            Some(Ok(payload)) => {
                self.session.pool.reclaim(conn, ReclaimStatus::Healthy);
                Ok(RemoteResponse {
                    target: self.target.clone(),
                    payload,
                    elapsed: sent_at.elapsed(),
                })
            }
            Some(Err(error)) => {
                self.session.pool.reclaim(conn, ReclaimStatus::Failed);
                Err(error)
            }
            None => {
                // Abandoned mid-exchange; the stream state is unknown.
                debug!(target = %self.target, "dispatch cancelled in flight");
                self.session.pool.reclaim(conn, ReclaimStatus::Failed);
                Err(OutriderError::Cancelled)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve once the cancel flag flips to `true`.
async fn cancel_signalled(cancel_rx: &mut watch::Receiver<bool>) {
    // ---
    while !*cancel_rx.borrow_and_update() {
        if cancel_rx.changed().await.is_err() {
            // Sender lives in the attempt itself, so this arm is never
            // reached while the attempt runs; never resolve spuriously.
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
