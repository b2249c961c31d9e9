use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// NetworkCounters
// ---------------------------------------------------------------------------

/// Fire-and-forget operation and byte counters.
///
/// Pure observability: plain relaxed atomics, incremented from the hot path
/// without coordination, never consulted for correctness.  `sent` counts
/// dispatched attempts (a two-candidate fan-out counts twice); the outcome
/// counters count commands, exactly one increment per submitted command.
#[derive(Debug, Default)]
pub struct NetworkCounters {
    // ---
    sent: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,

    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

// ---

impl NetworkCounters {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    // ---

    pub fn record_sent(&self, bytes: usize) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self, bytes: usize) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    // ---

    pub fn snapshot(&self) -> CounterSnapshot {
        // ---
        CounterSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// CounterSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of [`NetworkCounters`], for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    // ---
    pub sent: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
