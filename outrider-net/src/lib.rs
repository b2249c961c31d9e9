//! Asynchronous network interface for the Outrider remote-command executor.
//!
//! A submitted command names one or more candidate target hosts.  The
//! interface races one connection attempt per candidate, enforces the
//! command's deadline, delivers exactly one terminal outcome to the caller,
//! and supports out-of-band cancellation of in-flight commands and of
//! registered alarms.
//!
//! # Structure
//!
//! - `finish_line` — [`FinishLine`], the single-admission race arbiter
//! - `counters`    — [`NetworkCounters`] fire-and-forget instrumentation
//! - `alarm`       — cancellable one-shot timers
//! - `attempt`     — one candidate-host try (lease → send → reclaim)
//! - `session`     — one in-flight command racing its attempts
//! - `interface`   — [`NetworkInterface`], the public facade
//!
//! The consumed capabilities — connection pool, wire codec, batons — are
//! the trait seams defined in `outrider-domain`; an in-process simulator
//! lives in `outrider-link-sim`.

mod alarm;
mod attempt;
mod counters;
mod finish_line;
mod interface;
mod session;

// --- finish line
pub use finish_line::FinishLine;

// --- counters
pub use counters::{CounterSnapshot, NetworkCounters};

// --- facade
pub use interface::{LifecycleState, NetworkInterface};
