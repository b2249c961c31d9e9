//! In-process simulated connection pool for Outrider tests.
//!
//! [`SimPool`] implements the `outrider-domain` pool and connection traits
//! entirely in memory: every host gets a [`HostProfile`] describing how its
//! leases and dispatches behave (latency, refusal, transport or protocol
//! failure, or an indefinite stall).  With zero jitter everything runs on
//! `tokio::time::sleep`, so tests under `start_paused` are instant and
//! deterministic.
//!
//! ```no_run
//! use outrider_domain::HostAndPort;
//! use outrider_link_sim::{HostProfile, SimConfig, SimPool};
//!
//! let fast = HostAndPort::new("a.example.net", 7400);
//! let dead = HostAndPort::new("b.example.net", 7400);
//! let pool = SimPool::new(
//!     SimConfig::new()
//!         .host(fast, HostProfile::healthy(b"pong"))
//!         .host(dead, HostProfile::unreachable("connection refused")),
//! );
//! ```

use std::time::Duration;

mod config;
mod connection;
mod pool;

// --- configuration
pub use config::{DispatchOutcome, HostProfile, LeaseOutcome, SimConfig};

// --- pool
pub use pool::SimPool;

// ---------------------------------------------------------------------------
// latency
// ---------------------------------------------------------------------------

/// Sleep for `base` plus a uniform draw from `[0, jitter]`.
pub(crate) async fn latency(base: Duration, jitter: Duration) {
    // ---
    let extra = if jitter.is_zero() {
        Duration::ZERO
    } else {
        use rand::Rng;
        rand::thread_rng().gen_range(Duration::ZERO..=jitter)
    };
    tokio::time::sleep(base + extra).await;
}
