use std::collections::HashMap;
use std::time::Duration;

use outrider_domain::HostAndPort;

// ---------------------------------------------------------------------------
// LeaseOutcome
// ---------------------------------------------------------------------------

/// What happens when the pool is asked for a connection to a host.
#[derive(Debug, Clone)]
pub enum LeaseOutcome {
    // ---
    /// Hand out a connection after the configured latency.
    Grant,

    /// Fail the lease after the configured latency (host unreachable,
    /// refused, and so on).
    Refuse(String),
}

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

/// What a leased connection does with a dispatched request.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    // ---
    /// Answer with this payload after the configured latency.
    Reply(Vec<u8>),

    /// Fail the exchange after the configured latency.
    TransportError(String),

    /// Answer with garbage the codec rejects.
    ProtocolError(String),

    /// Never answer.  Exercises deadlines and cancellation mid-flight.
    Stall,
}

// ---------------------------------------------------------------------------
// HostProfile
// ---------------------------------------------------------------------------

/// Simulated behaviour of one host.
///
/// All timings are virtual-time friendly (plain `tokio::time::sleep`), so
/// tests under `start_paused` run instantly and deterministically as long
/// as `jitter` stays zero.
#[derive(Debug, Clone)]
pub struct HostProfile {
    // ---
    /// Time to produce (or refuse) a lease.
    pub lease_latency: Duration,

    pub lease_result: LeaseOutcome,

    /// Time from dispatch to the configured [`DispatchOutcome`].
    pub dispatch_latency: Duration,

    pub dispatch_result: DispatchOutcome,

    /// Bound on concurrent leases to this host; leases beyond it are
    /// refused.
    pub max_leases: usize,

    /// Extra uniformly-random latency added to lease and dispatch.
    /// Zero keeps the host fully deterministic.
    pub jitter: Duration,
}

// ---

impl Default for HostProfile {
    fn default() -> Self {
        Self::healthy(b"ok")
    }
}

// ---

impl HostProfile {
    // ---
    /// A well-behaved host: quick lease, quick reply with `payload`.
    pub fn healthy(payload: &[u8]) -> Self {
        // ---
        Self {
            lease_latency: Duration::from_millis(1),
            lease_result: LeaseOutcome::Grant,
            dispatch_latency: Duration::from_millis(5),
            dispatch_result: DispatchOutcome::Reply(payload.to_vec()),
            max_leases: 8,
            jitter: Duration::ZERO,
        }
    }

    // ---

    /// A host whose leases always fail with `detail`.
    pub fn unreachable(detail: &str) -> Self {
        // ---
        Self {
            lease_latency: Duration::from_millis(5),
            lease_result: LeaseOutcome::Refuse(detail.to_string()),
            ..Self::healthy(b"")
        }
    }

    // ---

    pub fn lease_latency_ms(mut self, millis: u64) -> Self {
        self.lease_latency = Duration::from_millis(millis);
        self
    }

    pub fn dispatch_latency_ms(mut self, millis: u64) -> Self {
        self.dispatch_latency = Duration::from_millis(millis);
        self
    }

    pub fn dispatch(mut self, outcome: DispatchOutcome) -> Self {
        self.dispatch_result = outcome;
        self
    }

    pub fn max_leases(mut self, limit: usize) -> Self {
        self.max_leases = limit;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Pool-wide configuration: one profile per known host, plus the profile
/// applied to hosts no one declared.
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    // ---
    pub hosts: HashMap<HostAndPort, HostProfile>,

    /// Behaviour of any host without an explicit profile.
    pub default_profile: HostProfile,
}

// ---

impl SimConfig {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the behaviour of one host.
    pub fn host(mut self, target: HostAndPort, profile: HostProfile) -> Self {
        self.hosts.insert(target, profile);
        self
    }

    pub fn default_profile(mut self, profile: HostProfile) -> Self {
        self.default_profile = profile;
        self
    }
}
