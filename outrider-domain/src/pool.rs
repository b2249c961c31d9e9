use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::error::Result;
use super::host::HostAndPort;
use super::request::RemoteRequest;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One physical connection leased from the pool.
///
/// Owned exclusively by a single attempt from lease until reclaim; the pool
/// never hands the same connection to two leaseholders.
///
/// `#[async_trait]` keeps `dispatch` dyn-compatible so
/// `ConnectionPtr = Box<dyn Connection>` compiles.
#[async_trait]
pub trait Connection: Send {
    // ---
    /// The host this connection is bound to.
    fn target(&self) -> &HostAndPort;

    /// Send `request` and await the raw reply payload — the wire codec lives
    /// behind this call and is opaque to the caller.
    ///
    /// Dropping the returned future mid-flight abandons the exchange; the
    /// leaseholder must then reclaim the connection as
    /// [`ReclaimStatus::Failed`] since the stream state is unknown.
    async fn dispatch(&mut self, request: &RemoteRequest) -> Result<Vec<u8>>;
}

// ---

/// Heap-allocated [`Connection`].
pub type ConnectionPtr = Box<dyn Connection>;

/// Shared [`ConnectionPool`].
pub type PoolPtr = Arc<dyn ConnectionPool>;

// ---------------------------------------------------------------------------
// ReclaimStatus
// ---------------------------------------------------------------------------

/// How the leaseholder left the connection when giving it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimStatus {
    // ---
    /// The connection completed its exchange (or was never used) and may be
    /// handed to the next leaseholder.
    Healthy,

    /// The exchange failed or was abandoned mid-flight; the pool should
    /// discard the connection rather than reuse it.
    Failed,
}

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of pool occupancy, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    // ---
    /// Connections sitting idle, ready to lease.
    pub available: usize,

    /// Connections currently out on lease.
    pub leased: usize,

    /// Total leases granted since the pool was created.
    pub total_leases: u64,

    /// Total connections returned (healthy or failed) since creation.
    pub total_reclaims: u64,
}

// ---------------------------------------------------------------------------
// ConnectionPool
// ---------------------------------------------------------------------------

/// The pool of physical connections, consumed as an opaque capability.
///
/// Eviction, keep-alive, and per-host limits are the pool's own business;
/// this layer only leases and reclaims.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    // ---
    /// Lease a connection to `target`, waiting no later than `deadline`
    /// (`None` = wait indefinitely).
    ///
    /// Cancellation safety: dropping the returned future before it resolves
    /// must not leak a connection — an implementation may only remove a
    /// connection from its free list at the final completion step, or must
    /// internally reclaim one produced after abandonment.
    async fn lease(&self, target: &HostAndPort, deadline: Option<Instant>)
        -> Result<ConnectionPtr>;

    /// Give a connection back.  Fire-and-forget; never fails.
    fn reclaim(&self, conn: ConnectionPtr, status: ReclaimStatus);

    /// Occupancy snapshot for diagnostics.
    fn stats(&self) -> PoolStats;
}
