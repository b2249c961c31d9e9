use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;

use outrider_domain::{
    //
    ConnectionPool,
    ConnectionPtr,
    HostAndPort,
    OutriderError,
    PoolStats,
    ReclaimStatus,
    Result,
};

use super::config::{HostProfile, LeaseOutcome, SimConfig};
use super::connection::SimConnection;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Bookkeeping shared by lease and reclaim.  Mutated only at the final,
/// non-suspending step of a lease, so an abandoned lease future can never
/// leave a phantom entry behind.
#[derive(Debug, Default)]
struct Ledger {
    // ---
    outstanding: HashMap<HostAndPort, usize>,
    total_leases: u64,
    total_reclaims: u64,
}

// ---------------------------------------------------------------------------
// SimPool
// ---------------------------------------------------------------------------

/// In-process [`ConnectionPool`] with configurable per-host impairments.
///
/// Beyond implementing the capability trait, the pool counts every lease
/// and reclaim so tests can assert that no connection is ever leaked —
/// [`outstanding`](Self::outstanding) must be zero after any scenario —
/// and a double return trips an assertion outright.
pub struct SimPool {
    // ---
    config: SimConfig,
    ledger: Mutex<Ledger>,
}

// ---

impl SimPool {
    // ---
    pub fn new(config: SimConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            ledger: Mutex::new(Ledger::default()),
        })
    }

    // ---

    fn profile(&self, target: &HostAndPort) -> &HostProfile {
        self.config
            .hosts
            .get(target)
            .unwrap_or(&self.config.default_profile)
    }

    // ---

    /// Connections currently out on lease, across all hosts.
    pub fn outstanding(&self) -> usize {
        self.ledger.lock().outstanding.values().sum()
    }

    /// Occupancy snapshot (also available through the trait).
    pub fn stats(&self) -> PoolStats {
        // ---
        let ledger = self.ledger.lock();
        let leased: usize = ledger.outstanding.values().sum();
        let capacity: usize = self
            .config
            .hosts
            .iter()
            .map(|(target, profile)| {
                let used = ledger.outstanding.get(target).copied().unwrap_or(0);
                profile.max_leases.saturating_sub(used)
            })
            .sum();

        PoolStats {
            available: capacity,
            leased,
            total_leases: ledger.total_leases,
            total_reclaims: ledger.total_reclaims,
        }
    }
}

// ---

#[async_trait]
impl ConnectionPool for SimPool {
    // ---
    /// The simulator leaves deadline enforcement to the layer above: a
    /// stalled lease simply takes as long as its profile says, and callers
    /// that give up just drop the future.
    async fn lease(
        &self,
        target: &HostAndPort,
        _deadline: Option<Instant>,
    ) -> Result<ConnectionPtr> {
        // ---
        let profile = self.profile(target).clone();
        super::latency(profile.lease_latency, profile.jitter).await;

        match &profile.lease_result {
            LeaseOutcome::Refuse(detail) => Err(OutriderError::ConnectionAcquisition {
                target: target.clone(),
                detail: detail.clone(),
            }),

            LeaseOutcome::Grant => {
                // Grant at the last instant, with no suspension afterwards.
                let mut ledger = self.ledger.lock();
                let used = ledger.outstanding.entry(target.clone()).or_insert(0);
                if *used >= profile.max_leases {
                    return Err(OutriderError::ConnectionAcquisition {
                        target: target.clone(),
                        detail: format!("per-host lease limit ({}) reached", profile.max_leases),
                    });
                }
                *used += 1;
                ledger.total_leases += 1;

                Ok(Box::new(SimConnection::new(target.clone(), profile)))
            }
        }
    }

    // ---

    fn reclaim(&self, conn: ConnectionPtr, _status: ReclaimStatus) {
        // ---
        let mut ledger = self.ledger.lock();
        let used = ledger
            .outstanding
            .get_mut(conn.target())
            .expect("reclaim for a host that never leased");
        assert!(*used > 0, "connection to {} returned twice", conn.target());
        *used -= 1;
        ledger.total_reclaims += 1;
    }

    // ---

    fn stats(&self) -> PoolStats {
        SimPool::stats(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::time::Duration;

    use outrider_domain::RemoteRequest;

    use super::super::config::DispatchOutcome;
    use super::*;

    // ---

    fn host(name: &str) -> HostAndPort {
        HostAndPort::new(name, 7400)
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn lease_dispatch_reclaim_round_trip() {
        // ---
        let target = host("a.example.net");
        let pool = SimPool::new(
            SimConfig::new().host(target.clone(), HostProfile::healthy(b"pong")),
        );

        let mut conn = pool.lease(&target, None).await.expect("granted");
        assert_eq!(pool.outstanding(), 1);

        let reply = conn
            .dispatch(&RemoteRequest::to_target(target.clone(), b"ping".to_vec()))
            .await
            .expect("reply");
        assert_eq!(reply, b"pong");

        ConnectionPool::reclaim(&*pool, conn, ReclaimStatus::Healthy);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.stats().total_leases, 1);
        assert_eq!(pool.stats().total_reclaims, 1);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn per_host_lease_limit_is_enforced() {
        // ---
        let target = host("a.example.net");
        let pool = SimPool::new(
            SimConfig::new().host(target.clone(), HostProfile::healthy(b"pong").max_leases(1)),
        );

        let first = pool.lease(&target, None).await.expect("granted");
        let second = pool.lease(&target, None).await;
        assert!(matches!(
            second,
            Err(OutriderError::ConnectionAcquisition { .. })
        ));

        ConnectionPool::reclaim(&*pool, first, ReclaimStatus::Healthy);
        assert!(pool.lease(&target, None).await.is_ok());
    }

    // ---

    /// An abandoned lease future must not leave a phantom outstanding
    /// entry behind.
    #[tokio::test(start_paused = true)]
    async fn abandoned_lease_future_leaks_nothing() {
        // ---
        let target = host("slow.example.net");
        let pool = SimPool::new(SimConfig::new().host(
            target.clone(),
            HostProfile::healthy(b"pong").lease_latency_ms(1_000),
        ));

        {
            let lease = pool.lease(&target, None);
            tokio::pin!(lease);
            // Poll it partway in, then drop it.
            let _ = tokio::time::timeout(Duration::from_millis(10), lease.as_mut()).await;
        }

        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.stats().total_leases, 0);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn stalled_dispatch_never_resolves() {
        // ---
        let target = host("tarpit.example.net");
        let pool = SimPool::new(SimConfig::new().host(
            target.clone(),
            HostProfile::healthy(b"").dispatch(DispatchOutcome::Stall),
        ));

        let mut conn = pool.lease(&target, None).await.expect("granted");
        let request = RemoteRequest::to_target(target, b"ping".to_vec());
        let stalled =
            tokio::time::timeout(Duration::from_secs(60), conn.dispatch(&request)).await;
        assert!(stalled.is_err(), "stall must outlast any finite wait");
    }
}
