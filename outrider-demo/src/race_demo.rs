//! Candidate race demo — one command, two candidate hosts.  The unreachable
//! host loses its lease immediately; the healthy host answers and its reply
//! is the single delivered outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use outrider_domain::{HostAndPort, InlineBaton, OpHandle, PoolPtr, RemoteRequest};
use outrider_link_sim::{HostProfile, SimConfig, SimPool};
use outrider_net::NetworkInterface;

// ---

pub async fn run(jitter_ms: u64) -> anyhow::Result<()> {
    // ---
    let dead = HostAndPort::new("dead.example.net", 7400);
    let live = HostAndPort::new("live.example.net", 7400);

    let jitter = Duration::from_millis(jitter_ms);
    let pool = SimPool::new(
        SimConfig::new()
            .host(dead.clone(), HostProfile::unreachable("connection refused"))
            .host(
                live.clone(),
                HostProfile::healthy(b"pong")
                    .dispatch_latency_ms(20)
                    .jitter(jitter),
            ),
    );

    let iface = NetworkInterface::new("demo-race", Arc::clone(&pool) as PoolPtr);
    iface.startup()?;

    let (tx, rx) = oneshot::channel();
    iface.submit_command(
        OpHandle::new(),
        RemoteRequest::new(vec![dead, live], b"ping".to_vec()),
        Some(iface.now() + Duration::from_millis(500)),
        Arc::new(InlineBaton),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;

    let response = rx.await??;
    println!(
        "winner: {} answered {:?} after {:?}",
        response.target,
        String::from_utf8_lossy(&response.payload),
        response.elapsed,
    );
    println!("{}", iface.diagnostic_string());

    iface.shutdown();
    assert_eq!(pool.outstanding(), 0, "every lease returned");

    Ok(())
}
