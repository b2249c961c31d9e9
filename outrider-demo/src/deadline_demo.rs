//! Deadline and cancellation demo.  A command against a host that never
//! answers times out at its deadline; a second command against a slow host
//! is cancelled out-of-band while its dispatch is in flight.  Both resolve
//! exactly once and both leases come back to the pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use outrider_domain::{HostAndPort, InlineBaton, OpHandle, OutriderError, PoolPtr, RemoteRequest};
use outrider_link_sim::{DispatchOutcome, HostProfile, SimConfig, SimPool};
use outrider_net::NetworkInterface;

// ---

pub async fn run() -> anyhow::Result<()> {
    // ---
    let tarpit = HostAndPort::new("tarpit.example.net", 7400);
    let slow = HostAndPort::new("slow.example.net", 7400);

    let pool = SimPool::new(
        SimConfig::new()
            .host(
                tarpit.clone(),
                HostProfile::healthy(b"").dispatch(DispatchOutcome::Stall),
            )
            .host(
                slow.clone(),
                HostProfile::healthy(b"pong").dispatch_latency_ms(10_000),
            ),
    );

    let iface = NetworkInterface::new("demo-deadline", Arc::clone(&pool) as PoolPtr);
    iface.startup()?;

    // Deadline: the tarpit never answers, the 100 ms deadline does.
    let (tx, rx) = oneshot::channel();
    iface.submit_command(
        OpHandle::new(),
        RemoteRequest::to_target(tarpit, b"ping".to_vec()),
        Some(iface.now() + Duration::from_millis(100)),
        Arc::new(InlineBaton),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;
    let outcome = rx.await?;
    assert_eq!(outcome, Err(OutriderError::Timeout));
    println!("stalled host: {}", outcome.unwrap_err());

    // Cancellation: give the slow dispatch a moment to get airborne, then
    // cancel it from outside.
    let handle = OpHandle::new();
    let (tx, rx) = oneshot::channel();
    iface.submit_command(
        handle,
        RemoteRequest::to_target(slow, b"ping".to_vec()),
        None,
        Arc::new(InlineBaton),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    iface.cancel_command(handle);

    let outcome = rx.await?;
    assert_eq!(outcome, Err(OutriderError::Cancelled));
    println!("slow host:    {}", outcome.unwrap_err());
    println!("{}", iface.diagnostic_string());

    iface.shutdown();
    assert_eq!(pool.outstanding(), 0, "every lease returned");

    Ok(())
}
