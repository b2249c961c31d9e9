//! Failover demo — every candidate fails, each in a different way.  The
//! single delivered outcome is the most informative failure, not merely the
//! first one observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use outrider_domain::{HostAndPort, InlineBaton, OpHandle, PoolPtr, RemoteRequest};
use outrider_link_sim::{DispatchOutcome, HostProfile, SimConfig, SimPool};
use outrider_net::NetworkInterface;

// ---

pub async fn run() -> anyhow::Result<()> {
    // ---
    let refused = HostAndPort::new("refused.example.net", 7400);
    let flaky = HostAndPort::new("flaky.example.net", 7400);
    let garbled = HostAndPort::new("garbled.example.net", 7400);

    let pool = SimPool::new(
        SimConfig::new()
            .host(refused.clone(), HostProfile::unreachable("connection refused"))
            .host(
                flaky.clone(),
                HostProfile::healthy(b"")
                    .dispatch(DispatchOutcome::TransportError("connection reset".into())),
            )
            .host(
                garbled.clone(),
                HostProfile::healthy(b"")
                    .dispatch(DispatchOutcome::ProtocolError("bad magic in reply".into())),
            ),
    );

    let iface = NetworkInterface::new("demo-failover", Arc::clone(&pool) as PoolPtr);
    iface.startup()?;

    let (tx, rx) = oneshot::channel();
    iface.submit_command(
        OpHandle::new(),
        RemoteRequest::new(vec![refused, flaky, garbled], b"ping".to_vec()),
        Some(iface.now() + Duration::from_millis(500)),
        Arc::new(InlineBaton),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;

    let failure = rx.await?.expect_err("no candidate can succeed");
    println!("all candidates failed; reported: {failure}");
    println!("{}", iface.diagnostic_string());

    iface.shutdown();
    assert_eq!(pool.outstanding(), 0, "every lease returned");

    Ok(())
}
