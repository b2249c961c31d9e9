//! Alarm demo — schedule two alarms, let one fire, cancel the other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use outrider_domain::{OpHandle, OutriderError, PoolPtr};
use outrider_link_sim::{SimConfig, SimPool};
use outrider_net::NetworkInterface;

// ---

pub async fn run() -> anyhow::Result<()> {
    // ---
    let pool = SimPool::new(SimConfig::new());
    let iface = NetworkInterface::new("demo-alarm", Arc::clone(&pool) as PoolPtr);
    iface.startup()?;

    let (tx, rx) = oneshot::channel();
    iface.schedule_alarm(
        OpHandle::new(),
        iface.now() + Duration::from_millis(50),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;
    assert_eq!(rx.await?, Ok(()));
    println!("50 ms alarm fired");

    let handle = OpHandle::new();
    let (tx, rx) = oneshot::channel();
    iface.schedule_alarm(
        handle,
        iface.now() + Duration::from_secs(3600),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    )?;
    iface.cancel_alarm(handle);
    assert_eq!(rx.await?, Err(OutriderError::Cancelled));
    println!("one-hour alarm cancelled; its action saw Cancelled");

    println!("{}", iface.diagnostic_string());
    iface.shutdown();

    Ok(())
}
