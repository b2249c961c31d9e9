//! Outrider demo runner.
//!
//! Drives a live [`NetworkInterface`](outrider_net::NetworkInterface) over
//! simulated hosts through four scenarios:
//!
//!   1. candidate race      — two hosts, the healthy one wins
//!   2. failover            — every candidate fails, the most informative
//!                            failure is reported
//!   3. deadline and cancel — a stalled host times out, a slow one is
//!                            cancelled mid-flight
//!   4. alarms              — schedule, fire, cancel
//!
//! Run with:
//!   cargo run -p outrider-demo
//!   cargo run -p outrider-demo -- --jitter-ms 3

use clap::Parser;
use tracing::info;

mod alarm_demo;
mod deadline_demo;
mod failover_demo;
mod race_demo;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "outrider-demo", about = "Outrider demo runner")]
struct Config {
    // ---
    /// Extra random latency (milliseconds) added to every simulated lease
    /// and dispatch.  0 keeps the scenarios deterministic.
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    let cfg = Config::parse();

    let no_color = std::env::var("EMACS").is_ok()
        || std::env::var("NO_COLOR").is_ok()
        || std::env::var("CARGO_TERM_COLOR").as_deref() == Ok("never")
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .with_ansi(!no_color)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        jitter_ms = cfg.jitter_ms,
        "outrider-demo starting",
    );

    println!("=== 1. Candidate race demo ===");
    race_demo::run(cfg.jitter_ms).await?;

    println!();
    println!("=== 2. Failover demo ===");
    failover_demo::run().await?;

    println!();
    println!("=== 3. Deadline and cancellation demo ===");
    deadline_demo::run().await?;

    println!();
    println!("=== 4. Alarm demo ===");
    alarm_demo::run().await?;

    Ok(())
}
