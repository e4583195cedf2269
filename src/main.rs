//! Network Monitor - live passenger counts for a transport network
//!
//! Downloads the network layout, subscribes to the passenger event feed over
//! STOMP/WebSocket and keeps a per-station passenger count.
//!
//! Configuration comes from `NETWORK_MONITOR_*` environment variables, log
//! verbosity from `RUST_LOG`.

use network_monitor::{MonitorConfig, NetworkMonitor};

use eyre::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    info!("🚇 Network Monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::from_env()?;
    config.validate()?;

    let network = NetworkMonitor::load_network(&config).await?;
    let monitor = NetworkMonitor::new(config, network);

    // Run with graceful shutdown on Ctrl+C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = monitor.run(shutdown_rx);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutting down gracefully...");
            let _ = shutdown_tx.send(true);
            (&mut run).await
        }
    };

    let stats = monitor.get_stats();
    info!(
        "📊 Final stats | Received: {} | Applied: {} | Rejected: {} | Reconnects: {}",
        stats.received, stats.applied, stats.rejected, stats.reconnects
    );
    for (id, name, count) in monitor.passenger_counts() {
        info!("   {:<16} {:<32} {:>6}", id, name, count);
    }

    if let Err(e) = result {
        error!("❌ Monitor stopped: {}", e);
        return Err(e.into());
    }
    Ok(())
}
