//! Keeper - polls a remote executor gateway and triggers batch executions
//!
//! Usage:
//!   cargo run --release --bin keeper
//!
//! Environment variables:
//!   EXECUTOR_URL - Gateway base URL serving /status and /execute (required)
//!   KEEPER_POLL_INTERVAL_SECS - Poll interval (default: 30)
//!   KEEPER_TRANSPORT_BACKOFF_SECS - Backoff after a transport failure (default: 60)
//!   DEMO_DECRYPTED_AMOUNT - Aggregate amount submitted with each execution (default: 1e18)
//!   DEMO_MIN_OUT - Minimum output (default: 0)
//!   KEEPER_EVENT_DB_PATH - Optional SQLite file recording executions

use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use veil_dca::keeper::{FixedAmountSource, HttpExecutorClient, KeeperConfig, KeeperDriver};
use veil_dca::ledger::{ChannelEventSink, LedgerEvent};
use veil_dca::store::{event_writer_task, SqliteEventWriter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 veil-dca keeper");

    let config = KeeperConfig::from_env()?;
    let executor_url = config.require_executor_url()?.to_string();

    info!("   ├─ Executor: {}", executor_url);
    info!("   ├─ Poll interval: {}s", config.poll_interval.as_secs());
    info!("   ├─ Transport backoff: {}s", config.transport_backoff.as_secs());
    info!("   ├─ Keeper address: {}", config.keeper_address);
    info!("   └─ Min-out policy: {:?}", config.min_out_policy());

    let client = Arc::new(HttpExecutorClient::new(&executor_url, config.request_timeout)?);
    let amount_source = Arc::new(FixedAmountSource::new(config.demo_decrypted_amount));
    let mut driver = KeeperDriver::from_config(client, amount_source, &config);

    let writer_handle = match &config.event_db_path {
        Some(path) => {
            let backend = Box::new(SqliteEventWriter::new(path)?);
            let (tx, rx) = mpsc::channel::<LedgerEvent>(1_000);
            driver = driver.with_sink(Arc::new(ChannelEventSink::new(tx)));
            info!("💾 Recording executions to {}", path);
            Some(tokio::spawn(event_writer_task(rx, backend)))
        }
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("🛑 Ctrl+C received, stopping after the current iteration..."),
            Err(e) => {
                error!("❌ Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the keeper is not stopped by a dropped channel
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    let stats = driver.run(shutdown_rx).await;
    // Dropping the driver closes the event channel so the writer can finish
    drop(driver);

    if let Some(handle) = writer_handle {
        match handle.await {
            Ok(written) => info!("💾 {} execution records written", written),
            Err(e) => error!("❌ Event writer task failed: {}", e),
        }
    }

    info!(
        "✅ Keeper exited: {} polls, {} executions, {} rejections, {} transport failures",
        stats.polls, stats.executions, stats.rejections, stats.transport_failures
    );
    Ok(())
}
