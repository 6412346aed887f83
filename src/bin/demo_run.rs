//! Demo Run - end-to-end batch against an in-process ledger
//!
//! Registers `K_MIN` demo users with encrypted intents, enqueues one encrypted contribution
//! each, then starts a keeper that decrypts the aggregate and executes the batch through a
//! fixed-price mock router.
//!
//! Usage:
//!   cargo run --bin demo_run
//!
//! Environment variables:
//!   K_MIN, TIME_WINDOW_SECS, KEEPER_FEE_BPS - Ledger parameters
//!   KEEPER_MAX_SLIPPAGE_BPS + KEEPER_EXPECTED_PRICE_BPS - Optional slippage bound
//!   KEEPER_EVENT_DB_PATH - Optional SQLite file receiving every ledger event

use dotenv::dotenv;
use log::{error, info};
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use veil_dca::keeper::{DecryptingAmountSource, KeeperConfig, KeeperDriver, LocalExecutorClient};
use veil_dca::ledger::{
    Address, ChannelEventSink, EncryptedIntentFields, InputContext, Ledger, LedgerConfig,
    LedgerEvent, LogEventSink, MockFhe, MockRouterAdapter,
};
use veil_dca::store::{event_writer_task, SqliteEventWriter};

const MAX_DEMO_USERS: u64 = 50;
const ROUTER_PRICE_BPS: u128 = 9_950;

fn intent_fields(
    fhe: &MockFhe,
    ctx: &InputContext,
    per_buy: u128,
    now: i64,
) -> Result<EncryptedIntentFields, Box<dyn std::error::Error>> {
    Ok(EncryptedIntentFields {
        budget: fhe.encrypt(per_buy * 10, ctx)?,
        per_buy: fhe.encrypt(per_buy, ctx)?,
        frequency: fhe.encrypt(86_400, ctx)?,
        start: fhe.encrypt(now as u128, ctx)?,
        end: fhe.encrypt((now + 30 * 86_400) as u128, ctx)?,
        dip_threshold_bps: fhe.encrypt(0, ctx)?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 veil-dca demo run");

    let ledger_config = LedgerConfig::from_env()?;
    let mut keeper_config = KeeperConfig::from_env()?;
    // Demo runs in seconds, not minutes
    keeper_config.poll_interval = Duration::from_secs(1);

    let users = ledger_config.k_min.min(MAX_DEMO_USERS);
    info!("   ├─ k_min: {}", ledger_config.k_min);
    info!("   ├─ time window: {}s", ledger_config.time_window_secs);
    info!("   ├─ keeper fee: {} bps", ledger_config.keeper_fee_bps);
    info!("   └─ demo users: {}", users);

    let fhe = Arc::new(MockFhe::new());
    let operator = Address::derive("veil-dca/demo-operator");
    let mut ledger = Ledger::new(operator, ledger_config, fhe.clone())?;
    ledger.add_sink(Arc::new(LogEventSink));

    let writer_handle = match &keeper_config.event_db_path {
        Some(path) => {
            let backend = Box::new(SqliteEventWriter::new(path)?);
            let (tx, rx) = mpsc::channel::<LedgerEvent>(1_000);
            ledger.add_sink(Arc::new(ChannelEventSink::new(tx)));
            info!("💾 Persisting ledger events to {}", path);
            Some(tokio::spawn(event_writer_task(rx, backend)))
        }
        None => None,
    };

    let token_in = keeper_config.token_in.unwrap_or_else(|| Address::derive("demo/USDC"));
    let token_out = keeper_config.token_out.unwrap_or_else(|| Address::derive("demo/WETH"));
    let executor = ledger.deploy_executor(
        token_in,
        token_out,
        Box::new(MockRouterAdapter::new(ROUTER_PRICE_BPS)),
    )?;
    info!("🔧 Executor {} deployed for {} → {}", executor.short(), token_in.short(), token_out.short());

    // Users register intents and join the batch
    let mut rng = rand::thread_rng();
    for i in 0..users {
        let user = Address::derive(&format!("demo/user-{}", i));
        let per_buy: u128 = rng.gen_range(10..=1_000) * 1_000_000;
        let now = ledger.now();

        let registry_ctx = InputContext { verifier: ledger.registry_identity(), user };
        ledger.create_or_update_intent(user, intent_fields(&fhe, &registry_ctx, per_buy, now)?)?;

        let batch_ctx = InputContext { verifier: ledger.aggregator_identity(), user };
        let contribution = fhe.encrypt(per_buy, &batch_ctx)?;
        let count = ledger.enqueue(user, &token_in, &token_out, &contribution)?;
        info!("👤 User {} joined the batch ({} contributors)", user.short(), count);
    }

    let ledger = Arc::new(Mutex::new(ledger));
    let client = Arc::new(LocalExecutorClient::new(
        ledger.clone(),
        keeper_config.keeper_address,
        token_in,
        token_out,
    ));
    let amount_source = Arc::new(DecryptingAmountSource::new(fhe.clone()));
    let mut driver = KeeperDriver::from_config(client, amount_source, &keeper_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let keeper = tokio::spawn(async move { driver.run(shutdown_rx).await });

    // Wait for the first execution, Ctrl+C, or the time window plus a margin
    let deadline = Duration::from_secs(ledger_config.time_window_secs as u64 + 10);
    let waited = tokio::time::timeout(deadline, async {
        loop {
            let executions = match ledger.lock() {
                Ok(guard) => guard.executions(&token_in, &token_out).unwrap_or(0),
                Err(_) => 0,
            };
            if executions > 0 {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    })
    .await;
    if waited.is_err() {
        error!("❌ No execution within {}s", deadline.as_secs());
    }

    let _ = shutdown_tx.send(true);
    let stats = keeper.await?;

    {
        let guard = ledger
            .lock()
            .map_err(|_| "ledger lock poisoned")?;
        let keeper_address = keeper_config.keeper_address;
        info!("📊 Results");
        info!("   ├─ executions: {}", guard.executions(&token_in, &token_out)?);
        info!("   ├─ pool balance: {}", guard.pool_balance(&token_in, &token_out)?);
        info!(
            "   ├─ keeper fees: {}",
            guard.keeper_fee_balance(&token_in, &token_out, &keeper_address)?
        );
        info!("   └─ keeper polls: {}", stats.polls);
    }

    // Closing the ledger's channel sink lets the writer finish
    drop(ledger);
    if let Some(handle) = writer_handle {
        match handle.await {
            Ok(written) => info!("💾 {} ledger events written", written),
            Err(e) => error!("❌ Event writer task failed: {}", e),
        }
    }

    Ok(())
}
