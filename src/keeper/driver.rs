//! Keeper polling loop
//!
//! Each iteration: read readiness, and if either trigger holds obtain the aggregate amount and
//! minimum output and call `execute_if_ready`. Ledger rejections are logged and retried at the
//! next poll; transport failures back off. There is no retry cap.
//!
//! Shutdown is observed between iterations and interrupts the sleep. An execution call already
//! in flight is always allowed to finish.

use super::amount::{AggregateAmountSource, MinOutPolicy};
use super::backoff::ExponentialBackoff;
use super::client::{ExecutorClient, KeeperError};
use super::config::KeeperConfig;
use crate::ledger::{EventSink, ExecutionResult, LedgerEvent, Readiness};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    NotReady,
    Executed(ExecutionResult),
    /// The ledger refused, or no amount could be obtained; try again next poll
    Rejected(KeeperError),
    TransportFailure(KeeperError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeeperStats {
    pub polls: u64,
    pub executions: u64,
    pub rejections: u64,
    pub transport_failures: u64,
}

pub struct KeeperDriver {
    client: Arc<dyn ExecutorClient>,
    amount_source: Arc<dyn AggregateAmountSource>,
    min_out: MinOutPolicy,
    poll_interval: Duration,
    backoff: ExponentialBackoff,
    stats: KeeperStats,
    sink: Option<Arc<dyn EventSink>>,
}

impl KeeperDriver {
    pub fn new(
        client: Arc<dyn ExecutorClient>,
        amount_source: Arc<dyn AggregateAmountSource>,
        min_out: MinOutPolicy,
        poll_interval: Duration,
        backoff: ExponentialBackoff,
    ) -> Self {
        Self {
            client,
            amount_source,
            min_out,
            poll_interval,
            backoff,
            stats: KeeperStats::default(),
            sink: None,
        }
    }

    /// Record every execution this keeper performs (audit log for remote ledgers)
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn from_config(
        client: Arc<dyn ExecutorClient>,
        amount_source: Arc<dyn AggregateAmountSource>,
        config: &KeeperConfig,
    ) -> Self {
        Self::new(
            client,
            amount_source,
            config.min_out_policy(),
            config.poll_interval,
            ExponentialBackoff::new(config.transport_backoff, config.transport_backoff_max),
        )
    }

    pub fn stats(&self) -> KeeperStats {
        self.stats
    }

    fn failure(&mut self, err: KeeperError) -> IterationOutcome {
        if err.is_transport() {
            self.stats.transport_failures += 1;
            log::error!("❌ Transport failure talking to {}: {}", self.client.describe(), err);
            IterationOutcome::TransportFailure(err)
        } else {
            self.stats.rejections += 1;
            log::warn!("⚠️  Execution skipped: {}", err);
            IterationOutcome::Rejected(err)
        }
    }

    /// One poll; never sleeps
    pub async fn run_once(&mut self) -> IterationOutcome {
        self.stats.polls += 1;

        let readiness: Readiness = match self.client.is_ready().await {
            Ok(readiness) => readiness,
            Err(e) => return self.failure(e),
        };

        if !readiness.is_ready() {
            log::debug!(
                "⏸️  Not ready (byK={}, byTime={})",
                readiness.by_count,
                readiness.by_time
            );
            return IterationOutcome::NotReady;
        }

        log::info!(
            "🔔 Batch ready (byK={}, byTime={}), executing via {}",
            readiness.by_count,
            readiness.by_time,
            self.client.describe()
        );

        let amount_in = match self.amount_source.aggregate_amount(self.client.as_ref()).await {
            Ok(amount) => amount,
            Err(e) => return self.failure(e),
        };
        let min_out = self.min_out.min_out(amount_in);

        match self.client.execute_if_ready(amount_in, min_out).await {
            Ok(result) => {
                self.stats.executions += 1;
                log::info!(
                    "✅ Executed batch: count={}, amount_in={}, amount_out={}, fee={}",
                    result.count,
                    result.amount_in,
                    result.amount_out,
                    result.fee
                );
                if let Some(sink) = &self.sink {
                    sink.emit(&LedgerEvent::executed(&result));
                }
                IterationOutcome::Executed(result)
            }
            Err(e) => self.failure(e),
        }
    }

    /// Sleep before the next iteration: backoff after transport failures, else the poll interval
    pub fn delay_after(&mut self, outcome: &IterationOutcome) -> Duration {
        match outcome {
            IterationOutcome::TransportFailure(_) => self.backoff.next_delay(),
            _ => {
                self.backoff.reset();
                self.poll_interval
            }
        }
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> KeeperStats {
        log::info!(
            "🤖 Keeper started: target={}, amount source={}, poll every {}s",
            self.client.describe(),
            self.amount_source.source_type(),
            self.poll_interval.as_secs_f64()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_once().await;
            let delay = self.delay_after(&outcome);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!(
            "🛑 Keeper stopped: polls={}, executions={}, rejections={}, transport_failures={}",
            self.stats.polls,
            self.stats.executions,
            self.stats.rejections,
            self.stats.transport_failures
        );
        self.stats
    }
}
