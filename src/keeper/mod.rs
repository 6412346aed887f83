//! Off-ledger keeper: polls executor readiness and submits batch executions

pub mod amount;
pub mod backoff;
pub mod client;
pub mod config;
pub mod driver;
pub mod http_client;

pub use amount::{AggregateAmountSource, DecryptingAmountSource, FixedAmountSource, MinOutPolicy};
pub use backoff::ExponentialBackoff;
pub use client::{ExecutorClient, KeeperError, LocalExecutorClient};
pub use config::KeeperConfig;
pub use driver::{IterationOutcome, KeeperDriver, KeeperStats};
pub use http_client::HttpExecutorClient;
