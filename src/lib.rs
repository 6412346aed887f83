//! veil-dca: private dollar-cost-averaging with k-anonymous batch execution
//!
//! - `ledger`: intent registry, batch aggregator and per-pair swap executors
//! - `keeper`: off-ledger driver that polls readiness and submits executions
//! - `store`: observer-side persistence of aggregate-only ledger events

pub mod config;
pub mod keeper;
pub mod ledger;
pub mod store;
