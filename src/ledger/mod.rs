//! Private DCA ledger: encrypted intents, k-anonymous batches and per-pair settlement

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod fhe;
pub mod intents;
pub mod swap;
pub mod types;

pub use aggregator::{AggregatorConfig, Batch, BatchAggregator, ConsumedBatch};
pub use config::LedgerConfig;
pub use engine::Ledger;
pub use error::{FheError, LedgerError, SwapError};
pub use events::{ChannelEventSink, EventSink, LedgerEvent, LogEventSink, MemoryEventSink};
pub use executor::{keeper_fee, Settlement, SwapExecutor};
pub use fhe::{FheBackend, InputContext, MockFhe, PublicDecryptor};
pub use intents::{EncryptedIntentFields, Intent, IntentRegistry, IntentStatus};
pub use swap::{MockRouterAdapter, SwapAdapter};
pub use types::{
    Address, EncryptedHandle, EncryptedInput, ExecutionResult, InputProof, NowFn, PairKey, Readiness,
};
