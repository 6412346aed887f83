//! Keeper-facing executor API
//!
//! The keeper only needs two calls: "is the batch ready?" and "execute it with this amount".
//! `LocalExecutorClient` drives an in-process ledger; the HTTP client talks to a remote gateway.

use crate::ledger::{Address, EncryptedHandle, ExecutionResult, Ledger, LedgerError, Readiness};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    /// The ledger refused the call (not ready, no open batch, slippage, adapter failure)
    Rejected { code: String, reason: String },
    /// The call never reached the ledger or its answer was lost
    Transport(String),
    /// The aggregate amount could not be obtained
    Decryption(String),
}

impl KeeperError {
    pub fn is_transport(&self) -> bool {
        matches!(self, KeeperError::Transport(_))
    }
}

impl std::fmt::Display for KeeperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeeperError::Rejected { code, reason } => write!(f, "rejected ({}): {}", code, reason),
            KeeperError::Transport(msg) => write!(f, "transport error: {}", msg),
            KeeperError::Decryption(msg) => write!(f, "decryption error: {}", msg),
        }
    }
}

impl std::error::Error for KeeperError {}

impl From<LedgerError> for KeeperError {
    fn from(err: LedgerError) -> Self {
        KeeperError::Rejected {
            code: err.code().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
pub trait ExecutorClient: Send + Sync {
    async fn is_ready(&self) -> Result<Readiness, KeeperError>;

    /// Encrypted running sum of the open batch, if the gateway exposes it
    async fn pending_sum(&self) -> Result<Option<EncryptedHandle>, KeeperError>;

    async fn execute_if_ready(
        &self,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<ExecutionResult, KeeperError>;

    /// Human-readable target for log lines
    fn describe(&self) -> String;
}

/// Executor client bound to one pair of an in-process ledger
pub struct LocalExecutorClient {
    ledger: Arc<Mutex<Ledger>>,
    keeper: Address,
    token_in: Address,
    token_out: Address,
}

impl LocalExecutorClient {
    pub fn new(ledger: Arc<Mutex<Ledger>>, keeper: Address, token_in: Address, token_out: Address) -> Self {
        Self {
            ledger,
            keeper,
            token_in,
            token_out,
        }
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>) -> Result<T, KeeperError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| KeeperError::Transport("ledger lock poisoned".to_string()))?;
        f(&mut ledger).map_err(KeeperError::from)
    }
}

#[async_trait]
impl ExecutorClient for LocalExecutorClient {
    async fn is_ready(&self) -> Result<Readiness, KeeperError> {
        self.with_ledger(|ledger| ledger.is_ready(&self.token_in, &self.token_out))
    }

    async fn pending_sum(&self) -> Result<Option<EncryptedHandle>, KeeperError> {
        self.with_ledger(|ledger| Ok(ledger.pending_sum(&self.token_in, &self.token_out)))
    }

    async fn execute_if_ready(
        &self,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<ExecutionResult, KeeperError> {
        self.with_ledger(|ledger| {
            ledger.execute_if_ready(self.keeper, &self.token_in, &self.token_out, amount_in, min_amount_out)
        })
    }

    fn describe(&self) -> String {
        format!(
            "local executor {}→{}",
            self.token_in.short(),
            self.token_out.short()
        )
    }
}
