//! Where the keeper gets the plaintext aggregate and its minimum-output bound
//!
//! Decryption happens off-ledger. The fixed source stands in for a decryption service in demos;
//! the decrypting source asks a `PublicDecryptor` to open the batch's encrypted running sum.

use super::client::{ExecutorClient, KeeperError};
use crate::ledger::PublicDecryptor;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AggregateAmountSource: Send + Sync {
    async fn aggregate_amount(&self, client: &dyn ExecutorClient) -> Result<u128, KeeperError>;

    fn source_type(&self) -> &'static str;
}

/// Always returns the configured amount (`DEMO_DECRYPTED_AMOUNT`)
pub struct FixedAmountSource {
    amount: u128,
}

impl FixedAmountSource {
    pub fn new(amount: u128) -> Self {
        Self { amount }
    }
}

#[async_trait]
impl AggregateAmountSource for FixedAmountSource {
    async fn aggregate_amount(&self, _client: &dyn ExecutorClient) -> Result<u128, KeeperError> {
        Ok(self.amount)
    }

    fn source_type(&self) -> &'static str {
        "fixed"
    }
}

/// Publicly decrypts the open batch's encrypted sum
pub struct DecryptingAmountSource {
    decryptor: Arc<dyn PublicDecryptor>,
}

impl DecryptingAmountSource {
    pub fn new(decryptor: Arc<dyn PublicDecryptor>) -> Self {
        Self { decryptor }
    }
}

#[async_trait]
impl AggregateAmountSource for DecryptingAmountSource {
    async fn aggregate_amount(&self, client: &dyn ExecutorClient) -> Result<u128, KeeperError> {
        let handle = client
            .pending_sum()
            .await?
            .ok_or_else(|| KeeperError::Decryption("no encrypted sum for open batch".to_string()))?;
        self.decryptor
            .public_decrypt(&handle)
            .map_err(|e| KeeperError::Decryption(e.to_string()))
    }

    fn source_type(&self) -> &'static str {
        "public-decrypt"
    }
}

/// Minimum acceptable swap output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinOutPolicy {
    Fixed(u128),
    /// `amount_in * price_bps / 10000`, reduced by `tolerance_bps`
    Slippage { price_bps: u128, tolerance_bps: u16 },
}

impl MinOutPolicy {
    pub fn min_out(&self, amount_in: u128) -> u128 {
        match *self {
            MinOutPolicy::Fixed(min_out) => min_out,
            MinOutPolicy::Slippage { price_bps, tolerance_bps } => {
                let expected = mul_bps(amount_in, price_bps);
                mul_bps(expected, 10_000u128.saturating_sub(tolerance_bps as u128))
            }
        }
    }
}

/// `floor(value * bps / 10000)`, saturating on overflow
fn mul_bps(value: u128, bps: u128) -> u128 {
    let whole = (value / 10_000).saturating_mul(bps);
    let part = (value % 10_000).saturating_mul(bps) / 10_000;
    whole.saturating_add(part)
}
