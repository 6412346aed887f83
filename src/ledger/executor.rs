//! Per-pair swap executor
//!
//! Execution is one transactional unit: readiness gate, consume, swap, settle. If the swap
//! fails the consumed batch is put back exactly as it was and no balance moves.

use super::aggregator::BatchAggregator;
use super::error::{LedgerError, SwapError};
use super::swap::SwapAdapter;
use super::types::{Address, ExecutionResult, PairKey, Readiness};
use std::collections::HashMap;

pub const BPS_DENOMINATOR: u128 = 10_000;

/// `floor(amount * bps / 10000)` without intermediate overflow (`bps <= 10000`)
pub fn keeper_fee(amount_out: u128, bps: u16) -> u128 {
    let bps = bps as u128;
    (amount_out / BPS_DENOMINATOR) * bps + (amount_out % BPS_DENOMINATOR) * bps / BPS_DENOMINATOR
}

/// What a committed execution produced, for the caller to publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub pair_key: PairKey,
    pub result: ExecutionResult,
}

pub struct SwapExecutor {
    identity: Address,
    token_in: Address,
    token_out: Address,
    pair_key: PairKey,
    keeper_fee_bps: u16,
    adapter: Box<dyn SwapAdapter>,
    pool_balance: u128,
    keeper_fees: HashMap<Address, u128>,
    executions: u64,
}

impl SwapExecutor {
    pub fn new(
        identity: Address,
        token_in: Address,
        token_out: Address,
        keeper_fee_bps: u16,
        adapter: Box<dyn SwapAdapter>,
    ) -> Result<Self, LedgerError> {
        if keeper_fee_bps as u128 > BPS_DENOMINATOR {
            return Err(LedgerError::InvalidConfig(format!(
                "keeper_fee_bps {} exceeds {}",
                keeper_fee_bps, BPS_DENOMINATOR
            )));
        }
        log::info!(
            "🔧 Executor {} for pair {} using {} ({} bps keeper fee)",
            identity.short(),
            PairKey::new(&token_in, &token_out).short(),
            adapter.adapter_type(),
            keeper_fee_bps
        );
        Ok(Self {
            identity,
            token_in,
            token_out,
            pair_key: PairKey::new(&token_in, &token_out),
            keeper_fee_bps,
            adapter,
            pool_balance: 0,
            keeper_fees: HashMap::new(),
            executions: 0,
        })
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn pair_key(&self) -> PairKey {
        self.pair_key
    }

    pub fn is_ready(&self, aggregator: &BatchAggregator, now: i64) -> Readiness {
        aggregator.readiness(&self.pair_key, now)
    }

    /// Settle the pair's open batch using the out-of-band decrypted aggregate
    pub fn execute_if_ready(
        &mut self,
        aggregator: &mut BatchAggregator,
        keeper: Address,
        amount_in: u128,
        min_amount_out: u128,
        now: i64,
    ) -> Result<Settlement, LedgerError> {
        if !self.is_ready(aggregator, now).is_ready() {
            return Err(LedgerError::NotReady);
        }

        let consumed = aggregator.consume_open_batch(&self.identity, &self.token_in, &self.token_out)?;
        let count = consumed.count;

        let amount_out = match self.swap_checked(amount_in, min_amount_out) {
            Ok(amount_out) => amount_out,
            Err(e) => {
                log::warn!("⚠️  Swap failed for pair {}: {}", self.pair_key.short(), e);
                aggregator.restore_batch(consumed);
                return Err(e.into());
            }
        };

        let fee = keeper_fee(amount_out, self.keeper_fee_bps);
        let keeper_balance = self.keeper_fees.entry(keeper).or_insert(0);
        *keeper_balance = keeper_balance.saturating_add(fee);
        self.pool_balance = self.pool_balance.saturating_add(amount_out - fee);
        self.executions += 1;

        log::info!(
            "✅ Executed batch for pair {}: {} contributors, in={}, out={}, fee={}",
            self.pair_key.short(),
            count,
            amount_in,
            amount_out,
            fee
        );

        Ok(Settlement {
            pair_key: self.pair_key,
            result: ExecutionResult {
                count,
                amount_in,
                amount_out,
                fee,
            },
        })
    }

    fn swap_checked(&mut self, amount_in: u128, min_amount_out: u128) -> Result<u128, SwapError> {
        let amount_out = self.adapter.swap(amount_in, min_amount_out, self.identity)?;
        // Do not trust the adapter to enforce its own bound
        if amount_out < min_amount_out {
            return Err(SwapError::InsufficientOutputAmount {
                amount_out,
                min_amount_out,
            });
        }
        Ok(amount_out)
    }

    pub fn pool_balance(&self) -> u128 {
        self.pool_balance
    }

    pub fn keeper_fee_balance(&self, keeper: &Address) -> u128 {
        self.keeper_fees.get(keeper).copied().unwrap_or(0)
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }
}
