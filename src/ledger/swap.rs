//! Swap adapter seam and a fixed-price router mock
//!
//! The executor hands the adapter a plaintext aggregate and a minimum-output bound and gets back
//! the output amount. Any error aborts the execution; an adapter must leave its own state
//! untouched when it fails.

use super::error::SwapError;
use super::types::Address;
use std::collections::HashMap;

pub trait SwapAdapter: Send {
    /// Swap `amount_in` for at least `min_amount_out`, delivering the output to `recipient`
    fn swap(
        &mut self,
        amount_in: u128,
        min_amount_out: u128,
        recipient: Address,
    ) -> Result<u128, SwapError>;

    fn adapter_type(&self) -> &'static str;
}

/// Fixed-price router: `amount_out = amount_in * price_bps / 10000`
///
/// Tracks the spender's input balance and allowance plus the router's output reserve.
/// Unlimited by default; tests tighten them through the builder methods.
#[derive(Debug, Clone)]
pub struct MockRouterAdapter {
    price_bps: u128,
    input_balance: u128,
    allowance: u128,
    reserve_out: u128,
    delivered: HashMap<Address, u128>,
}

impl MockRouterAdapter {
    pub fn new(price_bps: u128) -> Self {
        Self {
            price_bps,
            input_balance: u128::MAX,
            allowance: u128::MAX,
            reserve_out: u128::MAX,
            delivered: HashMap::new(),
        }
    }

    pub fn with_input_balance(mut self, balance: u128) -> Self {
        self.input_balance = balance;
        self
    }

    pub fn with_allowance(mut self, allowance: u128) -> Self {
        self.allowance = allowance;
        self
    }

    pub fn with_reserve(mut self, reserve_out: u128) -> Self {
        self.reserve_out = reserve_out;
        self
    }

    pub fn quote(&self, amount_in: u128) -> Result<u128, SwapError> {
        amount_in
            .checked_mul(self.price_bps)
            .map(|v| v / 10_000)
            .ok_or(SwapError::Overflow)
    }

    pub fn delivered_to(&self, recipient: &Address) -> u128 {
        self.delivered.get(recipient).copied().unwrap_or(0)
    }
}

impl SwapAdapter for MockRouterAdapter {
    fn swap(
        &mut self,
        amount_in: u128,
        min_amount_out: u128,
        recipient: Address,
    ) -> Result<u128, SwapError> {
        if self.allowance < amount_in {
            return Err(SwapError::InsufficientAllowance {
                allowance: self.allowance,
                needed: amount_in,
            });
        }
        if self.input_balance < amount_in {
            return Err(SwapError::InsufficientBalance {
                balance: self.input_balance,
                needed: amount_in,
            });
        }

        let amount_out = self.quote(amount_in)?;
        if amount_out < min_amount_out {
            return Err(SwapError::InsufficientOutputAmount {
                amount_out,
                min_amount_out,
            });
        }
        if self.reserve_out < amount_out {
            return Err(SwapError::InsufficientLiquidity {
                reserve: self.reserve_out,
                needed: amount_out,
            });
        }

        self.allowance -= amount_in;
        self.input_balance -= amount_in;
        self.reserve_out -= amount_out;
        let credited = self.delivered.entry(recipient).or_insert(0);
        *credited = credited.saturating_add(amount_out);

        Ok(amount_out)
    }

    fn adapter_type(&self) -> &'static str {
        "mock-router"
    }
}
