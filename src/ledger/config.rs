use super::aggregator::AggregatorConfig;
use super::executor::BPS_DENOMINATOR;
use crate::config::{or_default, ConfigError};

pub const DEFAULT_K_MIN: u64 = 10;
pub const DEFAULT_TIME_WINDOW_SECS: i64 = 900;
pub const DEFAULT_KEEPER_FEE_BPS: u16 = 10;

/// Operator-set ledger parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub k_min: u64,
    pub time_window_secs: i64,
    pub keeper_fee_bps: u16,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            k_min: DEFAULT_K_MIN,
            time_window_secs: DEFAULT_TIME_WINDOW_SECS,
            keeper_fee_bps: DEFAULT_KEEPER_FEE_BPS,
        }
    }
}

impl LedgerConfig {
    /// Load from `K_MIN`, `TIME_WINDOW_SECS` and `KEEPER_FEE_BPS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            k_min: or_default("K_MIN", DEFAULT_K_MIN)?,
            time_window_secs: or_default("TIME_WINDOW_SECS", DEFAULT_TIME_WINDOW_SECS)?,
            keeper_fee_bps: or_default("KEEPER_FEE_BPS", DEFAULT_KEEPER_FEE_BPS)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k_min == 0 {
            return Err(ConfigError::InvalidValue("K_MIN must be at least 1".to_string()));
        }
        if self.time_window_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "TIME_WINDOW_SECS must be positive".to_string(),
            ));
        }
        if self.keeper_fee_bps as u128 > BPS_DENOMINATOR {
            return Err(ConfigError::InvalidValue(format!(
                "KEEPER_FEE_BPS must be at most {}, got {}",
                BPS_DENOMINATOR, self.keeper_fee_bps
            )));
        }
        Ok(())
    }

    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            k_min: self.k_min,
            time_window_secs: self.time_window_secs,
        }
    }
}
