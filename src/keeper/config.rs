use super::amount::MinOutPolicy;
use crate::config::{optional, or_default, parse_amount, ConfigError};
use crate::ledger::Address;
use std::env;
use std::time::Duration;

pub const DEFAULT_DECRYPTED_AMOUNT: u128 = 1_000_000_000_000_000_000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_TRANSPORT_BACKOFF_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    /// Base URL of the executor gateway (`{base}/status`, `{base}/execute`)
    pub executor_url: Option<String>,
    /// Address credited with keeper fees
    pub keeper_address: Address,
    pub token_in: Option<Address>,
    pub token_out: Option<Address>,
    /// Aggregate amount submitted when no decryption collaborator is wired in
    pub demo_decrypted_amount: u128,
    pub demo_min_out: u128,
    pub max_slippage_bps: Option<u16>,
    pub expected_price_bps: Option<u128>,
    pub poll_interval: Duration,
    pub transport_backoff: Duration,
    pub transport_backoff_max: Duration,
    pub request_timeout: Duration,
    pub event_db_path: Option<String>,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            executor_url: None,
            keeper_address: Address::derive("veil-dca/keeper"),
            token_in: None,
            token_out: None,
            demo_decrypted_amount: DEFAULT_DECRYPTED_AMOUNT,
            demo_min_out: 0,
            max_slippage_bps: None,
            expected_price_bps: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            transport_backoff: Duration::from_secs(DEFAULT_TRANSPORT_BACKOFF_SECS),
            transport_backoff_max: Duration::from_secs(DEFAULT_TRANSPORT_BACKOFF_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            event_db_path: None,
        }
    }
}

fn amount_var(name: &str, default: u128) -> Result<u128, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_amount(&raw)
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        _ => Ok(default),
    }
}

impl KeeperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let executor_url: Option<String> = optional("EXECUTOR_URL")?;
        if let Some(url) = &executor_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "EXECUTOR_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let transport_backoff_secs =
            or_default("KEEPER_TRANSPORT_BACKOFF_SECS", DEFAULT_TRANSPORT_BACKOFF_SECS)?;
        let transport_backoff_max_secs =
            or_default("KEEPER_TRANSPORT_BACKOFF_MAX_SECS", transport_backoff_secs)?;

        let config = Self {
            executor_url: executor_url.map(|u| u.trim_end_matches('/').to_string()),
            keeper_address: or_default("KEEPER_ADDRESS", defaults.keeper_address)?,
            token_in: optional("TOKEN_IN")?,
            token_out: optional("TOKEN_OUT")?,
            demo_decrypted_amount: amount_var("DEMO_DECRYPTED_AMOUNT", DEFAULT_DECRYPTED_AMOUNT)?,
            demo_min_out: amount_var("DEMO_MIN_OUT", 0)?,
            max_slippage_bps: optional("KEEPER_MAX_SLIPPAGE_BPS")?,
            expected_price_bps: optional("KEEPER_EXPECTED_PRICE_BPS")?,
            poll_interval: Duration::from_secs(or_default(
                "KEEPER_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            transport_backoff: Duration::from_secs(transport_backoff_secs),
            transport_backoff_max: Duration::from_secs(transport_backoff_max_secs),
            request_timeout: Duration::from_secs(or_default(
                "KEEPER_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            event_db_path: optional("KEEPER_EVENT_DB_PATH")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "KEEPER_POLL_INTERVAL_SECS must be positive".to_string(),
            ));
        }
        if self.transport_backoff.is_zero() {
            return Err(ConfigError::InvalidValue(
                "KEEPER_TRANSPORT_BACKOFF_SECS must be positive".to_string(),
            ));
        }
        if self.max_slippage_bps.is_some() != self.expected_price_bps.is_some() {
            return Err(ConfigError::InvalidValue(
                "KEEPER_MAX_SLIPPAGE_BPS and KEEPER_EXPECTED_PRICE_BPS must be set together"
                    .to_string(),
            ));
        }
        if let Some(bps) = self.max_slippage_bps {
            if bps > 10_000 {
                return Err(ConfigError::InvalidValue(format!(
                    "KEEPER_MAX_SLIPPAGE_BPS must be at most 10000, got {}",
                    bps
                )));
            }
        }
        Ok(())
    }

    pub fn require_executor_url(&self) -> Result<&str, ConfigError> {
        self.executor_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("EXECUTOR_URL".to_string()))
    }

    /// Slippage-derived bound when configured, else the fixed `DEMO_MIN_OUT`
    pub fn min_out_policy(&self) -> MinOutPolicy {
        match (self.expected_price_bps, self.max_slippage_bps) {
            (Some(price_bps), Some(tolerance_bps)) => MinOutPolicy::Slippage {
                price_bps,
                tolerance_bps,
            },
            _ => MinOutPolicy::Fixed(self.demo_min_out),
        }
    }
}
