//! Environment-variable helpers shared by the ledger and keeper configs

use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Read a required variable
pub fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

/// Parse an optional variable; unset or blank yields `None`
pub fn optional<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("{}={:?}: {}", name, raw, e))),
        _ => Ok(None),
    }
}

/// Parse a variable, falling back to `default` when unset
pub fn or_default<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(optional(name)?.unwrap_or(default))
}

/// Parse an integer amount that may be written in scientific notation (`1e18`)
pub fn parse_amount(raw: &str) -> Result<u128, String> {
    let raw = raw.trim().replace('_', "");
    if let Ok(v) = raw.parse::<u128>() {
        return Ok(v);
    }

    let (mantissa, exponent) = raw
        .split_once(['e', 'E'])
        .ok_or_else(|| format!("not an integer amount: {}", raw))?;
    let exponent: u32 = exponent
        .parse()
        .map_err(|_| format!("bad exponent in {}", raw))?;
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let frac_len = frac_part.len() as u32;
    if frac_len > exponent {
        return Err(format!("amount {} is not an integer", raw));
    }

    let digits: u128 = format!("{}{}", int_part, frac_part)
        .parse()
        .map_err(|_| format!("not an integer amount: {}", raw))?;
    10u128
        .checked_pow(exponent - frac_len)
        .and_then(|scale| digits.checked_mul(scale))
        .ok_or_else(|| format!("amount {} overflows", raw))
}
