//! Core value types shared by the ledger components
//!
//! Identities, pair keys and ciphertext handles are fixed-size byte arrays rendered as
//! `0x`-prefixed lowercase hex, both in logs and on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Timestamp source in unix seconds (swapped for a manual clock in tests)
pub type NowFn = Box<dyn Fn() -> i64 + Send + Sync>;

/// Current unix timestamp in seconds
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexParseError {
    InvalidHex(String),
    InvalidLength { expected: usize, actual: usize },
}

impl fmt::Display for HexParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexParseError::InvalidHex(e) => write!(f, "invalid hex: {}", e),
            HexParseError::InvalidLength { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for HexParseError {}

fn decode_hex(s: &str) -> Result<Vec<u8>, HexParseError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| HexParseError::InvalidHex(e.to_string()))
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexParseError> {
    let bytes = decode_hex(s)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexParseError::InvalidLength { expected: N, actual })
}

macro_rules! hex_newtype {
    ($name:ident, $len:expr) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = HexParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<{ $len }>(s).map($name)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// 20-byte account / token / component identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

hex_newtype!(Address, 20);

impl Address {
    /// Derive a stable identity from a label (component identities, demo accounts)
    pub fn derive(label: &str) -> Self {
        let digest = Keccak256::digest(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Address(bytes)
    }

    /// ABI word encoding: left-padded to 32 bytes
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

/// Batch identifier for an ordered `(token_in, token_out)` pair
///
/// Keccak-256 over the two ABI-encoded addresses in the order supplied, so `(A, B)` and
/// `(B, A)` name different batches. Callers must pass tokens consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub [u8; 32]);

hex_newtype!(PairKey, 32);

impl PairKey {
    pub fn new(token_in: &Address, token_out: &Address) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(token_in.to_word());
        hasher.update(token_out.to_word());
        PairKey(hasher.finalize().into())
    }

    pub fn short(&self) -> String {
        let full = self.to_string();
        full[..10].to_string()
    }
}

/// Opaque reference to a ciphertext held by the encryption backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptedHandle(pub [u8; 32]);

hex_newtype!(EncryptedHandle, 32);

/// Correctness proof accompanying a ciphertext input
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputProof(pub Vec<u8>);

impl Serialize for InputProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for InputProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map(InputProof).map_err(serde::de::Error::custom)
    }
}

/// Ciphertext handle plus the proof that it was well formed for a given verifier and user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: EncryptedHandle,
    pub proof: InputProof,
}

/// Readiness triggers of an open batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Readiness {
    #[serde(rename = "byK")]
    pub by_count: bool,
    #[serde(rename = "byTime")]
    pub by_time: bool,
}

impl Readiness {
    /// Either trigger is sufficient
    pub fn is_ready(&self) -> bool {
        self.by_count || self.by_time
    }
}

/// Aggregate outcome of one batch execution. Never carries per-user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub count: u64,
    #[serde(with = "u128_string")]
    pub amount_in: u128,
    #[serde(with = "u128_string")]
    pub amount_out: u128,
    #[serde(with = "u128_string")]
    pub fee: u128,
}

/// Token amounts travel as decimal strings on the wire (values exceed JSON-safe integers)
pub mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.trim().parse().map_err(serde::de::Error::custom)
    }
}
