//! Error taxonomy for ledger operations
//!
//! Every rejection is synchronous and leaves state untouched. `code()` is the stable
//! identifier surfaced to callers; `Display` carries the human-readable reason.

use std::fmt;

/// Failures raised by the encryption backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FheError {
    /// Proof does not match the ciphertext for the given verifier and user
    InvalidProof,
    /// Handle is unknown to the backend
    UnknownHandle,
    /// Plaintext overflow in a homomorphic operation
    Overflow,
    Backend(String),
}

impl fmt::Display for FheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FheError::InvalidProof => write!(f, "invalid input proof"),
            FheError::UnknownHandle => write!(f, "unknown ciphertext handle"),
            FheError::Overflow => write!(f, "homomorphic overflow"),
            FheError::Backend(msg) => write!(f, "encryption backend error: {}", msg),
        }
    }
}

impl std::error::Error for FheError {}

/// Failures raised by a swap adapter. Any of these aborts the whole execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    InsufficientOutputAmount { amount_out: u128, min_amount_out: u128 },
    InsufficientAllowance { allowance: u128, needed: u128 },
    InsufficientBalance { balance: u128, needed: u128 },
    InsufficientLiquidity { reserve: u128, needed: u128 },
    Overflow,
}

impl fmt::Display for SwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapError::InsufficientOutputAmount { amount_out, min_amount_out } => write!(
                f,
                "insufficient output amount ({} < {})",
                amount_out, min_amount_out
            ),
            SwapError::InsufficientAllowance { allowance, needed } => {
                write!(f, "insufficient allowance ({} < {})", allowance, needed)
            }
            SwapError::InsufficientBalance { balance, needed } => {
                write!(f, "insufficient balance ({} < {})", balance, needed)
            }
            SwapError::InsufficientLiquidity { reserve, needed } => {
                write!(f, "insufficient liquidity ({} < {})", reserve, needed)
            }
            SwapError::Overflow => write!(f, "swap amount overflow"),
        }
    }
}

impl std::error::Error for SwapError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A ciphertext proof failed validation
    InvalidProof { field: &'static str },
    /// Cancel attempted without an active intent
    NoActiveIntent,
    /// Enqueue attempted by an address whose intent is missing or cancelled
    IntentInactive,
    /// Address already enrolled in the open batch for this pair
    AlreadyInBatch,
    /// Consume attempted on an empty batch
    NoOpenBatch,
    /// Execute attempted while neither readiness trigger holds
    NotReady,
    /// Caller is not allowed to consume batches
    Unauthorized,
    /// No executor is deployed for the requested pair
    UnknownPair,
    /// Settlement failed inside the swap adapter (execution rolled back)
    Swap(SwapError),
    Fhe(FheError),
    InvalidConfig(String),
}

impl LedgerError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidProof { .. } => "InvalidProof",
            LedgerError::NoActiveIntent => "NoActiveIntent",
            LedgerError::IntentInactive => "IntentInactive",
            LedgerError::AlreadyInBatch => "AlreadyInBatch",
            LedgerError::NoOpenBatch => "NoOpenBatch",
            LedgerError::NotReady => "NotReady",
            LedgerError::Unauthorized => "Unauthorized",
            LedgerError::UnknownPair => "UnknownPair",
            LedgerError::Swap(_) => "SwapFailed",
            LedgerError::Fhe(_) => "EncryptionBackend",
            LedgerError::InvalidConfig(_) => "InvalidConfig",
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidProof { field } => write!(f, "invalid proof for {}", field),
            LedgerError::NoActiveIntent => write!(f, "No active intent to cancel"),
            LedgerError::IntentInactive => write!(f, "intent inactive"),
            LedgerError::AlreadyInBatch => write!(f, "already in batch"),
            LedgerError::NoOpenBatch => write!(f, "no open batch"),
            LedgerError::NotReady => write!(f, "not ready"),
            LedgerError::Unauthorized => write!(f, "caller may not consume batches"),
            LedgerError::UnknownPair => write!(f, "no executor for pair"),
            LedgerError::Swap(e) => write!(f, "swap failed: {}", e),
            LedgerError::Fhe(e) => write!(f, "{}", e),
            LedgerError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<SwapError> for LedgerError {
    fn from(err: SwapError) -> Self {
        LedgerError::Swap(err)
    }
}

impl From<FheError> for LedgerError {
    fn from(err: FheError) -> Self {
        LedgerError::Fhe(err)
    }
}
