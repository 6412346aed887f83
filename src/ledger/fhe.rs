//! Encryption backend capability interface
//!
//! The ledger never sees plaintext. It asks the backend two questions only:
//! "is this proof valid for this ciphertext, verifier and user?" and "give me a handle to the
//! homomorphic sum of these two handles". Public decryption of an aggregate is a separate
//! capability used out-of-band by the keeper, never by the ledger itself.
//!
//! `MockFhe` is an in-memory stand-in: handles are random 32-byte identifiers, plaintexts live
//! in a private table, proofs are Keccak-256 commitments binding handle, verifier and user.

use super::error::FheError;
use super::types::{Address, EncryptedHandle, EncryptedInput, InputProof};
use rand::RngCore;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Who an encrypted input was produced for: the verifying component and the submitting user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputContext {
    pub verifier: Address,
    pub user: Address,
}

pub trait FheBackend: Send + Sync {
    /// Validate `input.proof` against `input.handle` for `ctx`, returning the accepted handle
    fn verify_input(
        &self,
        input: &EncryptedInput,
        ctx: &InputContext,
    ) -> Result<EncryptedHandle, FheError>;

    /// Homomorphic addition; the result is a fresh handle
    fn add(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> Result<EncryptedHandle, FheError>;
}

/// Out-of-band public decryption of aggregate ciphertexts
pub trait PublicDecryptor: Send + Sync {
    fn public_decrypt(&self, handle: &EncryptedHandle) -> Result<u128, FheError>;
}

/// Deterministic-proof, random-handle mock of an FHE coprocessor
pub struct MockFhe {
    plaintexts: Mutex<HashMap<EncryptedHandle, u128>>,
}

impl MockFhe {
    pub fn new() -> Self {
        Self {
            plaintexts: Mutex::new(HashMap::new()),
        }
    }

    /// Client-side encryption: register `value` and produce a handle with a proof bound to `ctx`
    pub fn encrypt(&self, value: u128, ctx: &InputContext) -> Result<EncryptedInput, FheError> {
        let handle = self.store(value)?;
        Ok(EncryptedInput {
            handle,
            proof: Self::proof_for(&handle, ctx),
        })
    }

    /// Number of plaintexts the backend still tracks
    pub fn live_handles(&self) -> usize {
        self.table().map(|t| t.len()).unwrap_or(0)
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<EncryptedHandle, u128>>, FheError> {
        self.plaintexts
            .lock()
            .map_err(|_| FheError::Backend("plaintext table poisoned".to_string()))
    }

    fn fresh_handle() -> EncryptedHandle {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        EncryptedHandle(bytes)
    }

    fn store(&self, value: u128) -> Result<EncryptedHandle, FheError> {
        let handle = Self::fresh_handle();
        self.table()?.insert(handle, value);
        Ok(handle)
    }

    fn lookup(&self, handle: &EncryptedHandle) -> Result<u128, FheError> {
        self.table()?.get(handle).copied().ok_or(FheError::UnknownHandle)
    }

    fn proof_for(handle: &EncryptedHandle, ctx: &InputContext) -> InputProof {
        let mut hasher = Keccak256::new();
        hasher.update(b"veil-dca/input-proof");
        hasher.update(handle.0);
        hasher.update(ctx.verifier.0);
        hasher.update(ctx.user.0);
        InputProof(hasher.finalize().to_vec())
    }
}

impl Default for MockFhe {
    fn default() -> Self {
        Self::new()
    }
}

impl FheBackend for MockFhe {
    fn verify_input(
        &self,
        input: &EncryptedInput,
        ctx: &InputContext,
    ) -> Result<EncryptedHandle, FheError> {
        if input.proof != Self::proof_for(&input.handle, ctx) {
            return Err(FheError::InvalidProof);
        }
        // A well-formed proof over a handle the backend never issued is still rejected
        self.lookup(&input.handle)?;
        Ok(input.handle)
    }

    /// Operands are released once the sum exists; a running total keeps one row per batch
    fn add(&self, lhs: &EncryptedHandle, rhs: &EncryptedHandle) -> Result<EncryptedHandle, FheError> {
        let mut table = self.table()?;
        let a = table.get(lhs).copied().ok_or(FheError::UnknownHandle)?;
        let b = table.get(rhs).copied().ok_or(FheError::UnknownHandle)?;
        let sum = a.checked_add(b).ok_or(FheError::Overflow)?;

        let handle = Self::fresh_handle();
        table.insert(handle, sum);
        table.remove(lhs);
        table.remove(rhs);
        Ok(handle)
    }
}

impl PublicDecryptor for MockFhe {
    fn public_decrypt(&self, handle: &EncryptedHandle) -> Result<u128, FheError> {
        self.lookup(handle)
    }
}
