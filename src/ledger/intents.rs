//! Intent registry: one encrypted DCA configuration per owner
//!
//! Every field is stored as a ciphertext handle with its proof; nothing here is ever decrypted.
//! The aggregator sees the registry only through `IntentStatus`, which exposes the plaintext
//! `active` flag and nothing else.

use super::error::LedgerError;
use super::fhe::{FheBackend, InputContext};
use super::types::{Address, EncryptedInput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The six encrypted parameters of a recurring buy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedIntentFields {
    pub budget: EncryptedInput,
    pub per_buy: EncryptedInput,
    pub frequency: EncryptedInput,
    pub start: EncryptedInput,
    pub end: EncryptedInput,
    pub dip_threshold_bps: EncryptedInput,
}

impl EncryptedIntentFields {
    fn named(&self) -> [(&'static str, &EncryptedInput); 6] {
        [
            ("budget", &self.budget),
            ("perBuy", &self.per_buy),
            ("frequency", &self.frequency),
            ("start", &self.start),
            ("end", &self.end),
            ("dipThresholdBps", &self.dip_threshold_bps),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub owner: Address,
    pub fields: EncryptedIntentFields,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Which event a successful write maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentWrite {
    Created,
    Updated,
}

/// Read-only eligibility view handed to the batch aggregator
pub trait IntentStatus {
    fn intent_active(&self, owner: &Address) -> bool;
}

pub struct IntentRegistry {
    identity: Address,
    fhe: Arc<dyn FheBackend>,
    intents: HashMap<Address, Intent>,
}

impl IntentRegistry {
    /// `identity` is the verifier address client proofs must be bound to
    pub fn new(identity: Address, fhe: Arc<dyn FheBackend>) -> Self {
        Self {
            identity,
            fhe,
            intents: HashMap::new(),
        }
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Store or wholesale-replace the caller's intent and mark it active
    ///
    /// All six proofs are checked before anything is written.
    pub fn create_or_update_intent(
        &mut self,
        owner: Address,
        fields: EncryptedIntentFields,
        now: i64,
    ) -> Result<IntentWrite, LedgerError> {
        let ctx = InputContext {
            verifier: self.identity,
            user: owner,
        };
        for (field, input) in fields.named() {
            self.fhe
                .verify_input(input, &ctx)
                .map_err(|_| LedgerError::InvalidProof { field })?;
        }

        match self.intents.get_mut(&owner) {
            Some(existing) => {
                existing.fields = fields;
                existing.active = true;
                existing.updated_at = now;
                log::debug!("Intent updated for {}", owner.short());
                Ok(IntentWrite::Updated)
            }
            None => {
                self.intents.insert(
                    owner,
                    Intent {
                        owner,
                        fields,
                        active: true,
                        created_at: now,
                        updated_at: now,
                    },
                );
                log::debug!("Intent created for {}", owner.short());
                Ok(IntentWrite::Created)
            }
        }
    }

    pub fn cancel_intent(&mut self, owner: &Address, now: i64) -> Result<(), LedgerError> {
        match self.intents.get_mut(owner) {
            Some(intent) if intent.active => {
                intent.active = false;
                intent.updated_at = now;
                log::debug!("Intent cancelled for {}", owner.short());
                Ok(())
            }
            _ => Err(LedgerError::NoActiveIntent),
        }
    }

    pub fn get_intent_active(&self, owner: &Address) -> bool {
        self.intents.get(owner).map(|i| i.active).unwrap_or(false)
    }

    /// Owner-facing view of the stored ciphertext handles
    pub fn intent(&self, owner: &Address) -> Option<&Intent> {
        self.intents.get(owner)
    }

    pub fn active_count(&self) -> usize {
        self.intents.values().filter(|i| i.active).count()
    }
}

impl IntentStatus for IntentRegistry {
    fn intent_active(&self, owner: &Address) -> bool {
        self.get_intent_active(owner)
    }
}
