//! Per-pair batch aggregation
//!
//! ## State machine (per pair key)
//!
//! ```text
//! Empty --enqueue--> Open --enqueue--> Open[ready] --consume--> Empty
//! ```
//!
//! - Readiness is two independent triggers: `count >= k_min` (k-anonymity) or the batch has
//!   been open for at least `time_window_secs` (fallback for thin pairs). An empty batch is
//!   never ready.
//! - The running sum is a ciphertext handle. Neither a contribution nor the sum is ever
//!   returned in plaintext, logged, or placed in an event; only `count` leaves this module.
//! - `consume_open_batch` does not check readiness. The executor gates on readiness and then
//!   trusts the snapshot returned at consume time.

use super::error::LedgerError;
use super::fhe::{FheBackend, InputContext};
use super::intents::IntentStatus;
use super::types::{Address, EncryptedHandle, EncryptedInput, PairKey, Readiness};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Minimum distinct contributors for k-anonymity readiness
    pub k_min: u64,
    /// Fallback readiness window in seconds, measured from the first enqueue
    pub time_window_secs: i64,
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.k_min == 0 {
            return Err(LedgerError::InvalidConfig("k_min must be at least 1".to_string()));
        }
        if self.time_window_secs <= 0 {
            return Err(LedgerError::InvalidConfig(
                "time_window_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Open batch record. Absent from the arena when the pair is Empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    sum_encrypted: Option<EncryptedHandle>,
    count: u64,
    opened_at: Option<i64>,
    included: HashSet<Address>,
}

impl Batch {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn opened_at(&self) -> Option<i64> {
        self.opened_at
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.included.contains(addr)
    }

    pub fn included_len(&self) -> usize {
        self.included.len()
    }

    pub fn is_open(&self) -> bool {
        self.count > 0
    }
}

/// Snapshot handed out by a successful consume
///
/// Carries the full prior record so a failed settlement can put the batch back untouched.
#[derive(Debug, Clone)]
pub struct ConsumedBatch {
    pub pair_key: PairKey,
    pub sum_encrypted: EncryptedHandle,
    pub count: u64,
    previous: Batch,
}

pub struct BatchAggregator {
    identity: Address,
    config: AggregatorConfig,
    fhe: Arc<dyn FheBackend>,
    batches: HashMap<PairKey, Batch>,
    consumers: HashSet<Address>,
}

impl BatchAggregator {
    pub fn new(
        identity: Address,
        config: AggregatorConfig,
        fhe: Arc<dyn FheBackend>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            identity,
            config,
            fhe,
            batches: HashMap::new(),
            consumers: HashSet::new(),
        })
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn config(&self) -> AggregatorConfig {
        self.config
    }

    /// Allow `consumer` to call `consume_open_batch` (executors, ledger operator)
    pub fn authorize_consumer(&mut self, consumer: Address) {
        self.consumers.insert(consumer);
    }

    pub fn is_authorized_consumer(&self, addr: &Address) -> bool {
        self.consumers.contains(addr)
    }

    /// Add the caller's encrypted per-buy contribution to the pair's open batch
    ///
    /// Returns the pair key and the new contributor count (the only public outputs).
    pub fn enqueue(
        &mut self,
        intents: &dyn IntentStatus,
        caller: Address,
        token_in: &Address,
        token_out: &Address,
        contribution: &EncryptedInput,
        now: i64,
    ) -> Result<(PairKey, u64), LedgerError> {
        let key = PairKey::new(token_in, token_out);

        if !intents.intent_active(&caller) {
            return Err(LedgerError::IntentInactive);
        }

        let current_sum = match self.batches.get(&key) {
            Some(batch) if batch.contains(&caller) => return Err(LedgerError::AlreadyInBatch),
            Some(batch) => batch.sum_encrypted,
            None => None,
        };

        let ctx = InputContext {
            verifier: self.identity,
            user: caller,
        };
        let accepted = self
            .fhe
            .verify_input(contribution, &ctx)
            .map_err(|_| LedgerError::InvalidProof { field: "contribution" })?;

        let new_sum = match current_sum {
            Some(sum) => self.fhe.add(&sum, &accepted)?,
            None => accepted,
        };

        // All fallible work is done; mutate
        let batch = self.batches.entry(key).or_default();
        if batch.count == 0 {
            batch.opened_at = Some(now);
            log::info!("📦 Batch opened for pair {}", key.short());
        }
        batch.sum_encrypted = Some(new_sum);
        batch.count += 1;
        batch.included.insert(caller);

        log::debug!("Batch {} now has {} contributors", key.short(), batch.count);

        Ok((key, batch.count))
    }

    pub fn ready_to_execute(&self, token_in: &Address, token_out: &Address, now: i64) -> Readiness {
        self.readiness(&PairKey::new(token_in, token_out), now)
    }

    pub fn readiness(&self, key: &PairKey, now: i64) -> Readiness {
        match self.batches.get(key) {
            Some(batch) if batch.is_open() => Readiness {
                by_count: batch.count >= self.config.k_min,
                by_time: batch
                    .opened_at
                    .map(|opened| now - opened >= self.config.time_window_secs)
                    .unwrap_or(false),
            },
            _ => Readiness::default(),
        }
    }

    /// Take the open batch for the pair, leaving it Empty
    pub fn consume_open_batch(
        &mut self,
        caller: &Address,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<ConsumedBatch, LedgerError> {
        if !self.is_authorized_consumer(caller) {
            return Err(LedgerError::Unauthorized);
        }
        self.consume_by_key(&PairKey::new(token_in, token_out))
    }

    fn consume_by_key(&mut self, key: &PairKey) -> Result<ConsumedBatch, LedgerError> {
        let is_open = self.batches.get(key).map(|b| b.is_open()).unwrap_or(false);
        if !is_open {
            return Err(LedgerError::NoOpenBatch);
        }

        let previous = self.batches.remove(key).ok_or(LedgerError::NoOpenBatch)?;
        let sum_encrypted = previous.sum_encrypted.ok_or(LedgerError::NoOpenBatch)?;

        log::info!(
            "📤 Batch consumed for pair {} ({} contributors)",
            key.short(),
            previous.count
        );

        Ok(ConsumedBatch {
            pair_key: *key,
            sum_encrypted,
            count: previous.count,
            previous,
        })
    }

    /// Undo a consume whose settlement failed
    pub(crate) fn restore_batch(&mut self, consumed: ConsumedBatch) {
        log::warn!(
            "↩️  Restoring batch for pair {} after failed settlement",
            consumed.pair_key.short()
        );
        self.batches.insert(consumed.pair_key, consumed.previous);
    }

    /// Ciphertext handle of the open batch's running sum (for out-of-band public decryption)
    pub fn pending_sum(&self, key: &PairKey) -> Option<EncryptedHandle> {
        self.batches
            .get(key)
            .filter(|b| b.is_open())
            .and_then(|b| b.sum_encrypted)
    }

    pub fn batch(&self, key: &PairKey) -> Option<&Batch> {
        self.batches.get(key)
    }

    pub fn open_count(&self, key: &PairKey) -> u64 {
        self.batches.get(key).map(|b| b.count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fhe::{MockFhe, PublicDecryptor};

    struct AllActive(HashSet<Address>);

    impl IntentStatus for AllActive {
        fn intent_active(&self, owner: &Address) -> bool {
            self.0.contains(owner)
        }
    }

    struct Fixture {
        fhe: Arc<MockFhe>,
        agg: BatchAggregator,
        intents: AllActive,
        token_in: Address,
        token_out: Address,
    }

    fn fixture(users: &[&str]) -> Fixture {
        let fhe = Arc::new(MockFhe::new());
        let agg = BatchAggregator::new(
            Address::derive("aggregator"),
            AggregatorConfig { k_min: 3, time_window_secs: 60 },
            fhe.clone(),
        )
        .unwrap();
        Fixture {
            fhe,
            agg,
            intents: AllActive(users.iter().map(|u| Address::derive(u)).collect()),
            token_in: Address::derive("token-in"),
            token_out: Address::derive("token-out"),
        }
    }

    impl Fixture {
        fn contribution(&self, user: &str, amount: u128) -> EncryptedInput {
            let ctx = InputContext {
                verifier: self.agg.identity(),
                user: Address::derive(user),
            };
            self.fhe.encrypt(amount, &ctx).unwrap()
        }

        fn enqueue(&mut self, user: &str, amount: u128, now: i64) -> Result<(PairKey, u64), LedgerError> {
            let input = self.contribution(user, amount);
            self.agg.enqueue(
                &self.intents,
                Address::derive(user),
                &self.token_in,
                &self.token_out,
                &input,
                now,
            )
        }
    }

    #[test]
    fn test_config_validation() {
        let fhe = Arc::new(MockFhe::new());
        let zero_k = AggregatorConfig { k_min: 0, time_window_secs: 60 };
        assert!(BatchAggregator::new(Address::derive("a"), zero_k, fhe.clone()).is_err());
        let zero_window = AggregatorConfig { k_min: 3, time_window_secs: 0 };
        assert!(BatchAggregator::new(Address::derive("a"), zero_window, fhe).is_err());
    }

    #[test]
    fn test_k_anonymity_threshold_crossed_on_third_enqueue() {
        let mut f = fixture(&["alice", "bob", "charlie"]);

        let (key, count) = f.enqueue("alice", 100, 1000).unwrap();
        assert_eq!(count, 1);
        assert_eq!(f.agg.readiness(&key, 1000), Readiness { by_count: false, by_time: false });

        f.enqueue("bob", 200, 1001).unwrap();
        assert!(!f.agg.readiness(&key, 1001).by_count);

        let (_, count) = f.enqueue("charlie", 300, 1002).unwrap();
        assert_eq!(count, 3);
        assert_eq!(f.agg.readiness(&key, 1002), Readiness { by_count: true, by_time: false });

        let batch = f.agg.batch(&key).unwrap();
        assert_eq!(batch.count() as usize, batch.included_len());
        assert_eq!(batch.opened_at(), Some(1000));

        // The encrypted sum aggregates all three contributions
        let sum = f.agg.pending_sum(&key).unwrap();
        assert_eq!(f.fhe.public_decrypt(&sum), Ok(600));
    }

    #[test]
    fn test_time_window_readiness() {
        let mut f = fixture(&["alice", "bob"]);
        f.enqueue("alice", 10, 5_000).unwrap();
        f.enqueue("bob", 10, 5_010).unwrap();

        let before = f.agg.ready_to_execute(&f.token_in, &f.token_out, 5_059);
        assert_eq!(before, Readiness { by_count: false, by_time: false });

        let after = f.agg.ready_to_execute(&f.token_in, &f.token_out, 5_061);
        assert_eq!(after, Readiness { by_count: false, by_time: true });
    }

    #[test]
    fn test_empty_batch_never_ready() {
        let f = fixture(&[]);
        let readiness = f.agg.ready_to_execute(&f.token_in, &f.token_out, i64::MAX);
        assert_eq!(readiness, Readiness::default());
    }

    #[test]
    fn test_double_enrollment_rejected() {
        let mut f = fixture(&["alice"]);
        f.enqueue("alice", 10, 1).unwrap();
        assert_eq!(f.enqueue("alice", 20, 2), Err(LedgerError::AlreadyInBatch));

        let key = PairKey::new(&f.token_in, &f.token_out);
        assert_eq!(f.agg.open_count(&key), 1);
    }

    #[test]
    fn test_inactive_intent_rejected() {
        let mut f = fixture(&["alice"]);
        assert_eq!(f.enqueue("mallory", 10, 1), Err(LedgerError::IntentInactive));

        // Also rejected once a batch is already open
        f.enqueue("alice", 10, 1).unwrap();
        assert_eq!(f.enqueue("mallory", 10, 2), Err(LedgerError::IntentInactive));
    }

    #[test]
    fn test_contribution_proof_bound_to_caller() {
        let mut f = fixture(&["alice", "bob"]);
        let bobs = f.contribution("bob", 10);
        let result = f.agg.enqueue(
            &f.intents,
            Address::derive("alice"),
            &f.token_in,
            &f.token_out,
            &bobs,
            1,
        );
        assert_eq!(result, Err(LedgerError::InvalidProof { field: "contribution" }));
        assert!(f.agg.batch(&PairKey::new(&f.token_in, &f.token_out)).is_none());
    }

    #[test]
    fn test_consume_resets_batch() {
        let mut f = fixture(&["alice", "bob", "charlie"]);
        let operator = Address::derive("operator");
        f.agg.authorize_consumer(operator);

        f.enqueue("alice", 1, 10).unwrap();
        f.enqueue("bob", 2, 11).unwrap();
        f.enqueue("charlie", 3, 12).unwrap();

        let consumed = f.agg.consume_open_batch(&operator, &f.token_in, &f.token_out).unwrap();
        assert_eq!(consumed.count, 3);
        assert_eq!(f.fhe.public_decrypt(&consumed.sum_encrypted), Ok(6));

        let readiness = f.agg.ready_to_execute(&f.token_in, &f.token_out, 10_000);
        assert_eq!(readiness, Readiness::default());
        assert_eq!(
            f.agg.consume_open_batch(&operator, &f.token_in, &f.token_out).unwrap_err(),
            LedgerError::NoOpenBatch
        );

        // Included set was cleared: Alice can join the next batch
        let (key, count) = f.enqueue("alice", 5, 20).unwrap();
        assert_eq!(count, 1);
        assert_eq!(f.agg.batch(&key).unwrap().opened_at(), Some(20));
    }

    #[test]
    fn test_consume_empty_and_unauthorized() {
        let mut f = fixture(&["alice"]);
        let operator = Address::derive("operator");
        f.agg.authorize_consumer(operator);

        assert_eq!(
            f.agg.consume_open_batch(&operator, &f.token_in, &f.token_out).unwrap_err(),
            LedgerError::NoOpenBatch
        );

        f.enqueue("alice", 1, 10).unwrap();
        assert_eq!(
            f.agg
                .consume_open_batch(&Address::derive("alice"), &f.token_in, &f.token_out)
                .unwrap_err(),
            LedgerError::Unauthorized
        );
    }

    #[test]
    fn test_restore_after_consume() {
        let mut f = fixture(&["alice", "bob"]);
        let operator = Address::derive("operator");
        f.agg.authorize_consumer(operator);
        f.enqueue("alice", 1, 10).unwrap();
        f.enqueue("bob", 2, 11).unwrap();

        let key = PairKey::new(&f.token_in, &f.token_out);
        let before = f.agg.batch(&key).cloned().unwrap();

        let consumed = f.agg.consume_open_batch(&operator, &f.token_in, &f.token_out).unwrap();
        f.agg.restore_batch(consumed);

        assert_eq!(f.agg.batch(&key), Some(&before));
        assert_eq!(f.enqueue("bob", 3, 12), Err(LedgerError::AlreadyInBatch));
    }

    #[test]
    fn test_reversed_pair_is_separate_batch() {
        let mut f = fixture(&["alice"]);
        f.enqueue("alice", 1, 10).unwrap();

        let reversed = f.agg.ready_to_execute(&f.token_out, &f.token_in, 1_000);
        assert_eq!(reversed, Readiness::default());
        assert_eq!(f.agg.open_count(&PairKey::new(&f.token_out, &f.token_in)), 0);
    }
}
