//! The ledger: registry, aggregator and per-pair executors behind one entry point
//!
//! Each public operation is atomic. Events produced by an operation are buffered and published
//! to the sinks only after the operation commits, so a rejected call emits nothing.
//!
//! Callers share the ledger as `Arc<Mutex<Ledger>>`, which serializes operations the same way
//! a host chain applies transactions one at a time.

use super::aggregator::{BatchAggregator, ConsumedBatch};
use super::config::LedgerConfig;
use super::error::LedgerError;
use super::events::{EventSink, LedgerEvent};
use super::executor::SwapExecutor;
use super::fhe::FheBackend;
use super::intents::{EncryptedIntentFields, Intent, IntentRegistry, IntentWrite};
use super::swap::SwapAdapter;
use super::types::{
    current_timestamp, Address, EncryptedHandle, EncryptedInput, ExecutionResult, NowFn, PairKey,
    Readiness,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Ledger {
    operator: Address,
    config: LedgerConfig,
    registry: IntentRegistry,
    aggregator: BatchAggregator,
    executors: HashMap<PairKey, SwapExecutor>,
    sinks: Vec<Arc<dyn EventSink>>,
    now_fn: NowFn,
}

impl Ledger {
    /// Create a ledger using system time
    pub fn new(
        operator: Address,
        config: LedgerConfig,
        fhe: Arc<dyn FheBackend>,
    ) -> Result<Self, LedgerError> {
        Self::new_with_timestamp_fn(operator, config, fhe, Box::new(current_timestamp))
    }

    /// Create a ledger with a custom timestamp function (deterministic tests)
    pub fn new_with_timestamp_fn(
        operator: Address,
        config: LedgerConfig,
        fhe: Arc<dyn FheBackend>,
        now_fn: NowFn,
    ) -> Result<Self, LedgerError> {
        config
            .validate()
            .map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;

        let registry = IntentRegistry::new(Address::derive("veil-dca/intent-registry"), fhe.clone());
        let mut aggregator = BatchAggregator::new(
            Address::derive("veil-dca/batch-aggregator"),
            config.aggregator(),
            fhe,
        )?;
        aggregator.authorize_consumer(operator);

        log::info!(
            "🚀 Ledger initialised: k_min={}, time_window={}s, keeper_fee={}bps, operator={}",
            config.k_min,
            config.time_window_secs,
            config.keeper_fee_bps,
            operator.short()
        );

        Ok(Self {
            operator,
            config,
            registry,
            aggregator,
            executors: HashMap::new(),
            sinks: Vec::new(),
            now_fn,
        })
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    pub fn now(&self) -> i64 {
        (self.now_fn)()
    }

    /// Verifier identity that intent-field proofs must be bound to
    pub fn registry_identity(&self) -> Address {
        self.registry.identity()
    }

    /// Verifier identity that batch-contribution proofs must be bound to
    pub fn aggregator_identity(&self) -> Address {
        self.aggregator.identity()
    }

    fn publish(&self, events: &[LedgerEvent]) {
        for event in events {
            for sink in &self.sinks {
                sink.emit(event);
            }
        }
    }

    // ---- Intent registry ----

    pub fn create_or_update_intent(
        &mut self,
        owner: Address,
        fields: EncryptedIntentFields,
    ) -> Result<(), LedgerError> {
        let now = self.now();
        let event = match self.registry.create_or_update_intent(owner, fields, now)? {
            IntentWrite::Created => LedgerEvent::IntentCreated { owner },
            IntentWrite::Updated => LedgerEvent::IntentUpdated { owner },
        };
        self.publish(&[event]);
        Ok(())
    }

    pub fn cancel_intent(&mut self, owner: Address) -> Result<(), LedgerError> {
        let now = self.now();
        self.registry.cancel_intent(&owner, now)?;
        self.publish(&[LedgerEvent::IntentCancelled { owner }]);
        Ok(())
    }

    pub fn get_intent_active(&self, owner: &Address) -> bool {
        self.registry.get_intent_active(owner)
    }

    pub fn intent(&self, owner: &Address) -> Option<&Intent> {
        self.registry.intent(owner)
    }

    // ---- Batch aggregator ----

    /// Returns the new contributor count of the pair's open batch
    pub fn enqueue(
        &mut self,
        caller: Address,
        token_in: &Address,
        token_out: &Address,
        contribution: &EncryptedInput,
    ) -> Result<u64, LedgerError> {
        let now = self.now();
        let (pair_key, count) =
            self.aggregator
                .enqueue(&self.registry, caller, token_in, token_out, contribution, now)?;
        self.publish(&[LedgerEvent::BatchUpdated { pair_key, count }]);
        Ok(count)
    }

    pub fn ready_to_execute(&self, token_in: &Address, token_out: &Address) -> Readiness {
        self.aggregator.ready_to_execute(token_in, token_out, self.now())
    }

    /// Privileged: only the operator and deployed executors may consume
    pub fn consume_open_batch(
        &mut self,
        caller: &Address,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<ConsumedBatch, LedgerError> {
        let consumed = self.aggregator.consume_open_batch(caller, token_in, token_out)?;
        self.publish(&[LedgerEvent::BatchConsumed {
            pair_key: consumed.pair_key,
            count: consumed.count,
        }]);
        Ok(consumed)
    }

    /// Ciphertext handle of the open batch's sum, for out-of-band public decryption
    pub fn pending_sum(&self, token_in: &Address, token_out: &Address) -> Option<EncryptedHandle> {
        self.aggregator.pending_sum(&PairKey::new(token_in, token_out))
    }

    pub fn open_count(&self, token_in: &Address, token_out: &Address) -> u64 {
        self.aggregator.open_count(&PairKey::new(token_in, token_out))
    }

    // ---- Swap executors ----

    /// Deploy the executor for an ordered pair; returns its identity
    pub fn deploy_executor(
        &mut self,
        token_in: Address,
        token_out: Address,
        adapter: Box<dyn SwapAdapter>,
    ) -> Result<Address, LedgerError> {
        let pair_key = PairKey::new(&token_in, &token_out);
        if self.executors.contains_key(&pair_key) {
            return Err(LedgerError::InvalidConfig(format!(
                "executor already deployed for pair {}",
                pair_key
            )));
        }

        let identity = Address::derive(&format!("veil-dca/executor/{}", pair_key));
        let executor = SwapExecutor::new(
            identity,
            token_in,
            token_out,
            self.config.keeper_fee_bps,
            adapter,
        )?;
        self.aggregator.authorize_consumer(identity);
        self.executors.insert(pair_key, executor);
        Ok(identity)
    }

    fn executor_for(&self, token_in: &Address, token_out: &Address) -> Result<&SwapExecutor, LedgerError> {
        self.executors
            .get(&PairKey::new(token_in, token_out))
            .ok_or(LedgerError::UnknownPair)
    }

    pub fn is_ready(&self, token_in: &Address, token_out: &Address) -> Result<Readiness, LedgerError> {
        let executor = self.executor_for(token_in, token_out)?;
        Ok(executor.is_ready(&self.aggregator, self.now()))
    }

    /// Keeper entry point: settle the pair's open batch with the decrypted aggregate
    pub fn execute_if_ready(
        &mut self,
        keeper: Address,
        token_in: &Address,
        token_out: &Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<ExecutionResult, LedgerError> {
        let now = self.now();
        let executor = self
            .executors
            .get_mut(&PairKey::new(token_in, token_out))
            .ok_or(LedgerError::UnknownPair)?;

        let settlement =
            executor.execute_if_ready(&mut self.aggregator, keeper, amount_in, min_amount_out, now)?;

        self.publish(&[
            LedgerEvent::BatchConsumed {
                pair_key: settlement.pair_key,
                count: settlement.result.count,
            },
            LedgerEvent::executed(&settlement.result),
        ]);
        Ok(settlement.result)
    }

    pub fn executor_identity(&self, token_in: &Address, token_out: &Address) -> Result<Address, LedgerError> {
        Ok(self.executor_for(token_in, token_out)?.identity())
    }

    pub fn pool_balance(&self, token_in: &Address, token_out: &Address) -> Result<u128, LedgerError> {
        Ok(self.executor_for(token_in, token_out)?.pool_balance())
    }

    pub fn keeper_fee_balance(
        &self,
        token_in: &Address,
        token_out: &Address,
        keeper: &Address,
    ) -> Result<u128, LedgerError> {
        Ok(self.executor_for(token_in, token_out)?.keeper_fee_balance(keeper))
    }

    pub fn executions(&self, token_in: &Address, token_out: &Address) -> Result<u64, LedgerError> {
        Ok(self.executor_for(token_in, token_out)?.executions())
    }
}
