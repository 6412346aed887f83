//! Observer events
//!
//! Events carry identities, pair keys, counts and batch aggregates only. No variant has room
//! for a ciphertext handle, a contribution or any per-user amount.

use super::types::{u128_string, Address, ExecutionResult, PairKey};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum LedgerEvent {
    IntentCreated {
        owner: Address,
    },
    IntentUpdated {
        owner: Address,
    },
    IntentCancelled {
        owner: Address,
    },
    #[serde(rename_all = "camelCase")]
    BatchUpdated {
        pair_key: PairKey,
        count: u64,
    },
    #[serde(rename_all = "camelCase")]
    BatchConsumed {
        pair_key: PairKey,
        count: u64,
    },
    #[serde(rename_all = "camelCase")]
    BatchExecuted {
        count: u64,
        #[serde(with = "u128_string")]
        amount_in: u128,
        #[serde(with = "u128_string")]
        amount_out: u128,
        #[serde(with = "u128_string")]
        fee: u128,
    },
}

impl LedgerEvent {
    pub fn executed(result: &ExecutionResult) -> Self {
        LedgerEvent::BatchExecuted {
            count: result.count,
            amount_in: result.amount_in,
            amount_out: result.amount_out,
            fee: result.fee,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::IntentCreated { .. } => "IntentCreated",
            LedgerEvent::IntentUpdated { .. } => "IntentUpdated",
            LedgerEvent::IntentCancelled { .. } => "IntentCancelled",
            LedgerEvent::BatchUpdated { .. } => "BatchUpdated",
            LedgerEvent::BatchConsumed { .. } => "BatchConsumed",
            LedgerEvent::BatchExecuted { .. } => "BatchExecuted",
        }
    }

    /// Owner address for intent events, `None` for batch events
    pub fn owner(&self) -> Option<Address> {
        match self {
            LedgerEvent::IntentCreated { owner }
            | LedgerEvent::IntentUpdated { owner }
            | LedgerEvent::IntentCancelled { owner } => Some(*owner),
            _ => None,
        }
    }

    pub fn pair_key(&self) -> Option<PairKey> {
        match self {
            LedgerEvent::BatchUpdated { pair_key, .. } | LedgerEvent::BatchConsumed { pair_key, .. } => {
                Some(*pair_key)
            }
            _ => None,
        }
    }
}

/// Receives committed events, in commit order
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Writes each event to the log at info level
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::BatchExecuted { count, amount_in, amount_out, fee } => log::info!(
                "📣 BatchExecuted count={} amount_in={} amount_out={} fee={}",
                count,
                amount_in,
                amount_out,
                fee
            ),
            LedgerEvent::BatchUpdated { pair_key, count } | LedgerEvent::BatchConsumed { pair_key, count } => {
                log::info!("📣 {} pair={} count={}", event.name(), pair_key.short(), count)
            }
            _ => {
                if let Some(owner) = event.owner() {
                    log::info!("📣 {} owner={}", event.name(), owner.short());
                }
            }
        }
    }
}

/// Records every event in memory
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &LedgerEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// Forwards events to a bounded channel (feeds the persistence writer task)
///
/// Never blocks the ledger: when the channel is full or closed the event is dropped and a
/// warning is logged.
pub struct ChannelEventSink {
    tx: mpsc::Sender<LedgerEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<LedgerEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &LedgerEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            log::warn!("⚠️  Dropped {} event: {}", event.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = LedgerEvent::BatchExecuted {
            count: 3,
            amount_in: 300,
            amount_out: 300,
            fee: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "BatchExecuted");
        assert_eq!(json["count"], 3);
        assert_eq!(json["amountIn"], "300");
        assert_eq!(json["fee"], "0");

        let updated = LedgerEvent::BatchUpdated {
            pair_key: PairKey::new(&Address::derive("a"), &Address::derive("b")),
            count: 2,
        };
        let json = serde_json::to_value(&updated).unwrap();
        assert!(json["pairKey"].as_str().unwrap().starts_with("0x"));

        let parsed: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, updated);
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemoryEventSink::new();
        let alice = Address::derive("alice");
        sink.emit(&LedgerEvent::IntentCreated { owner: alice });
        sink.emit(&LedgerEvent::IntentCancelled { owner: alice });

        let names: Vec<_> = sink.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["IntentCreated", "IntentCancelled"]);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelEventSink::new(tx);
        let owner = Address::derive("alice");

        sink.emit(&LedgerEvent::IntentCreated { owner });
        sink.emit(&LedgerEvent::IntentUpdated { owner });

        assert_eq!(rx.recv().await, Some(LedgerEvent::IntentCreated { owner }));
        assert!(rx.try_recv().is_err());
    }
}
