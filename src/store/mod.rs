//! Observer-side persistence of ledger events
//!
//! The ledger publishes through a `ChannelEventSink`; `event_writer_task` drains the channel
//! into a writer backend until every sender is gone.

pub mod jsonl_writer;
pub mod pragma;
pub mod sqlite_writer;
pub mod writer_backend;

pub use jsonl_writer::JsonlEventWriter;
pub use sqlite_writer::SqliteEventWriter;
pub use writer_backend::{EventRecord, EventWriterBackend, StoreError};

use crate::ledger::types::current_timestamp;
use crate::ledger::LedgerEvent;
use tokio::sync::mpsc;

/// Drain `rx` into `backend`; returns the number of events written
///
/// Write errors are logged and the event skipped. The backend is flushed when the channel
/// closes.
pub async fn event_writer_task(
    mut rx: mpsc::Receiver<LedgerEvent>,
    mut backend: Box<dyn EventWriterBackend>,
) -> u64 {
    log::info!("💾 Event writer started ({} backend)", backend.backend_type());
    let mut written = 0u64;

    while let Some(event) = rx.recv().await {
        let record = EventRecord {
            recorded_at: current_timestamp(),
            event,
        };
        match backend.write(&record).await {
            Ok(()) => written += 1,
            Err(e) => log::error!("❌ Failed to persist {} event: {}", record.event.name(), e),
        }
    }

    if let Err(e) = backend.flush().await {
        log::error!("❌ Final flush failed: {}", e);
    }
    log::info!("💾 Event writer stopped after {} events", written);
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Address, ChannelEventSink, EventSink};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_writer_task_drains_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let backend = Box::new(JsonlEventWriter::new(&path).unwrap());

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(event_writer_task(rx, backend));

        let sink = ChannelEventSink::new(tx);
        let owner = Address::derive("alice");
        sink.emit(&LedgerEvent::IntentCreated { owner });
        sink.emit(&LedgerEvent::IntentCancelled { owner });
        drop(sink);

        assert_eq!(task.await.unwrap(), 2);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
