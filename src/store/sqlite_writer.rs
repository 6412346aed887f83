use super::pragma::apply_optimized_pragmas;
use super::writer_backend::{EventRecord, EventWriterBackend, StoreError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Instant;

/// Aggregate-only event log in SQLite
///
/// Rows are buffered and inserted in one transaction when the batch fills, when the flush
/// interval elapses, or on an explicit `flush`.
pub struct SqliteEventWriter {
    conn: Connection,
    batch: Vec<EventRecord>,
    batch_size: usize,
    last_flush: Instant,
    flush_interval_secs: u64,
}

impl SqliteEventWriter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::open(parent, e))?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| StoreError::open(db_path, e))?;
        apply_optimized_pragmas(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ledger_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                owner TEXT,
                pair_key TEXT,
                payload TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_type_time ON ledger_events(event_type, recorded_at DESC);
            CREATE INDEX IF NOT EXISTS idx_events_pair ON ledger_events(pair_key, recorded_at DESC);",
        )?;

        log::info!("✅ SQLite event store initialized with WAL mode at {}", db_path.display());

        Ok(Self {
            conn,
            batch: Vec::with_capacity(100),
            batch_size: 100,
            last_flush: Instant::now(),
            flush_interval_secs: 2,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn flush_batch(&mut self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for record in &self.batch {
            let payload = serde_json::to_string(&record.event)?;
            tx.execute(
                "INSERT INTO ledger_events (event_type, owner, pair_key, payload, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.event.name(),
                    record.event.owner().map(|a| a.to_string()),
                    record.event.pair_key().map(|k| k.to_string()),
                    payload,
                    record.recorded_at,
                ],
            )?;
        }
        tx.commit()?;

        log::debug!("✅ Flushed {} ledger events to SQLite", self.batch.len());
        self.batch.clear();
        self.last_flush = Instant::now();
        Ok(())
    }
}

#[async_trait]
impl EventWriterBackend for SqliteEventWriter {
    async fn write(&mut self, record: &EventRecord) -> Result<(), StoreError> {
        self.batch.push(record.clone());

        if self.batch.len() >= self.batch_size
            || self.last_flush.elapsed().as_secs() >= self.flush_interval_secs
        {
            self.flush_batch()?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        self.flush_batch()
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Address, LedgerEvent, PairKey};
    use tempfile::tempdir;

    fn record(event: LedgerEvent) -> EventRecord {
        EventRecord {
            recorded_at: 1_700_000_000,
            event,
        }
    }

    #[tokio::test]
    async fn test_events_persisted_on_flush() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let mut writer = SqliteEventWriter::new(&db_path).unwrap();

        let pair_key = PairKey::new(&Address::derive("a"), &Address::derive("b"));
        writer
            .write(&record(LedgerEvent::BatchUpdated { pair_key, count: 1 }))
            .await
            .unwrap();
        writer
            .write(&record(LedgerEvent::BatchExecuted { count: 3, amount_in: 300, amount_out: 300, fee: 0 }))
            .await
            .unwrap();
        writer.flush().await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ledger_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let stored_key: String = conn
            .query_row(
                "SELECT pair_key FROM ledger_events WHERE event_type = 'BatchUpdated'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored_key, pair_key.to_string());

        let payload: String = conn
            .query_row(
                "SELECT payload FROM ledger_events WHERE event_type = 'BatchExecuted'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let parsed: LedgerEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, LedgerEvent::BatchExecuted { count: 3, amount_in: 300, amount_out: 300, fee: 0 });
    }

    #[tokio::test]
    async fn test_batch_size_triggers_flush() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let mut writer = SqliteEventWriter::new(&db_path).unwrap().with_batch_size(2);

        let owner = Address::derive("alice");
        writer.write(&record(LedgerEvent::IntentCreated { owner })).await.unwrap();
        writer.write(&record(LedgerEvent::IntentCancelled { owner })).await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let owners: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ledger_events WHERE owner = ?1",
                params![owner.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(owners, 2);
    }

    #[test]
    fn test_open_failure_names_the_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let db_path = blocker.join("events.db");

        match SqliteEventWriter::new(&db_path) {
            Err(err @ StoreError::Open { .. }) => {
                assert!(err.to_string().contains(&blocker.display().to_string()));
            }
            Err(other) => panic!("expected open error, got {}", other),
            Ok(_) => panic!("store opened under a regular file"),
        }
    }

    #[test]
    fn test_wal_enabled() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let writer = SqliteEventWriter::new(&db_path).unwrap();

        let journal_mode: String = writer
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }
}
