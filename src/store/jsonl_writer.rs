use super::writer_backend::{EventRecord, EventWriterBackend, StoreError};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only JSON lines event log
pub struct JsonlEventWriter {
    file: BufWriter<File>,
    written: u64,
}

impl JsonlEventWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::open(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::open(path, e))?;
        Ok(Self {
            file: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl EventWriterBackend for JsonlEventWriter {
    async fn write(&mut self, record: &EventRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.file, "{}", json)?;
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        self.file.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
