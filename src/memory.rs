use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// A sink that captures records into shared memory.
///
/// Useful for asserting on emitted records in tests and for measuring
/// the overhead of the facade without any real I/O. Clones share the
/// same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().expect("memory sink poisoned").clone()
    }

    /// Captured records whose logger matches `name`.
    pub fn records_for(&self, name: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.logger == name)
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().expect("memory sink poisoned").clear();
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.records
            .lock()
            .expect("memory sink poisoned")
            .push(record.clone());
        Ok(())
    }
}
