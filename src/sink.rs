use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogRecord`]s produced by the facade.
///
/// Implementations render or transport normalized records to a concrete
/// output (console, in-memory capture, etc). The facade awaits `send`
/// inside its emission operation; the tracing bridge calls it from a
/// background drain task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single normalized log record to the underlying output.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted.
    /// - `Err(..)` on rendering or transport failure. Failures are
    ///   reported to stderr by the callers; they are never surfaced to
    ///   the code that emitted the log line.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records, if the sink implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
