pub mod record;
pub mod sink;
pub mod console;
pub mod memory;
pub mod context;
pub mod pipeline;
pub mod layer;
pub mod config;
pub mod logger;
pub mod instrument;
pub mod notify;
pub mod env;

pub use config::{init, FacadeConfig};
pub use instrument::{AsyncInstrumentedCall, CallArgs, SyncInstrumentedCall};
pub use logger::{get_logger, Emit, LogEvent, Logger};
pub use record::{normalize, Level, LogRecord};
