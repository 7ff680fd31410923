use crate::config::{self, Configured};
use crate::context;
use crate::instrument::stable_name_id;
use crate::pipeline::{self, RecordDraft};
use crate::record::{FieldMap, Level, SENDER_INLINE};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context as TaskContext, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// One structured log call: message plus optional correlation id, sender
/// override, positional values and extra fields.
///
/// `&str` and `String` convert directly, so plain messages stay terse:
/// `logger.info("hello")`.
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    message: Option<String>,
    correlation_id: Option<u64>,
    sender: Option<&'static str>,
    positional: Vec<Value>,
    extras: FieldMap,
    with_stack: bool,
}

impl LogEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Explicit correlation id, overriding the ambient one.
    pub fn correlation_id(mut self, id: u64) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Override the origin tag (defaults to `inline`).
    pub fn sender(mut self, sender: &'static str) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Positional value for the next `{}` placeholder in the message.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Extra structured field attached to the record.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Capture and attach a stack trace to the record.
    pub fn with_stack(mut self) -> Self {
        self.with_stack = true;
        self
    }
}

impl From<&str> for LogEvent {
    fn from(message: &str) -> Self {
        LogEvent::new(message)
    }
}

impl From<String> for LogEvent {
    fn from(message: String) -> Self {
        LogEvent::new(message)
    }
}

/// Handle returned by every leveled call.
///
/// Inside a running runtime the emission is scheduled as a detached task
/// and the handle resolves once the record has been handed to the sink;
/// awaiting it is optional. Outside a runtime the emission has already
/// been driven to completion by the time the handle is returned.
pub enum Emit {
    Completed,
    Scheduled(JoinHandle<()>),
}

impl Emit {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Emit::Scheduled(_))
    }
}

impl Future for Emit {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        match self.get_mut() {
            Emit::Completed => Poll::Ready(()),
            Emit::Scheduled(handle) => match Pin::new(handle).poll(cx) {
                Poll::Ready(_) => Poll::Ready(()),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Per-name logging handle.
///
/// Constructed through [`get_logger`]; construction triggers the
/// idempotent process configuration. Handles for different names are
/// independent; repeated lookups of one name share a handle.
pub struct Logger {
    name: String,
    configured: Arc<Configured>,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn configured(&self) -> &Arc<Configured> {
        &self.configured
    }

    /// Emit one record at `level`.
    ///
    /// The record is fully assembled on the caller's thread (so ambient
    /// call context is captured correctly), then delivered according to
    /// the active regime: scheduled on the current runtime, or driven to
    /// completion on the facade's own runtime when none is active.
    pub fn log(&self, level: Level, event: impl Into<LogEvent>) -> Emit {
        let event = event.into();
        if level.rank() < self.configured.level().rank() {
            return Emit::Completed;
        }

        let correlation_id = event
            .correlation_id
            .or_else(|| context::current().map(|scope| scope.call_id))
            .unwrap_or_else(|| stable_name_id(&self.name));

        let record = pipeline::assemble(RecordDraft {
            logger: self.name.clone(),
            level,
            message: event.message,
            positional: event.positional,
            extras: event.extras,
            correlation_id,
            sender: event.sender.unwrap_or(SENDER_INLINE).to_string(),
            with_stack: event.with_stack,
        });

        match Handle::try_current() {
            Ok(handle) => {
                let configured = Arc::clone(&self.configured);
                Emit::Scheduled(handle.spawn(async move {
                    configured.deliver(record).await;
                }))
            }
            Err(_) => {
                self.configured.block_deliver(record);
                Emit::Completed
            }
        }
    }

    pub fn debug(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Debug, event)
    }

    pub fn info(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Info, event)
    }

    pub fn warning(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Warning, event)
    }

    pub fn error(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Error, event)
    }

    pub fn critical(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Critical, event)
    }

    /// Alias for [`Logger::critical`].
    pub fn fatal(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Critical, event)
    }

    /// Logs at ERROR severity; named for the failure path of the call
    /// wrappers.
    pub fn exception(&self, event: impl Into<LogEvent>) -> Emit {
        self.log(Level::Error, event)
    }
}

static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Logger>>>> = OnceLock::new();

/// Look up (or create) the logger handle for `name`.
///
/// Handles are process-wide singletons per name. The first call in a
/// process materializes the default configuration unless
/// [`config::init`] ran earlier.
pub fn get_logger(name: &str) -> Arc<Logger> {
    let configured = config::init_default();
    let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock().expect("logger registry poisoned");
    Arc::clone(map.entry(name.to_string()).or_insert_with(|| {
        Arc::new(Logger {
            name: name.to_string(),
            configured,
        })
    }))
}

/// Logger handle named after the calling module.
#[macro_export]
macro_rules! module_logger {
    () => {
        $crate::logger::get_logger(module_path!())
    };
}
