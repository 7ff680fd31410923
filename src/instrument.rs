use crate::context::{self, CallScope};
use crate::logger::{LogEvent, Logger};
use crate::record::{SENDER_ASYNC_WRAPPER, SENDER_SYNC_WRAPPER};
use serde_json::Value;
use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over `script::name`. Stable across processes, so correlation
/// ids survive restarts, unlike a runtime address.
pub fn stable_call_id(script: &str, name: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in script.bytes().chain("::".bytes()).chain(name.bytes()) {
        hash = (hash ^ byte as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a over a bare name; fallback correlation id for inline calls
/// made outside any instrumented scope.
pub fn stable_name_id(name: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in name.bytes() {
        hash = (hash ^ byte as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Identity of a wrapped call site, captured once at wrap time.
#[derive(Debug, Clone)]
pub struct CallMeta {
    /// Wrapped function's name.
    pub name: String,
    /// Base name of the defining source file.
    pub script: String,
    /// Correlation id shared by all records of this call site.
    pub call_id: u64,
}

impl CallMeta {
    /// Build from a function name and its source path (typically
    /// `file!()`). Only the file's base name is kept.
    pub fn new(name: &str, source_path: &str) -> Self {
        let script = Path::new(source_path)
            .file_name()
            .map(|base| base.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.to_string());
        let call_id = stable_call_id(&script, name);
        Self {
            name: name.to_string(),
            script,
            call_id,
        }
    }
}

/// Invocation arguments for the "Method called" log line.
///
/// Positional values are keyed `arg_0`, `arg_1`, … in order; named
/// values keep their name. Displays as `{'arg_0': 3, 'arg_1': 4}`.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    entries: Vec<(String, Value)>,
    positional: usize,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        let key = format!("arg_{}", self.positional);
        self.positional += 1;
        self.entries.push((key, value.into()));
        self
    }

    /// Append a named argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Value::String(s) => write!(f, "'{}': '{}'", key, s)?,
                other => write!(f, "'{}': {}", key, other)?,
            }
        }
        write!(f, "}}")
    }
}

/// Build [`CallArgs`] from positional values: `call_args![3, 4]`.
#[macro_export]
macro_rules! call_args {
    () => {
        $crate::instrument::CallArgs::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut args = $crate::instrument::CallArgs::new();
        $(args = args.arg($value);)+
        args
    }};
}

/// Shared logging-and-notification routine of both wrapper variants.
struct InstrumentCore {
    meta: CallMeta,
    logger: Arc<Logger>,
    sender: &'static str,
    send_email: bool,
}

impl InstrumentCore {
    fn scope(&self) -> CallScope {
        CallScope {
            function: self.meta.name.clone(),
            script: self.meta.script.clone(),
            call_id: self.meta.call_id,
        }
    }

    fn tagged(&self, event: LogEvent) -> LogEvent {
        event.sender(self.sender).correlation_id(self.meta.call_id)
    }

    fn called_event(&self, args: &CallArgs) -> LogEvent {
        let message = if args.is_empty() {
            format!("Method \"{}\" called with no arguments.", self.meta.name)
        } else {
            format!("Method called: \"{}\" with: \"{}\"", self.meta.name, args)
        };
        self.tagged(LogEvent::new(message))
    }

    fn returned_event(&self, value: &str) -> LogEvent {
        self.tagged(LogEvent::new(format!(
            "Method \"{}\" returned: \"{}\"",
            self.meta.name, value
        )))
    }

    fn failure_message(&self, error: &dyn fmt::Display) -> String {
        format!(
            "Exception occurred in method: {}, exception: {}",
            self.meta.name, error
        )
    }

    /// Hand the failure message to the notifier on a detached task, off
    /// the critical path. A captured backtrace is appended to the body.
    fn dispatch_failure(&self, message: &str) {
        let body = format!("{}\n\n\n{}", message, Backtrace::force_capture());
        let notifier = self.logger.configured().notifier();
        let logger_name = self.logger.name().to_string();
        let handle =
            Handle::try_current().unwrap_or_else(|_| self.logger.configured().runtime_handle());
        handle.spawn(async move {
            if let Err(err) = notifier.notify(&body, &logger_name).await {
                eprintln!("failure notification could not be delivered: {}", err);
            }
        });
    }
}

/// Wraps a synchronous fallible call with entry/exit/failure logging.
///
/// The correlation id is computed once at wrap time from the call site's
/// identity; every invocation of the same wrapper shares it.
pub struct SyncInstrumentedCall {
    core: InstrumentCore,
}

impl SyncInstrumentedCall {
    pub fn new(name: &str, source_path: &str, logger: Arc<Logger>) -> Self {
        Self {
            core: InstrumentCore {
                meta: CallMeta::new(name, source_path),
                logger,
                sender: SENDER_SYNC_WRAPPER,
                send_email: false,
            },
        }
    }

    /// Request a failure email when the target errors.
    pub fn send_email(mut self, enabled: bool) -> Self {
        self.core.send_email = enabled;
        self
    }

    pub fn meta(&self) -> &CallMeta {
        &self.core.meta
    }

    pub fn call_id(&self) -> u64 {
        self.core.meta.call_id
    }

    /// Invoke `target` under this wrapper.
    ///
    /// The "called" record is emitted before the target runs, the
    /// "returned" record after it completes; both share the wrapper's
    /// correlation id. Errors are logged (and optionally mailed), then
    /// returned unchanged. The bound context is released on every exit
    /// path, panics included.
    pub fn invoke<T, E, F>(&self, args: CallArgs, target: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        T: fmt::Display,
        E: fmt::Display,
    {
        let core = &self.core;
        let _guard = context::bind(core.scope());
        let _ = core.logger.info(core.called_event(&args));

        match target() {
            Ok(value) => {
                let _ = core.logger.info(core.returned_event(&value.to_string()));
                Ok(value)
            }
            Err(error) => {
                let message = core.failure_message(&error);
                if core.send_email {
                    core.dispatch_failure(&message);
                }
                let _ = core.logger.exception(core.tagged(LogEvent::new(message)));
                Err(error)
            }
        }
    }
}

/// Asynchronous variant of [`SyncInstrumentedCall`].
///
/// The wrapped future is awaited inside the task-local context scope, so
/// a cancelled invocation still releases its context and simply emits no
/// "returned" record.
pub struct AsyncInstrumentedCall {
    core: InstrumentCore,
}

impl AsyncInstrumentedCall {
    pub fn new(name: &str, source_path: &str, logger: Arc<Logger>) -> Self {
        Self {
            core: InstrumentCore {
                meta: CallMeta::new(name, source_path),
                logger,
                sender: SENDER_ASYNC_WRAPPER,
                send_email: false,
            },
        }
    }

    /// Request a failure email when the target errors.
    pub fn send_email(mut self, enabled: bool) -> Self {
        self.core.send_email = enabled;
        self
    }

    pub fn meta(&self) -> &CallMeta {
        &self.core.meta
    }

    pub fn call_id(&self) -> u64 {
        self.core.meta.call_id
    }

    /// Invoke `target` under this wrapper. Same record contract as the
    /// sync variant; the emissions are awaited, so the "called" record
    /// is sequenced strictly before the target and "returned"/"failed"
    /// strictly after it.
    pub async fn invoke<T, E, Fut>(&self, args: CallArgs, target: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: fmt::Display,
        E: fmt::Display,
    {
        let core = &self.core;
        context::scope(core.scope(), async move {
            core.logger.info(core.called_event(&args)).await;

            match target.await {
                Ok(value) => {
                    core.logger
                        .info(core.returned_event(&value.to_string()))
                        .await;
                    Ok(value)
                }
                Err(error) => {
                    let message = core.failure_message(&error);
                    if core.send_email {
                        core.dispatch_failure(&message);
                    }
                    core.logger
                        .exception(core.tagged(LogEvent::new(message)))
                        .await;
                    Err(error)
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_args_display_matches_contract() {
        let args = CallArgs::new().arg(3).arg(4);
        assert_eq!(args.to_string(), "{'arg_0': 3, 'arg_1': 4}");
    }

    #[test]
    fn call_args_mixes_named_and_positional() {
        let args = call_args![1].kwarg("user", "bob");
        assert_eq!(args.to_string(), "{'arg_0': 1, 'user': 'bob'}");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn empty_call_args() {
        let args = call_args![];
        assert!(args.is_empty());
        assert_eq!(args.to_string(), "{}");
    }

    #[test]
    fn call_id_is_stable_and_distinguishes_sites() {
        let a = CallMeta::new("add", "src/math.rs");
        let b = CallMeta::new("add", "src/math.rs");
        let c = CallMeta::new("sub", "src/math.rs");
        assert_eq!(a.call_id, b.call_id);
        assert_ne!(a.call_id, c.call_id);
        assert_eq!(a.call_id, stable_call_id("math.rs", "add"));
    }

    #[test]
    fn meta_keeps_only_the_file_base_name() {
        let meta = CallMeta::new("work", "crates/app/src/jobs.rs");
        assert_eq!(meta.script, "jobs.rs");
        assert_eq!(meta.name, "work");
    }
}
