use crate::console::ConsoleSink;
use crate::env::LOG_LEVEL_ENV;
use crate::layer::BridgeLayer;
use crate::notify::Notifier;
use crate::pipeline::{self, RecordDraft};
use crate::record::{FieldMap, Level, LogRecord};
use crate::sink::LogSink;
use std::sync::{Arc, Once, OnceLock};
use tokio::sync::mpsc;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::{Layer as _, SubscriberExt};
use tracing_subscriber::Registry;

/// Process-wide configuration of the logging facade.
///
/// Built explicitly once at startup (or implicitly with defaults by the
/// first [`crate::logger::get_logger`] call) and shared by reference with
/// every logger handle. Repeated [`init`] calls return the existing
/// instance, so handlers are never installed twice.
///
/// **Fields**
/// - `level`: root severity threshold, read from `LOG_LEVEL` by default.
/// - `sink`: destination for normalized records.
/// - `notifier`: failure-email side channel used by the call wrappers.
/// - `channel_buffer`: size of the bridge channel before drops.
/// - `install_global`: install the global `tracing` subscriber that
///   redirects third-party events into `sink`.
/// - `install_panic_hook`: log panics before the previous hook runs.
pub struct FacadeConfig {
    pub level: Level,
    pub sink: Arc<dyn LogSink>,
    pub notifier: Arc<dyn Notifier>,
    pub channel_buffer: usize,
    pub install_global: bool,
    pub install_panic_hook: bool,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            level: level_from_env(),
            sink: Arc::new(ConsoleSink::new()),
            notifier: crate::notify::default_notifier(),
            channel_buffer: 1024,
            install_global: true,
            install_panic_hook: true,
        }
    }
}

/// Severity threshold from the `LOG_LEVEL` environment variable.
/// Unrecognized or absent values default to `INFO`.
pub fn level_from_env() -> Level {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| Level::parse(&value))
        .unwrap_or(Level::Info)
}

/// The materialized process-wide logging state.
pub struct Configured {
    level: Level,
    sink: Arc<dyn LogSink>,
    notifier: Arc<dyn Notifier>,
    handle: tokio::runtime::Handle,
    // Owned when no runtime existed at init time; keeps the drain task
    // and blocking emission alive for the process lifetime.
    _runtime: Option<tokio::runtime::Runtime>,
}

impl Configured {
    fn build(config: FacadeConfig) -> Self {
        let (runtime, handle) = match tokio::runtime::Handle::try_current() {
            Ok(handle) => (None, handle),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .thread_name("call-log")
                    .enable_all()
                    .build()
                    .expect("build logging runtime");
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let (layer, _drain) = BridgeLayer::new(
            Arc::clone(&config.sink),
            config.channel_buffer,
            handle.clone(),
        );
        let bridge_tx = layer.sender();

        if config.install_global {
            let subscriber = Registry::default().with(layer.with_filter(targets_for(config.level)));
            // A host application may have installed its own subscriber
            // already; that is not an error for the facade.
            let _ = tracing::subscriber::set_global_default(subscriber);
        }

        if config.install_panic_hook {
            install_panic_hook(bridge_tx);
        }

        Self {
            level: config.level,
            sink: config.sink,
            notifier: config.notifier,
            handle,
            _runtime: runtime,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Runtime handle used for detached work (scheduled emission,
    /// notification dispatch) when the caller is outside a runtime.
    pub fn runtime_handle(&self) -> tokio::runtime::Handle {
        self.handle.clone()
    }

    /// The emission operation: yield once, then hand the record to the
    /// sink. Sink failures are reported to stderr, never to the caller.
    pub(crate) async fn deliver(&self, record: LogRecord) {
        tokio::task::yield_now().await;
        if let Err(e) = self.sink.send(&record).await {
            eprintln!("log sink send failed: {}", e);
        }
    }

    /// Drive one emission to completion, blocking the calling thread.
    /// Only valid outside a runtime.
    pub(crate) fn block_deliver(&self, record: LogRecord) {
        self.handle.block_on(self.deliver(record));
    }
}

/// Per-target filter: the configured level by default, background
/// runtime targets capped at WARNING, the high-volume access-log target
/// fully silenced. Server error targets stay at the default level and
/// flow into the root sink like everything else.
fn targets_for(level: Level) -> Targets {
    let default = level_filter(level);
    Targets::new()
        .with_default(default)
        .with_target("tokio", LevelFilter::WARN)
        .with_target("runtime", LevelFilter::WARN)
        .with_target("hyper", default)
        .with_target("axum", default)
        .with_target("tower_http::trace", LevelFilter::OFF)
}

fn level_filter(level: Level) -> LevelFilter {
    match level {
        Level::Debug => LevelFilter::DEBUG,
        Level::Info => LevelFilter::INFO,
        Level::Warning => LevelFilter::WARN,
        Level::Error | Level::Critical => LevelFilter::ERROR,
    }
}

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Log panics at CRITICAL through the bridge channel, then forward to
/// the previously installed hook so default crash reporting still runs.
/// The channel handoff is non-blocking and safe from any thread.
fn install_panic_hook(bridge_tx: mpsc::Sender<LogRecord>) {
    PANIC_HOOK_INSTALLED.call_once(move || {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let record = pipeline::assemble(RecordDraft {
                logger: "panic".to_string(),
                level: Level::Critical,
                message: Some(info.to_string()),
                positional: Vec::new(),
                extras: FieldMap::new(),
                correlation_id: crate::instrument::stable_name_id("panic"),
                sender: crate::record::SENDER_INLINE.to_string(),
                with_stack: false,
            });
            let _ = bridge_tx.try_send(record);
            previous(info);
        }));
    });
}

static CONFIGURED: OnceLock<Arc<Configured>> = OnceLock::new();

/// Apply a configuration, once per process. Subsequent calls (with any
/// argument) return the already-materialized state unchanged.
pub fn init(config: FacadeConfig) -> Arc<Configured> {
    Arc::clone(CONFIGURED.get_or_init(|| Arc::new(Configured::build(config))))
}

/// Configuration with environment-driven defaults; used by logger
/// construction so every handle is backed by a live configuration.
pub fn init_default() -> Arc<Configured> {
    init(FacadeConfig::default())
}

/// The current configuration, if one has been materialized.
pub fn try_current() -> Option<Arc<Configured>> {
    CONFIGURED.get().cloned()
}
