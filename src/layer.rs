use crate::record::{self, FieldMap, Level, LogRecord, TIMESTAMP_FORMAT};
use crate::sink::LogSink;
use chrono::Utc;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that redirects third-party `tracing`
/// events into the facade's root sink.
///
/// Events are converted into normalized [`LogRecord`]s (the event target
/// becomes the logger name) and forwarded through a bounded channel to a
/// background drain task, so sink I/O never runs on the emitting thread.
/// Level filtering is applied outside via a `Targets` filter, not
/// hardcoded here.
pub struct BridgeLayer {
    sender: mpsc::Sender<LogRecord>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into the channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl BridgeLayer {
    /// Create a new layer and spawn the drain task on `handle`.
    ///
    /// A minimal buffer size is enforced to avoid degenerate configs.
    pub fn new(
        sink: Arc<dyn LogSink>,
        buffer: usize,
        handle: tokio::runtime::Handle,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let enqueued_events_bg = Arc::clone(&enqueued_events);
        let drain = handle.spawn(async move {
            while let Some(record) = rx.recv().await {
                enqueued_events_bg.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = sink.send(&record).await {
                    eprintln!("log sink send failed: {}", e);
                }
            }
        });

        (
            Self {
                sender: tx,
                total_events,
                enqueued_events,
                dropped_events,
            },
            drain,
        )
    }

    /// A handle into the layer's channel, usable from non-async code
    /// (the panic hook goes through this).
    pub fn sender(&self) -> mpsc::Sender<LogRecord> {
        self.sender.clone()
    }
}

fn level_from_tracing(level: &tracing::Level) -> Level {
    if *level == tracing::Level::ERROR {
        Level::Error
    } else if *level == tracing::Level::WARN {
        Level::Warning
    } else if *level == tracing::Level::INFO {
        Level::Info
    } else {
        Level::Debug
    }
}

impl<S> Layer<S> for BridgeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut fields = FieldMap::new();
        let mut visitor = FieldVisitor {
            fields: &mut fields,
        };
        event.record(&mut visitor);

        let meta = event.metadata();
        let record = LogRecord {
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            level: level_from_tracing(meta.level()),
            logger: meta.target().to_string(),
            fields: record::normalize(fields),
        };

        if self.sender.try_send(record).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("log channel full, dropping log record");
        }
    }
}

use tracing::field::{Field, Visit};

/// Collects event fields into a [`FieldMap`]. The conventional `message`
/// field is stored under the generic `event` key so the normalizer can
/// give it its final name.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut FieldMap,
}

impl<'a> FieldVisitor<'a> {
    fn key(field: &Field) -> String {
        if field.name() == "message" {
            "event".to_string()
        } else {
            field.name().to_string()
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields
            .insert(Self::key(field), Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(Self::key(field), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(Self::key(field), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(Self::key(field), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(Self::key(field), Value::String(format!("{:?}", value)));
    }
}
