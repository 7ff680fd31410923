//! The ordered processing chain applied to every record before it
//! reaches a sink: merge ambient call context, attach logger name and
//! level, interpolate positional arguments into the message, merge extra
//! fields, attach correlation id and sender tag, timestamp, capture a
//! stack when requested, then normalize.

use crate::context;
use crate::record::{self, FieldMap, Level, LogRecord, TIMESTAMP_FORMAT};
use chrono::Utc;
use serde_json::Value;
use std::backtrace::Backtrace;

/// A record in flight, before the processing chain has run.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub logger: String,
    pub level: Level,
    pub message: Option<String>,
    pub positional: Vec<Value>,
    pub extras: FieldMap,
    pub correlation_id: u64,
    pub sender: String,
    pub with_stack: bool,
}

/// Run the full processing chain over a draft and produce the record
/// that goes to the sink.
///
/// The message is inserted under the generic `event` key and renamed by
/// [`record::normalize`] at the end of the chain, which also pulls the
/// render-last keys to the back.
pub fn assemble(draft: RecordDraft) -> LogRecord {
    let mut fields = FieldMap::new();

    if let Some(scope) = context::current() {
        fields.insert("_function".to_string(), Value::String(scope.function));
        fields.insert("_script".to_string(), Value::String(scope.script));
    }

    if let Some(message) = draft.message {
        let message = interpolate(message, &draft.positional);
        fields.insert("event".to_string(), Value::String(message));
    }

    for (key, value) in draft.extras {
        fields.insert(key, value);
    }

    fields.insert("__id".to_string(), Value::from(draft.correlation_id));
    fields.insert("__sender".to_string(), Value::String(draft.sender));

    if draft.with_stack {
        fields.insert(
            "stack".to_string(),
            Value::String(Backtrace::force_capture().to_string()),
        );
    }

    LogRecord {
        timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        level: draft.level,
        logger: draft.logger,
        fields: record::normalize(fields),
    }
}

/// Replace successive `{}` placeholders with positional values. Extra
/// placeholders are left as-is; extra values are ignored.
fn interpolate(message: String, positional: &[Value]) -> String {
    if positional.is_empty() || !message.contains("{}") {
        return message;
    }

    let mut pieces = message.split("{}");
    let mut out = String::with_capacity(message.len());
    if let Some(first) = pieces.next() {
        out.push_str(first);
    }

    let mut values = positional.iter();
    for piece in pieces {
        match values.next() {
            Some(value) => out.push_str(&record::plain(value)),
            None => out.push_str("{}"),
        }
        out.push_str(piece);
    }
    out
}
