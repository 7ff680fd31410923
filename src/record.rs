use serde::Serialize;
use serde_json::Value;

/// Insertion-ordered field map of one structured log event.
///
/// `serde_json` is built with `preserve_order`, so iteration follows
/// insertion order and [`normalize`] can give a stable key layout.
pub type FieldMap = serde_json::Map<String, Value>;

/// Timestamp format attached to every record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Keys that always sort after everything else when a record is rendered.
pub const RENDER_LAST: &[&str] = &["referer"];

/// Record origin tag for direct leveled calls.
pub const SENDER_INLINE: &str = "inline";
/// Record origin tag for the synchronous call wrapper.
pub const SENDER_SYNC_WRAPPER: &str = "logging_decorator";
/// Record origin tag for the asynchronous call wrapper.
pub const SENDER_ASYNC_WRAPPER: &str = "async_logging_decorator";

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Numeric rank, matching the conventional 10..50 scale.
    pub fn rank(self) -> u8 {
        match self {
            Level::Debug => 10,
            Level::Info => 20,
            Level::Warning => 30,
            Level::Error => 40,
            Level::Critical => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Parse a severity name. `FATAL` folds into `Critical` and `WARN`
    /// into `Warning`; anything unrecognized yields `None`.
    pub fn parse(value: &str) -> Option<Level> {
        match value {
            "CRITICAL" | "FATAL" => Some(Level::Critical),
            "ERROR" => Some(Level::Error),
            "WARNING" | "WARN" => Some(Level::Warning),
            "INFO" => Some(Level::Info),
            "DEBUG" => Some(Level::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully-processed structured log event, ready for a sink.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: Level,
    pub logger: String,
    pub fields: FieldMap,
}

impl LogRecord {
    /// Message text, if the record carries one.
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }

    /// Correlation id (`__id`), if the record carries one.
    pub fn correlation_id(&self) -> Option<u64> {
        self.fields.get("__id").and_then(Value::as_u64)
    }

    /// Origin tag (`__sender`), if the record carries one.
    pub fn sender(&self) -> Option<&str> {
        self.fields.get("__sender").and_then(Value::as_str)
    }
}

/// Normalize a record's field map.
///
/// A generic `event` key is renamed to `message` (dropping any stale
/// `message` value), then keys from [`RENDER_LAST`] are moved behind all
/// other keys. The sort is stable on a single boolean priority, so the
/// insertion order of ordinary keys is preserved. Pure; no other fields
/// are touched.
pub fn normalize(fields: FieldMap) -> FieldMap {
    let has_event = fields.contains_key("event");
    let mut entries: Vec<(String, Value)> = fields
        .into_iter()
        .filter(|(key, _)| !(has_event && key == "message"))
        .collect();

    for entry in entries.iter_mut() {
        if entry.0 == "event" {
            entry.0 = "message".to_string();
        }
    }

    entries.sort_by_key(|(key, _)| RENDER_LAST.contains(&key.as_str()));
    entries.into_iter().collect()
}

/// Render a JSON value the way it should appear in a log line: strings
/// bare, everything else in compact JSON form.
pub(crate) fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: &[(&str, Value)]) -> FieldMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn event_is_renamed_to_message() {
        let fields = map(&[
            ("event", json!("This is an event message")),
            ("level", json!("info")),
            ("referer", json!("https://example.com")),
            ("user", json!("test_user")),
        ]);

        let normalized = normalize(fields);

        assert!(normalized.get("event").is_none());
        assert_eq!(
            normalized.get("message"),
            Some(&json!("This is an event message"))
        );
        assert_eq!(normalized.get("user"), Some(&json!("test_user")));
    }

    #[test]
    fn referer_sorts_last() {
        let fields = map(&[
            ("referer", json!("https://example.com")),
            ("level", json!("info")),
            ("user", json!("test_user")),
        ]);

        let normalized = normalize(fields);
        let keys: Vec<&str> = normalized.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["level", "user", "referer"]);
    }

    #[test]
    fn non_special_keys_keep_insertion_order() {
        let fields = map(&[
            ("zulu", json!(1)),
            ("alpha", json!(2)),
            ("referer", json!("x")),
            ("mike", json!(3)),
        ]);

        let keys: Vec<String> = normalize(fields).keys().cloned().collect();
        assert_eq!(keys, vec!["zulu", "alpha", "mike", "referer"]);
    }

    #[test]
    fn untouched_without_event_key() {
        let fields = map(&[("level", json!("info")), ("user", json!("test_user"))]);
        let normalized = normalize(fields.clone());
        assert_eq!(normalized, fields);
    }

    #[test]
    fn empty_map_stays_empty() {
        assert!(normalize(FieldMap::new()).is_empty());
    }

    #[test]
    fn event_wins_over_stale_message() {
        let fields = map(&[("message", json!("old")), ("event", json!("new"))]);
        let normalized = normalize(fields);
        assert_eq!(normalized.get("message"), Some(&json!("new")));
        assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn level_parse_table() {
        assert_eq!(Level::parse("CRITICAL"), Some(Level::Critical));
        assert_eq!(Level::parse("FATAL"), Some(Level::Critical));
        assert_eq!(Level::parse("ERROR"), Some(Level::Error));
        assert_eq!(Level::parse("WARNING"), Some(Level::Warning));
        assert_eq!(Level::parse("WARN"), Some(Level::Warning));
        assert_eq!(Level::parse("INFO"), Some(Level::Info));
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse("verbose"), None);
        assert_eq!(Level::parse(""), None);
    }

    #[test]
    fn level_ranks() {
        assert_eq!(Level::Debug.rank(), 10);
        assert_eq!(Level::Info.rank(), 20);
        assert_eq!(Level::Warning.rank(), 30);
        assert_eq!(Level::Error.rank(), 40);
        assert_eq!(Level::Critical.rank(), 50);
    }
}
