use crate::record::{plain, LogRecord};
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::io::Write;

/// Console implementation of [`LogSink`].
///
/// Renders one line per record to stdout: timestamp, level, logger name,
/// message, then the remaining fields as `key=value` pairs in normalized
/// order, so `referer` always ends the line.
#[derive(Clone, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

/// Render a normalized record as a single console line.
pub fn render_line(record: &LogRecord) -> String {
    let mut line = format!(
        "{} [{}] {}:",
        record.timestamp, record.level, record.logger
    );

    if let Some(message) = record.fields.get("message") {
        line.push(' ');
        line.push_str(&plain(message));
    }

    for (key, value) in &record.fields {
        if key == "message" {
            continue;
        }
        line.push_str(&format!(" {}={}", key, plain(value)));
    }

    line
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let line = render_line(record);
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldMap, Level};
    use serde_json::json;

    #[test]
    fn renders_message_first_and_referer_last() {
        let mut fields = FieldMap::new();
        fields.insert("message".to_string(), json!("hello world"));
        fields.insert("user".to_string(), json!("bob"));
        fields.insert("count".to_string(), json!(3));
        fields.insert("referer".to_string(), json!("https://example.com"));

        let record = LogRecord {
            timestamp: "2024-01-01 12:00:00".to_string(),
            level: Level::Info,
            logger: "app.web".to_string(),
            fields,
        };

        assert_eq!(
            render_line(&record),
            "2024-01-01 12:00:00 [INFO] app.web: hello world \
             user=bob count=3 referer=https://example.com"
        );
    }

    #[test]
    fn renders_without_message() {
        let mut fields = FieldMap::new();
        fields.insert("user".to_string(), json!("bob"));

        let record = LogRecord {
            timestamp: "2024-01-01 12:00:00".to_string(),
            level: Level::Error,
            logger: "app".to_string(),
            fields,
        };

        assert_eq!(
            render_line(&record),
            "2024-01-01 12:00:00 [ERROR] app: user=bob"
        );
    }
}
