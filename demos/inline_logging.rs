use tracing_call_log::logger::{get_logger, LogEvent};

// Run with e.g. LOG_LEVEL=DEBUG to see the debug line as well.
fn main() {
    let logger = get_logger("demo.inline");

    let _ = logger.debug("starting up");
    let _ = logger.info(
        LogEvent::new("user {} logged in")
            .arg("bob")
            .field("referer", "https://example.com")
            .field("attempt", 1),
    );
    let _ = logger.warning(LogEvent::new("disk usage at {}%").arg(91));
    let _ = logger.error(LogEvent::new("payment declined").field("order", 4711));
}
