/// Environment variable names recognized by the facade.
///
/// These are purely helpers; the config and notifier types remain
/// constructible without environment access.

/// Root severity threshold, one of
/// `CRITICAL, FATAL, ERROR, WARNING, WARN, INFO, DEBUG` (default INFO).
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// SMTP account used as the sender of failure emails.
pub const EMAIL_SMTP_USER_ENV: &str = "LOGGING_EMAIL_SMTP_USER";

/// Password for the SMTP account.
pub const EMAIL_SMTP_PASSWORD_ENV: &str = "LOGGING_EMAIL_SMTP_PASSWORD";

/// Recipient of failure emails.
pub const EMAIL_TO_ENV: &str = "LOGGING_EMAIL_TO";

/// SMTP relay host used for submission.
pub const EMAIL_SMTP_SERVER_ENV: &str = "LOGGING_EMAIL_SMTP_SERVER";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
