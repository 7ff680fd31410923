use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Error raised by a notifier's transport. Missing configuration is not
/// an error; it degrades to a logged message.
#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("invalid email message: {0}")]
    Message(String),

    #[error("smtp transport error: {0}")]
    Transport(String),
}

/// Best-effort side channel invoked when an instrumented call fails and
/// notification was requested. Implementations must never reach back
/// into the caller's control flow; the wrappers dispatch on a detached
/// task and log delivery failures themselves.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, logger_name: &str) -> Result<(), NotifyError>;
}

/// Delivery settings for [`SmtpNotifier`], all read from the
/// environment. All four must be present or sending is disabled.
#[cfg(feature = "smtp")]
struct EmailSettings {
    user: String,
    password: String,
    to: String,
    server: String,
}

#[cfg(feature = "smtp")]
impl EmailSettings {
    fn from_env() -> Option<Self> {
        use crate::env;

        Some(Self {
            user: std::env::var(env::EMAIL_SMTP_USER_ENV).ok()?,
            password: std::env::var(env::EMAIL_SMTP_PASSWORD_ENV).ok()?,
            to: std::env::var(env::EMAIL_TO_ENV).ok()?,
            server: std::env::var(env::EMAIL_SMTP_SERVER_ENV).ok()?,
        })
    }
}

/// Sends one plain-text email per failure over an authenticated
/// STARTTLS session on the submission port, subject
/// `Error in <logger_name>`. With incomplete settings it emits a single
/// ERROR record instead and reports success.
#[cfg(feature = "smtp")]
#[derive(Clone, Default)]
pub struct SmtpNotifier;

#[cfg(feature = "smtp")]
impl SmtpNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "smtp")]
#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, message: &str, logger_name: &str) -> Result<(), NotifyError> {
        use lettre::message::header::ContentType;
        use lettre::message::Mailbox;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let settings = match EmailSettings::from_env() {
            Some(settings) => settings,
            None => {
                crate::logger::get_logger(logger_name)
                    .error(
                        "Emails cannot be sent because one or more \
                         environment variables are not set!",
                    )
                    .await;
                return Ok(());
            }
        };

        let from: Mailbox = settings
            .user
            .parse()
            .map_err(|e| NotifyError::Message(format!("sender address: {}", e)))?;
        let to: Mailbox = settings
            .to
            .parse()
            .map_err(|e| NotifyError::Message(format!("recipient address: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Error in {}", logger_name))
            .header(ContentType::TEXT_PLAIN)
            .body(message.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .credentials(Credentials::new(settings.user, settings.password))
            .build();

        transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

/// Stand-in notifier when the `smtp` feature is disabled: behaves like
/// [`SmtpNotifier`] with no settings present.
#[cfg(not(feature = "smtp"))]
#[derive(Clone, Default)]
pub struct DisabledNotifier;

#[cfg(not(feature = "smtp"))]
#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, _message: &str, logger_name: &str) -> Result<(), NotifyError> {
        crate::logger::get_logger(logger_name)
            .error(
                "Emails cannot be sent because one or more \
                 environment variables are not set!",
            )
            .await;
        Ok(())
    }
}

pub(crate) fn default_notifier() -> Arc<dyn Notifier> {
    #[cfg(feature = "smtp")]
    {
        Arc::new(SmtpNotifier::new())
    }
    #[cfg(not(feature = "smtp"))]
    {
        Arc::new(DisabledNotifier)
    }
}

/// Captures dispatches in memory; for tests. Clones share the buffer.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    dispatches: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(message, logger_name)` pairs dispatched so far.
    pub fn dispatches(&self) -> Vec<(String, String)> {
        self.dispatches
            .lock()
            .expect("memory notifier poisoned")
            .clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, message: &str, logger_name: &str) -> Result<(), NotifyError> {
        self.dispatches
            .lock()
            .expect("memory notifier poisoned")
            .push((message.to_string(), logger_name.to_string()));
        Ok(())
    }
}
