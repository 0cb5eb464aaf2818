//! SMTP transport via `lettre` with TLS support.
//!
//! One [`SmtpTransport`] is built per process and shared by every dispatch.
//! Connections come from lettre's pool; each send builds its own message, so
//! concurrent sends never share per-call state.

use hookmail_core::{ConfigError, Configuration};
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, warn};

use crate::traits::{Notification, NotifyError};

/// Per-attempt delivery failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("SMTP connection failed: {0}")]
    Connect(String),

    #[error("invalid message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),
}

/// What the server said about an accepted message.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReceipt {
    pub message_id: String,
    pub response: String,
}

/// Mail transport capability.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open (or check) the connection to the server.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Deliver one message. A failure must leave the transport usable.
    async fn send(&self, notification: &Notification) -> Result<SendReceipt, TransportError>;

    /// Whether the server is reachable and accepts our credentials.
    async fn verify(&self) -> bool {
        match self.connect().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "SMTP verification failed");
                false
            }
        }
    }
}

/// Sends notifications as plain-text emails via SMTP.
#[derive(Debug)]
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpTransport {
    /// Build the transport from resolved configuration.
    ///
    /// Fails with [`NotifyError::Config`] when a required setting is missing
    /// or an address does not parse; no network activity happens here.
    ///
    /// `secure` selects implicit TLS; otherwise STARTTLS is used when the
    /// server offers it. Server certificates are not verified.
    pub fn from_config(config: &Configuration) -> Result<Self, NotifyError> {
        config.validate()?;

        let from = parse_mailbox(&config.from)?;
        let to = config
            .recipients()
            .into_iter()
            .map(parse_mailbox)
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(ConfigError::MissingField("TO_EMAIL").into());
        }

        let tls_parameters = TlsParameters::builder(config.smtp.host.clone())
            .dangerous_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let tls = if config.smtp.secure {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let timeout = (config.timeout_ms > 0).then(|| config.timeout());
        let inner = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp.host)
            .port(config.smtp.port)
            .tls(tls)
            .credentials(Credentials::new(
                config.smtp.auth.user.clone(),
                config.smtp.auth.pass.clone(),
            ))
            .timeout(timeout)
            .build();

        Ok(Self { inner, from, to })
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    fn build_message(&self, notification: &Notification, message_id: &str) -> Result<Message, TransportError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .message_id(Some(message_id.to_string()))
            .date_now()
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN);

        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(notification.body.clone())
            .map_err(|e| TransportError::Message(e.to_string()))
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, ConfigError> {
    addr.trim()
        .parse()
        .map_err(|e: AddressError| ConfigError::InvalidAddress(format!("{addr}: {e}")))
}

#[async_trait::async_trait]
impl Transport for SmtpTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        match self.inner.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransportError::Connect(
                "server did not answer NOOP".to_string(),
            )),
            Err(e) => Err(TransportError::Connect(e.to_string())),
        }
    }

    async fn send(&self, notification: &Notification) -> Result<SendReceipt, TransportError> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.from.email.domain());
        let email = self.build_message(notification, &message_id)?;

        let response = self
            .inner
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        let text = response.message().collect::<Vec<_>>().join(" ");
        debug!(
            message_id = %message_id,
            code = %response.code(),
            recipients = self.to.len(),
            "message accepted"
        );

        Ok(SendReceipt {
            message_id,
            response: format!("{} {}", response.code(), text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookmail_core::{SmtpAuth, SmtpConfig};

    fn config() -> Configuration {
        Configuration {
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 587,
                secure: false,
                auth: SmtpAuth {
                    user: "bot@example.com".to_string(),
                    pass: "s3cret".to_string(),
                },
            },
            from: "Hook Bot <bot@example.com>".to_string(),
            to: "me@example.com".to_string(),
            subject_prefix: "[Notice]".to_string(),
            language: "en".to_string(),
            template_dir: None,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            timeout_ms: 10_000,
        }
    }

    #[test]
    fn parse_mailbox_with_display_name() {
        let mb = parse_mailbox("Alice <alice@example.com>").unwrap();
        assert_eq!(mb.email.to_string(), "alice@example.com");
    }

    #[test]
    fn parse_invalid_mailbox() {
        let err = parse_mailbox("not-an-email").unwrap_err();
        assert!(err.to_string().contains("not-an-email"), "got: {err}");
    }

    #[tokio::test]
    async fn from_config_valid() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        assert_eq!(transport.recipients().len(), 1);
    }

    #[tokio::test]
    async fn from_config_implicit_tls() {
        let mut cfg = config();
        cfg.smtp.port = 465;
        cfg.smtp.secure = true;
        assert!(SmtpTransport::from_config(&cfg).is_ok());
    }

    #[tokio::test]
    async fn from_config_multiple_recipients() {
        let mut cfg = config();
        cfg.to = "a@example.com, b@example.com".to_string();
        let transport = SmtpTransport::from_config(&cfg).unwrap();
        assert_eq!(transport.recipients().len(), 2);
    }

    #[test]
    fn from_config_missing_credentials() {
        let mut cfg = config();
        cfg.smtp.auth.user.clear();
        let err = SmtpTransport::from_config(&cfg).unwrap_err();
        assert!(
            matches!(err, NotifyError::Config(ConfigError::MissingField("SMTP_USER"))),
            "got: {err}"
        );
    }

    #[test]
    fn from_config_invalid_recipient() {
        let mut cfg = config();
        cfg.to = "me@example.com, nope".to_string();
        let err = SmtpTransport::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("invalid email address"), "got: {err}");
    }

    #[tokio::test]
    async fn build_message_sets_headers() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        let notification = Notification {
            subject: "[Notice] Task completed @proj".to_string(),
            body: "body text".to_string(),
        };
        let message = transport.build_message(&notification, "<id-1@example.com>").unwrap();

        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("<id-1@example.com>"), "got: {raw}");
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("body text"));
    }
}
