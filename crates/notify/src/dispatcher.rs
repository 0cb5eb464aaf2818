//! Turns hook events into delivered emails.
//!
//! The dispatcher composes subject and body from the template set and hands
//! the message to the [`RetryingSender`]. Failures never escape `dispatch`;
//! they come back as `success: false` results.

use std::sync::Arc;

use hookmail_core::Configuration;
use tracing::info;

use crate::engine::TemplateEngine;
use crate::retry::{RetryPolicy, RetryingSender};
use crate::templates::{TemplateSet, TemplateStore};
use crate::traits::{Notification, NotificationRequest, NotifyError, SendAttemptResult};
use crate::transport::{SmtpTransport, Transport};

/// Entry point for sending notifications. Cheap to share behind an `Arc`;
/// concurrent `dispatch` calls are independent.
pub struct NotificationDispatcher {
    engine: TemplateEngine,
    sender: RetryingSender,
    policy: RetryPolicy,
    subject_prefix: String,
}

impl NotificationDispatcher {
    /// Create a dispatcher over an existing transport.
    pub fn new(config: &Configuration, templates: TemplateSet, transport: Arc<dyn Transport>) -> Self {
        Self {
            engine: TemplateEngine::new(Arc::new(templates)),
            sender: RetryingSender::new(transport),
            policy: RetryPolicy::from_config(config),
            subject_prefix: config.subject_prefix.trim().to_string(),
        }
    }

    /// Build the SMTP transport and load templates for the configured language.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] if a required setting is missing.
    pub fn from_config(config: &Configuration, store: &TemplateStore) -> Result<Self, NotifyError> {
        let transport = SmtpTransport::from_config(config)?;
        let templates = store.load(&config.language);
        Ok(Self::new(config, templates, Arc::new(transport)))
    }

    /// Build the message for a request without sending it.
    pub fn compose(&self, request: &NotificationRequest) -> Notification {
        let subject = self
            .engine
            .build_subject(&request.event_type, request.cwd.as_deref());
        Notification {
            subject: self.prefixed(&subject),
            body: self.engine.build_body(request),
        }
    }

    /// Compose and deliver a notification for one event.
    pub async fn dispatch(&self, request: &NotificationRequest) -> SendAttemptResult {
        info!(
            event_type = %request.event_type,
            session_id = %request.session_id,
            "dispatching notification"
        );
        let notification = self.compose(request);
        let result = self.sender.send_with_retry(&notification, &self.policy).await;
        info!(
            event_type = %request.event_type,
            session_id = %request.session_id,
            success = result.success,
            attempt = result.attempt,
            "dispatch finished"
        );
        result
    }

    /// Send a free-form subject and body through the same retry pipeline.
    pub async fn send_custom(&self, subject: &str, body: &str) -> SendAttemptResult {
        info!(subject, "sending custom email");
        let notification = Notification {
            subject: self.prefixed(subject),
            body: body.to_string(),
        };
        self.sender.send_with_retry(&notification, &self.policy).await
    }

    /// Check connectivity with the mail server.
    pub async fn verify(&self) -> bool {
        self.sender.transport().verify().await
    }

    fn prefixed(&self, subject: &str) -> String {
        if self.subject_prefix.is_empty() {
            subject.to_string()
        } else {
            format!("{} {}", self.subject_prefix, subject)
        }
    }
}
