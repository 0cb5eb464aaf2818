//! Shared request/result types and the crate error taxonomy.

use hookmail_core::ConfigError;
use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("delivery failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// A composed message ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// One event to notify about, as delivered by the host application's hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Open set; unrecognized names fall back to the default templates.
    #[serde(alias = "hook_event_name", alias = "event", alias = "eventType", default = "default_event_type")]
    pub event_type: String,
    #[serde(alias = "sessionId", default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

fn default_event_type() -> String {
    "Notification".to_string()
}

impl NotificationRequest {
    pub fn new(event_type: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            session_id: session_id.into(),
            cwd: None,
            message: None,
            details: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Outcome of one dispatch, returned to the caller and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAttemptResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Attempts made, also on success.
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendAttemptResult {
    pub fn delivered(message_id: String, attempt: u32) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            attempt,
            error: None,
        }
    }

    pub fn failed(attempt: u32, error: &NotifyError) -> Self {
        Self {
            success: false,
            message_id: None,
            attempt,
            error: Some(error.to_string()),
        }
    }
}
