use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Notice]";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

// ── Top-level config ──────────────────────────────────────────

/// Fully resolved configuration, built once at startup and shared read-only.
///
/// Required fields (`smtp.host`, `smtp.auth.user`, `smtp.auth.pass`, `from`,
/// `to`) may still be empty here; [`Configuration::validate`] is what enforces
/// them, right before a transport is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub smtp: SmtpConfig,
    pub from: String,
    /// One address or a comma-separated list.
    pub to: String,
    pub subject_prefix: String,
    pub language: String,
    /// Directory holding `templates.<lang>.yaml` files.
    pub template_dir: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Configuration {
    /// Check that every setting needed to talk to the SMTP server is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("SMTP_HOST", &self.smtp.host),
            ("SMTP_USER", &self.smtp.auth.user),
            ("SMTP_PASS", &self.smtp.auth.pass),
            ("FROM_EMAIL", &self.from),
            ("TO_EMAIL", &self.to),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(key));
            }
        }
        Ok(())
    }

    /// Recipient addresses split out of `to`.
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            host = %self.smtp.host,
            port = self.smtp.port,
            secure = self.smtp.secure,
            to = %self.to,
            language = %self.language,
            retry_attempts = self.retry_attempts,
            "configuration resolved"
        );
    }

    /// Return a redacted view safe to print (password hidden).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "smtp": {
                "host": self.smtp.host,
                "port": self.smtp.port,
                "secure": self.smtp.secure,
                "auth": {
                    "user": self.smtp.auth.user,
                    "pass": "***hidden***",
                },
            },
            "from": self.from,
            "to": self.to,
            "subjectPrefix": self.subject_prefix,
            "language": self.language,
            "templateDir": self.template_dir,
            "retryAttempts": self.retry_attempts,
            "retryDelayMs": self.retry_delay_ms,
            "timeoutMs": self.timeout_ms,
        })
    }
}

// ── SMTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, opportunistic STARTTLS otherwise.
    pub secure: bool,
    pub auth: SmtpAuth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpAuth {
    pub user: String,
    pub pass: String,
}
