//! Notification dispatch engine for host-application hook events.
//!
//! This crate provides:
//! - `TemplateStore` loading per-language subject/body templates with fallback
//! - `TemplateEngine` rendering conditional blocks and `{{key}}` placeholders
//! - `Transport` trait with an SMTP implementation over `lettre`
//! - `RetryingSender` driving send attempts under a fixed-delay retry policy
//! - `NotificationDispatcher` composing and delivering one notification per event

pub mod dispatcher;
pub mod engine;
pub mod retry;
pub mod templates;
pub mod traits;
pub mod transport;

pub use dispatcher::NotificationDispatcher;
pub use engine::TemplateEngine;
pub use retry::{RetryPolicy, RetryingSender};
pub use templates::{TemplateSet, TemplateStore};
pub use traits::{Notification, NotificationRequest, NotifyError, SendAttemptResult};
pub use transport::{SendReceipt, SmtpTransport, Transport, TransportError};
