//! Retry-governed delivery.
//!
//! Each send runs through a small state machine:
//!
//! ```text
//! Attempting(n) --ok--------------------------> Done(success, attempt = n)
//! Attempting(n) --err, n < max--> Waiting(n+1) --delay--> Attempting(n+1)
//! Attempting(n) --err, n = max--------------> Done(failure, attempt = n)
//! ```
//!
//! The delay between attempts is fixed; there is no backoff.

use std::sync::Arc;
use std::time::Duration;

use hookmail_core::Configuration;
use tracing::{error, info, warn};

use crate::traits::{Notification, NotifyError, SendAttemptResult};
use crate::transport::{SendReceipt, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never below 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.retry_attempts, config.retry_delay())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendState {
    Attempting(u32),
    Waiting { next_attempt: u32 },
    Done(SendAttemptResult),
}

impl SendState {
    /// Transition out of `Attempting(attempt)` given that attempt's outcome.
    pub fn after_attempt(
        attempt: u32,
        outcome: Result<SendReceipt, TransportError>,
        policy: &RetryPolicy,
    ) -> SendState {
        match outcome {
            Ok(receipt) => SendState::Done(SendAttemptResult::delivered(receipt.message_id, attempt)),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "send attempt failed, retrying"
                );
                SendState::Waiting {
                    next_attempt: attempt + 1,
                }
            }
            Err(e) => {
                let exhausted = NotifyError::Exhausted {
                    attempts: attempt,
                    last_error: e.to_string(),
                };
                SendState::Done(SendAttemptResult::failed(attempt, &exhausted))
            }
        }
    }
}

/// Drives send attempts against a shared [`Transport`].
#[derive(Clone)]
pub struct RetryingSender {
    transport: Arc<dyn Transport>,
}

impl RetryingSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send `notification`, retrying failed attempts under `policy`.
    ///
    /// Never returns an error: exhaustion is reported in the result, with
    /// `attempt` set to the number of attempts made.
    pub async fn send_with_retry(
        &self,
        notification: &Notification,
        policy: &RetryPolicy,
    ) -> SendAttemptResult {
        let mut state = SendState::Attempting(1);
        loop {
            state = match state {
                SendState::Attempting(attempt) => {
                    let outcome = self.transport.send(notification).await;
                    SendState::after_attempt(attempt, outcome, policy)
                }
                SendState::Waiting { next_attempt } => {
                    tokio::time::sleep(policy.delay).await;
                    SendState::Attempting(next_attempt)
                }
                SendState::Done(result) => {
                    if result.success {
                        info!(attempt = result.attempt, "message delivered");
                    } else {
                        error!(
                            attempt = result.attempt,
                            error = result.error.as_deref().unwrap_or_default(),
                            "delivery failed"
                        );
                    }
                    return result;
                }
            };
        }
    }
}
