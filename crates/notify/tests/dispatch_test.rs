//! End-to-end dispatch against stub transports: template loading, rendering,
//! retries and result reporting together.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hookmail_core::ConfigLayer;
use hookmail_notify::{
    Notification, NotificationDispatcher, NotificationRequest, SendReceipt, TemplateStore,
    Transport, TransportError,
};

/// Records every message and succeeds after `failures` failed sends.
struct StubTransport {
    failures: u32,
    calls: AtomicU32,
    sent: Mutex<Vec<Notification>>,
}

impl StubTransport {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, notification: &Notification) -> Result<SendReceipt, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(TransportError::Smtp("421 service not available".to_string()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(SendReceipt {
            message_id: format!("<stub-{call}@example.com>"),
            response: "250 2.0.0 OK".to_string(),
        })
    }
}

fn bundled_templates() -> TemplateStore {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/templates");
    TemplateStore::new(dir)
}

fn dispatcher(language: &str, attempts: &str, transport: Arc<StubTransport>) -> NotificationDispatcher {
    dispatcher_with_delay(language, attempts, "0", transport)
}

fn dispatcher_with_delay(
    language: &str,
    attempts: &str,
    delay_ms: &str,
    transport: Arc<StubTransport>,
) -> NotificationDispatcher {
    let config = ConfigLayer::from_pairs(
        "test",
        [
            ("TEMPLATE_LANGUAGE", language),
            ("RETRY_ATTEMPTS", attempts),
            ("RETRY_DELAY", delay_ms),
        ],
    )
    .finish();
    let templates = bundled_templates().load(&config.language);
    NotificationDispatcher::new(&config, templates, transport)
}

#[tokio::test]
async fn notification_event_end_to_end() {
    let transport = StubTransport::new(0);
    let dispatcher = dispatcher("en", "3", transport.clone());

    let request = NotificationRequest::new("Notification", "s1")
        .with_cwd("/x/y/myproj")
        .with_message("hello");
    let result = dispatcher.dispatch(&request).await;

    assert!(result.success);
    assert_eq!(result.attempt, 1);
    assert!(!result.message_id.unwrap_or_default().is_empty());

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[Notice] Your attention needed @myproj");
    assert!(sent[0].body.contains("hello"));
    assert!(sent[0].body.contains("s1"));
    assert!(sent[0].body.contains("/x/y/myproj"));
}

#[tokio::test]
async fn recovered_send_reports_attempt_count() {
    let transport = StubTransport::new(2);
    let dispatcher = dispatcher("en", "3", transport.clone());

    let result = dispatcher
        .dispatch(&NotificationRequest::new("Stop", "s2"))
        .await;
    assert!(result.success);
    assert_eq!(result.attempt, 3);
    assert_eq!(result.message_id.as_deref(), Some("<stub-3@example.com>"));
}

#[tokio::test]
async fn exhausted_send_reports_failure() {
    let transport = StubTransport::new(2);
    let dispatcher = dispatcher("en", "2", transport.clone());

    let result = dispatcher
        .dispatch(&NotificationRequest::new("Stop", "s3"))
        .await;
    assert!(!result.success);
    assert_eq!(result.attempt, 2);
    let error = result.error.unwrap();
    assert!(error.contains("2 attempts"), "got: {error}");
    assert!(error.contains("421 service not available"), "got: {error}");
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_language_uses_english_files() {
    let transport = StubTransport::new(0);
    let dispatcher = dispatcher("xx-YY", "1", transport.clone());

    dispatcher
        .dispatch(&NotificationRequest::new("SubagentStop", "s4").with_details("3 files changed"))
        .await;

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "[Notice] Subtask completed");
    assert!(sent[0].body.ends_with("Details:\n3 files changed"));
}

#[tokio::test]
async fn localized_templates_are_used() {
    let transport = StubTransport::new(0);
    let dispatcher = dispatcher("zh-CN", "1", transport.clone());

    dispatcher
        .dispatch(&NotificationRequest::new("Stop", "s5").with_cwd("/srv/app"))
        .await;

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "[Notice] 任务已完成 @app");
}

#[tokio::test]
async fn concurrent_dispatches_do_not_mix_payloads() {
    let transport = StubTransport::new(0);
    let dispatcher = Arc::new(dispatcher("en", "1", transport.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let request = NotificationRequest::new("Notification", format!("session-{i}"))
                    .with_message(format!("message-{i}"));
                dispatcher.dispatch(&request).await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 8);
    for n in sent.iter() {
        let i = n
            .body
            .split("message-")
            .nth(1)
            .and_then(|rest| rest.chars().next())
            .unwrap();
        assert!(n.body.contains(&format!("session-{i}")), "mixed payload: {}", n.body);
    }
}

#[tokio::test]
async fn localized_templates_work_without_template_directory() {
    let missing = tempfile::tempdir().unwrap().path().join("templates");
    let config = ConfigLayer::from_pairs("test", [("TEMPLATE_LANGUAGE", "zh-CN")]).finish();
    let transport = StubTransport::new(0);
    let dispatcher = NotificationDispatcher::new(
        &config,
        TemplateStore::new(missing).load(&config.language),
        transport.clone(),
    );

    dispatcher
        .dispatch(&NotificationRequest::new("Stop", "s6").with_cwd("/srv/app"))
        .await;

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "[Notice] 任务已完成 @app");
}

#[tokio::test(start_paused = true)]
async fn retry_delay_does_not_hold_up_other_dispatches() {
    const DELAY: Duration = Duration::from_secs(60);

    let failing = StubTransport::new(u32::MAX);
    let slow = Arc::new(dispatcher_with_delay("en", "2", "60000", failing.clone()));
    let healthy = dispatcher("en", "1", StubTransport::new(0));

    let clock = tokio::time::Instant::now();
    let wall = std::time::Instant::now();
    let slow_handle = {
        let slow = slow.clone();
        tokio::spawn(async move { slow.dispatch(&NotificationRequest::new("Stop", "slow")).await })
    };
    // Let the failing dispatch make its first attempt and start waiting.
    while failing.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let result = healthy.dispatch(&NotificationRequest::new("Stop", "fast")).await;
    assert!(result.success);
    assert!(!slow_handle.is_finished());
    assert!(clock.elapsed() < DELAY);
    assert!(wall.elapsed() < Duration::from_secs(5));

    let slow_result = slow_handle.await.unwrap();
    assert!(!slow_result.success);
    assert_eq!(slow_result.attempt, 2);
    assert!(clock.elapsed() >= DELAY);
}
