//! notify::mock
//!
//! Mock notifier implementation for deterministic testing.
//!
//! # Design
//!
//! The mock records every call in order and can be configured to fail a
//! specific hook. Clones share state, so a test can hand one clone to the
//! orchestrator and inspect the other afterwards.
//!
//! # Example
//!
//! ```
//! use jobhook::notify::mock::{MockEvent, MockNotifier};
//! use jobhook::notify::Notifier;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let notifier = MockNotifier::new();
//! notifier.notify_started("train").await.unwrap();
//!
//! assert_eq!(notifier.events(), vec![MockEvent::Started { job: "train".into() }]);
//! # });
//! ```

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::traits::{Hook, Notifier, NotifyError};

/// Mock notifier for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockNotifierInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockNotifierInner {
    /// Hook to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded events for verification.
    events: Vec<MockEvent>,
}

/// Configuration for which hook should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `notify_started` with the given error.
    Started(NotifyError),
    /// Fail `notify_finished` with the given error.
    Finished(NotifyError),
    /// Fail `notify_failed` with the given error.
    Failed(NotifyError),
}

impl FailOn {
    fn hook(&self) -> Hook {
        match self {
            FailOn::Started(_) => Hook::Started,
            FailOn::Finished(_) => Hook::Finished,
            FailOn::Failed(_) => Hook::Failed,
        }
    }

    fn error(&self) -> &NotifyError {
        match self {
            FailOn::Started(e) | FailOn::Finished(e) | FailOn::Failed(e) => e,
        }
    }
}

/// Recorded event for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Started { job: String },
    Finished { job: String },
    Failed { job: String, error: String },
}

impl MockEvent {
    /// The hook this event was recorded for.
    pub fn hook(&self) -> Hook {
        match self {
            MockEvent::Started { .. } => Hook::Started,
            MockEvent::Finished { .. } => Hook::Finished,
            MockEvent::Failed { .. } => Hook::Failed,
        }
    }
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on a specific hook.
    ///
    /// The call is still recorded before the error is returned.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Get all recorded events, oldest first.
    pub fn events(&self) -> Vec<MockEvent> {
        let inner = self.inner.lock().unwrap();
        inner.events.clone()
    }

    /// Count recorded events for one hook.
    pub fn count(&self, hook: Hook) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.events.iter().filter(|e| e.hook() == hook).count()
    }

    /// Clear recorded events.
    pub fn clear_events(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.clear();
    }

    /// Record an event and return the configured failure, if any.
    fn record(&self, event: MockEvent) -> Result<(), NotifyError> {
        let mut inner = self.inner.lock().unwrap();
        let hook = event.hook();
        inner.events.push(event);
        match &inner.fail_on {
            Some(fail) if fail.hook() == hook => Err(fail.error().clone()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn notify_started(&self, job: &str) -> Result<(), NotifyError> {
        self.record(MockEvent::Started {
            job: job.to_string(),
        })
    }

    async fn notify_finished(&self, job: &str) -> Result<(), NotifyError> {
        self.record(MockEvent::Finished {
            job: job.to_string(),
        })
    }

    async fn notify_failed(&self, job: &str, error: &str) -> Result<(), NotifyError> {
        self.record(MockEvent::Failed {
            job: job.to_string(),
            error: error.to_string(),
        })
    }
}
