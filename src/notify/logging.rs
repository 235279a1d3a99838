//! notify::logging
//!
//! Default notifier that writes lifecycle events to the log sink.

use async_trait::async_trait;

use super::traits::{Notifier, NotifyError};

/// Notifier that only logs through `tracing`.
///
/// This is what a run uses when no other notifier is configured. It never
/// returns an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    /// Create a new logging notifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn notify_started(&self, job: &str) -> Result<(), NotifyError> {
        tracing::info!("Job {} started.", job);
        Ok(())
    }

    async fn notify_finished(&self, job: &str) -> Result<(), NotifyError> {
        tracing::info!("Job {} finished.", job);
        Ok(())
    }

    async fn notify_failed(&self, job: &str, error: &str) -> Result<(), NotifyError> {
        tracing::error!("Job {} failed with {}", job, error);
        Ok(())
    }
}
