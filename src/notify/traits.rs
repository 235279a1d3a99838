//! notify::traits
//!
//! Notifier trait definition for reporting job lifecycle events.
//!
//! # Design
//!
//! The `Notifier` trait is async because some sinks involve network I/O.
//! All methods return `Result` so the orchestrator can apply its transport
//! error policy instead of the notifier deciding on its own.
//!
//! A notifier:
//! - Is created once per run and never mutated afterwards
//! - Is shared read-only across the three lifecycle calls
//! - Receives the job name and, on failure, the rendered error message
//!
//! # Example
//!
//! ```ignore
//! use jobhook::notify::{Notifier, NotifyError};
//!
//! async fn announce(notifier: &dyn Notifier) -> Result<(), NotifyError> {
//!     notifier.notify_started("nightly-train").await?;
//!     notifier.notify_finished("nightly-train").await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notifier operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// A credential (token, channel id) was neither passed nor found in the environment.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The sink rejected our credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// The sink returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// No notifier is registered under the requested name.
    #[error("unknown notifier '{name}', must be one of: {}", .valid.join(", "))]
    UnknownNotifier {
        /// Requested name
        name: String,
        /// Names known to the registry
        valid: Vec<String>,
    },
}

/// The lifecycle hook a notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// The job is about to run.
    Started,
    /// The job returned successfully.
    Finished,
    /// The job returned an error.
    Failed,
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::Started => write!(f, "start"),
            Hook::Finished => write!(f, "finish"),
            Hook::Failed => write!(f, "failure"),
        }
    }
}

/// The Notifier trait for emitting job lifecycle events.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single instance can be shared
/// behind a `Box<dyn Notifier>` for the duration of a run.
///
/// # Error Handling
///
/// Implementations report transport problems as `NotifyError` and never
/// panic. Whether such an error aborts the run is the orchestrator's call.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the notifier name (e.g., "logging", "slack").
    fn name(&self) -> &'static str;

    /// Announce that `job` has started.
    async fn notify_started(&self, job: &str) -> Result<(), NotifyError>;

    /// Announce that `job` finished successfully.
    async fn notify_finished(&self, job: &str) -> Result<(), NotifyError>;

    /// Announce that `job` failed.
    ///
    /// # Arguments
    ///
    /// * `job` - The job name
    /// * `error` - The rendered error, including its cause chain
    async fn notify_failed(&self, job: &str, error: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn notify_started(&self, job: &str) -> Result<(), NotifyError> {
        (**self).notify_started(job).await
    }

    async fn notify_finished(&self, job: &str) -> Result<(), NotifyError> {
        (**self).notify_finished(job).await
    }

    async fn notify_failed(&self, job: &str, error: &str) -> Result<(), NotifyError> {
        (**self).notify_failed(job, error).await
    }
}
