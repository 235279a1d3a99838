//! notify
//!
//! Lifecycle notifications (job started, finished, failed).
//!
//! # Architecture
//!
//! The `Notifier` trait defines the interface for announcing job lifecycle
//! events. The orchestrator obtains a notifier from the [`NotifierRegistry`]
//! or from the application builder and never depends on a concrete backend.
//!
//! # Modules
//!
//! - `traits`: Core `Notifier` trait and `NotifyError`
//! - `logging`: Default notifier writing to the log sink
//! - [`slack`]: Chat-webhook notifier using the Slack Web API
//! - [`mock`]: Recording implementation for deterministic testing
//! - `registry`: Name-keyed notifier selection and plugins

mod logging;
pub mod mock;
mod registry;
pub mod slack;
mod traits;

pub use logging::LoggingNotifier;
pub use registry::{
    valid_notifier_names, NotifierEnv, NotifierFactory, NotifierProvider, NotifierRegistry,
    DEFAULT_NOTIFIER,
};
pub use slack::SlackNotifier;
pub use traits::*;
