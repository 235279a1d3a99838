//! jobhook - Run command-line jobs with lifecycle notifications
//!
//! jobhook wraps a program's entry point so that every run announces when it
//! starts, finishes or fails, logs its flags and configuration, and receives
//! only the collaborators (config, database handle) it asked for.
//!
//! # Architecture
//!
//! The codebase is layered, leaves first:
//!
//! - [`notify`] - Notifier trait, logging and Slack backends, registry
//! - [`config`] - Config file loading, overrides, env files
//! - [`deps`] - Dependency requirements and resolution, database settings
//! - [`logging`] - Log subscriber setup and call-logging wrappers
//! - [`cli`] - Built-in flags and the `jobhook` command runner
//! - [`app`] - Application builder and lifecycle orchestrator
//!
//! # Guarantees
//!
//! 1. Setup errors end the run before the start notification
//! 2. A run that reaches its task sends exactly one finish or failure notification
//! 3. A task's error is returned unchanged after the failure notification
//! 4. A task sees a collaborator only if it declared it
//!
//! # Example
//!
//! ```no_run
//! use jobhook::app::BasicApp;
//! use jobhook::deps::Requirements;
//!
//! BasicApp::new("backup")
//!     .main(Requirements::none(), |ctx| {
//!         tracing::info!("backing up {:?}", &ctx.args()[1..]);
//!         Ok(())
//!     })
//!     .exit();
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod deps;
pub mod logging;
pub mod notify;
