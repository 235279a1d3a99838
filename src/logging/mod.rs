//! logging
//!
//! Log subscriber setup and function-call logging helpers.
//!
//! # Design
//!
//! All output goes through `tracing`. A `fmt` subscriber writing to stderr is
//! installed at most once per process; `RUST_LOG` always wins over the
//! verbosity derived from flags.

mod decorators;

pub use decorators::{log_after, log_after_at, log_before, log_before_at};

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Informational output
    #[default]
    Normal,
    /// Debug output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. `quiet` wins over `debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default filter directive for this verbosity.
    pub fn directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// Installs a stderr `fmt` subscriber if one is not already active.
///
/// Honours `RUST_LOG` if it is present, otherwise falls back to the
/// verbosity's directive. Calling this function multiple times is harmless;
/// only the first call has an effect.
pub fn init_tracing(verbosity: Verbosity) {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Emit `message` at a level chosen at run time.
pub(crate) fn emit(level: Level, message: &str) {
    match level {
        Level::ERROR => tracing::error!("{}", message),
        Level::WARN => tracing::warn!("{}", message),
        Level::INFO => tracing::info!("{}", message),
        Level::DEBUG => tracing::debug!("{}", message),
        _ => tracing::trace!("{}", message),
    }
}
