//! app::callbacks
//!
//! Hooks that run around the task.
//!
//! Init callbacks run after dependencies are resolved and before the start
//! notification. Post callbacks run after the finish notification, and only
//! when the task succeeded. An error from any callback fails the run.

use crate::cli::args::ParsedFlags;
use crate::config::ConfigDict;

use super::task::RunInfo;

/// What a callback can see.
pub struct HookContext<'a, A, D> {
    /// Identity of the current run
    pub run: &'a RunInfo,
    /// Name of the active notifier
    pub notifier: &'a str,
    /// Raw values of every flag
    pub flags: &'a ParsedFlags,
    /// The application's typed flags
    pub args: &'a A,
    /// Loaded config, whether or not the task asked for it
    pub config: Option<&'a ConfigDict>,
    /// Database handle, whether or not the task asked for it
    pub db: Option<&'a D>,
}

type CallbackFn<A, D> = Box<dyn Fn(&HookContext<'_, A, D>) -> anyhow::Result<()>>;

/// A named hook.
pub struct Callback<A, D> {
    name: String,
    func: CallbackFn<A, D>,
}

impl<A, D> Callback<A, D> {
    /// Wrap `func` under `name`; the name appears in errors.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&HookContext<'_, A, D>) -> anyhow::Result<()> + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Callback name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, ctx: &HookContext<'_, A, D>) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}

impl<A, D> std::fmt::Debug for Callback<A, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback").field("name", &self.name).finish()
    }
}

/// Log every flag and its value.
pub fn log_flags<A, D>() -> Callback<A, D> {
    Callback::new("log_flags", |ctx: &HookContext<'_, A, D>| {
        let rendered = serde_json::to_string_pretty(&ctx.flags.to_json())?;
        tracing::info!("{}", "-".repeat(50));
        tracing::info!("Flags: {}", rendered);
        Ok(())
    })
}

/// Log the loaded config and its fingerprint.
pub fn log_config<A, D>() -> Callback<A, D> {
    Callback::new("log_config", |ctx: &HookContext<'_, A, D>| {
        match ctx.config {
            Some(config) => {
                tracing::info!("{}", "-".repeat(50));
                tracing::info!(
                    "Config ({}): {}",
                    &config.fingerprint()[..12],
                    config.to_pretty_json()
                );
            }
            None => tracing::debug!("No config loaded"),
        }
        Ok(())
    })
}

/// The callbacks installed on a new application before `NOTIFY_START`.
pub fn default_init_callbacks<A, D>() -> Vec<Callback<A, D>> {
    vec![log_flags(), log_config()]
}
