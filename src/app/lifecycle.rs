//! app::lifecycle
//!
//! One run, start to finish.
//!
//! # Phases
//!
//! ```text
//! INIT -> PARSING_FLAGS -> LOADING_CONFIG -> RESOLVING -> INIT_CALLBACKS
//!      -> NOTIFY_START -> RUNNING_TASK -> NOTIFY_FINISH -> POST_CALLBACKS -> TERMINAL
//!                                      \-> NOTIFY_FAILURE -> TERMINAL
//! ```
//!
//! Every transition is logged at debug level. Any setup error ends the run
//! before the start notification. Once the task has run, exactly one of the
//! finish or failure notifications is sent.

use std::any::Any;
use std::ffi::OsString;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use clap::{Args, FromArgMatches};
use tokio::runtime::Runtime;

use crate::cli::args::{self, CommonArgs};
use crate::config::{self, ConfigDict, ConfigError, ConfigLoader, ConfigSource};
use crate::deps::{self, Available};
use crate::logging::{self, Verbosity};
use crate::notify::{Hook, Notifier, NotifyError};

use super::callbacks::{Callback, HookContext};
use super::task::{RunInfo, TaskContext};
use super::{App, NotifyErrorPolicy, RunError};

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    ParsingFlags,
    LoadingConfig,
    Resolving,
    InitCallbacks,
    NotifyStart,
    RunningTask,
    NotifyFinish,
    PostCallbacks,
    NotifyFailure,
    Terminal,
}

impl Phase {
    /// Upper-case phase name as it appears in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::ParsingFlags => "PARSING_FLAGS",
            Phase::LoadingConfig => "LOADING_CONFIG",
            Phase::Resolving => "RESOLVING",
            Phase::InitCallbacks => "INIT_CALLBACKS",
            Phase::NotifyStart => "NOTIFY_START",
            Phase::RunningTask => "RUNNING_TASK",
            Phase::NotifyFinish => "NOTIFY_FINISH",
            Phase::PostCallbacks => "POST_CALLBACKS",
            Phase::NotifyFailure => "NOTIFY_FAILURE",
            Phase::Terminal => "TERMINAL",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Default)]
struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    fn advance(&mut self, next: Phase) {
        tracing::debug!("Phase {} -> {}", self.current, next);
        self.current = next;
    }
}

impl<A, D> App<A, D>
where
    A: Args + FromArgMatches,
{
    /// Run with the process arguments.
    pub fn run(self) -> Result<(), RunError> {
        self.run_from(std::env::args_os())
    }

    /// Run with explicit arguments, program name first.
    ///
    /// # Errors
    ///
    /// Setup problems are returned before the start notification. A task
    /// error is returned as [`RunError::Task`] after the failure
    /// notification, with the original error as its source.
    ///
    /// # Panics
    ///
    /// A panicking task is reported through the failure notification and
    /// then resumes unwinding. Calling this from inside a tokio runtime
    /// panics, since notifications are driven on a runtime owned by the run.
    pub fn run_from<I, T>(self, argv: I) -> Result<(), RunError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let App {
            name,
            job_name,
            about,
            notifier,
            registry,
            notifier_env,
            config_file,
            dotenv,
            db,
            notify_errors,
            tasks,
            init_callbacks,
            post_callbacks,
            install_tracing,
        } = self;
        let mut tracker = PhaseTracker::default();

        tracker.advance(Phase::ParsingFlags);
        let parsed = args::parse_from::<A, _, _>(&name, about.as_deref(), argv)?;

        // The env file may set RUST_LOG, so it is merged before the subscriber.
        tracker.advance(Phase::LoadingConfig);
        let env_file = parsed.common.dotenv.as_deref().or(dotenv.as_deref());
        let env_added = env_file.map(config::load_dotenv).transpose()?;
        if install_tracing {
            logging::init_tracing(Verbosity::from_flags(
                parsed.common.quiet,
                parsed.common.debug,
            ));
        }
        if let (Some(path), Some(added)) = (env_file, &env_added) {
            tracing::debug!("Loaded {} variables from {}", added.len(), path.display());
        }
        let config = load_config(config_file.as_deref(), &parsed.common)?;

        tracker.advance(Phase::Resolving);
        let task_name = parsed.common.task.as_str();
        let task = tasks.get(task_name).ok_or_else(|| RunError::UnknownTask {
            name: task_name.to_string(),
            registered: tasks.keys().cloned().collect(),
        })?;
        let db = db.open(config.as_ref())?;
        let injected = deps::resolve(
            task_name,
            &task.requirements,
            Available {
                config: config.as_ref(),
                db: db.as_ref(),
            },
        )?;
        let notifier = notifier
            .build(parsed.common.notifier.as_deref(), &registry, &notifier_env)
            .map_err(RunError::NotifierSetup)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RunError::Runtime)?;
        let run = RunInfo::new(job_name.as_deref().unwrap_or(&name), task_name);
        tracing::debug!(
            run_id = %run.run_id,
            job = %run.job,
            notifier = notifier.name(),
            "Resolved run"
        );

        tracker.advance(Phase::InitCallbacks);
        let hook_ctx = HookContext {
            run: &run,
            notifier: notifier.name(),
            flags: &parsed.flags,
            args: &parsed.app,
            config: config.as_ref(),
            db: db.as_ref(),
        };
        run_callbacks(&init_callbacks, &hook_ctx, Phase::InitCallbacks)?;

        tracker.advance(Phase::NotifyStart);
        deliver(
            &runtime,
            notify_errors,
            Hook::Started,
            notifier.notify_started(&run.job),
        )?;

        tracker.advance(Phase::RunningTask);
        let ctx = TaskContext {
            argv: &parsed.argv,
            flags: &parsed.app,
            injected,
            run: &run,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (task.func)(&ctx)));

        match outcome {
            Ok(Ok(())) => {
                tracker.advance(Phase::NotifyFinish);
                deliver(
                    &runtime,
                    notify_errors,
                    Hook::Finished,
                    notifier.notify_finished(&run.job),
                )?;

                tracker.advance(Phase::PostCallbacks);
                run_callbacks(&post_callbacks, &hook_ctx, Phase::PostCallbacks)?;

                tracker.advance(Phase::Terminal);
                tracing::debug!(
                    elapsed_ms = run.elapsed().num_milliseconds(),
                    "Run complete"
                );
                Ok(())
            }
            Ok(Err(source)) => {
                tracker.advance(Phase::NotifyFailure);
                report_failure(&runtime, notifier.as_ref(), &run.job, &format!("{:#}", source));
                tracker.advance(Phase::Terminal);
                Err(RunError::Task {
                    name: task_name.to_string(),
                    source,
                })
            }
            Err(payload) => {
                tracker.advance(Phase::NotifyFailure);
                let message = format!("panicked: {}", panic_message(payload.as_ref()));
                report_failure(&runtime, notifier.as_ref(), &run.job, &message);
                tracker.advance(Phase::Terminal);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Run with the process arguments and exit the process.
    ///
    /// Usage errors, `--help` and `--version` are printed by clap with its
    /// own exit code. Any other error prints its cause chain and exits 1.
    pub fn exit(self) -> ! {
        self.exit_from(std::env::args_os())
    }

    /// Like [`App::exit`] with explicit arguments.
    pub fn exit_from<I, T>(self, argv: I) -> !
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.run_from(argv) {
            Ok(()) => std::process::exit(0),
            Err(RunError::Cli(e)) => e.exit(),
            Err(e) => {
                let code = e.exit_code();
                eprintln!("error: {:#}", anyhow::Error::new(e));
                std::process::exit(code)
            }
        }
    }
}

/// Load the config named on the command line, falling back to the
/// application default.
fn load_config(
    default_source: Option<&str>,
    common: &CommonArgs,
) -> Result<Option<ConfigDict>, ConfigError> {
    match common.config.as_deref().or(default_source) {
        Some(spec) => {
            let source = ConfigSource::parse(spec)?;
            tracing::debug!("Loading config from {}", source);
            let config = ConfigLoader::new(source)
                .with_overrides(common.config_overrides.iter().cloned())
                .load()?;
            Ok(Some(config))
        }
        None if !common.config_overrides.is_empty() => Err(ConfigError::InvalidOverride(
            "overrides given but no config file (--config)".into(),
        )),
        None => Ok(None),
    }
}

fn run_callbacks<A, D>(
    callbacks: &[Callback<A, D>],
    ctx: &HookContext<'_, A, D>,
    phase: Phase,
) -> Result<(), RunError> {
    for callback in callbacks {
        tracing::debug!("Running callback {}", callback.name());
        callback.call(ctx).map_err(|source| RunError::Callback {
            name: callback.name().to_string(),
            phase,
            source,
        })?;
    }
    Ok(())
}

/// Drive a start or finish notification and apply the error policy.
fn deliver<F>(
    runtime: &Runtime,
    policy: NotifyErrorPolicy,
    hook: Hook,
    notification: F,
) -> Result<(), RunError>
where
    F: Future<Output = Result<(), NotifyError>>,
{
    match runtime.block_on(notification) {
        Ok(()) => Ok(()),
        Err(source) => match policy {
            NotifyErrorPolicy::FailFast => Err(RunError::Notify { hook, source }),
            NotifyErrorPolicy::Log => {
                tracing::warn!("{} notification failed, continuing: {}", hook, source);
                Ok(())
            }
        },
    }
}

/// Send the failure notification. Its own errors never replace the task's.
fn report_failure(runtime: &Runtime, notifier: &dyn Notifier, job: &str, message: &str) {
    if let Err(e) = runtime.block_on(notifier.notify_failed(job, message)) {
        tracing::warn!("failure notification could not be sent: {}", e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
