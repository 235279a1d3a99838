//! app
//!
//! The application builder and lifecycle orchestrator.
//!
//! # Architecture
//!
//! An [`App`] collects everything a run needs: named tasks with their
//! [`Requirements`], the notifier, a default config source, an optional
//! database handle, and init/post callbacks. [`App::run`] then walks the
//! lifecycle described in [`lifecycle`]: parse flags, load config, resolve
//! dependencies, notify start, run the task, notify finish or failure.
//!
//! # Example
//!
//! ```no_run
//! use jobhook::app::BasicApp;
//! use jobhook::deps::{Need, Requirements};
//!
//! BasicApp::new("nightly-report")
//!     .config_file("report.toml")
//!     .main(Requirements::none().config(Need::Required), |ctx| {
//!         let config = ctx.require_config()?;
//!         let days: u32 = config.get_as("window_days")?;
//!         tracing::info!("Building report over {} days", days);
//!         Ok(())
//!     })
//!     .exit();
//! ```

mod callbacks;
pub mod lifecycle;
mod task;

pub use callbacks::{default_init_callbacks, log_config, log_flags, Callback, HookContext};
pub use lifecycle::Phase;
pub use task::{RunInfo, TaskContext, TaskFn};

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::cli::args::{NoArgs, DEFAULT_TASK};
use crate::config::{ConfigDict, ConfigError};
use crate::deps::{DbError, DependencyError, MongoConfig, Requirements};
use crate::notify::{
    Hook, LoggingNotifier, Notifier, NotifierEnv, NotifierRegistry, NotifyError,
};

use task::Task;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Usage error, or `--help` / `--version`.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Db(#[from] DbError),

    /// The notifier could not be created.
    #[error("failed to set up notifier: {0}")]
    NotifierSetup(#[source] NotifyError),

    /// A start or finish notification failed under `NotifyErrorPolicy::FailFast`.
    #[error("{hook} notification failed: {source}")]
    Notify {
        hook: Hook,
        #[source]
        source: NotifyError,
    },

    #[error("unknown task '{name}', registered tasks: {}", .registered.join(", "))]
    UnknownTask {
        name: String,
        registered: Vec<String>,
    },

    #[error("callback '{name}' failed")]
    Callback {
        name: String,
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    /// The task returned an error. `source` is that error, unchanged.
    #[error("task '{name}' failed")]
    Task {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl RunError {
    /// The phase the run was in when this error ended it.
    pub fn phase(&self) -> Phase {
        match self {
            RunError::Cli(_) => Phase::ParsingFlags,
            RunError::Config(_) => Phase::LoadingConfig,
            RunError::Db(_)
            | RunError::Dependency(_)
            | RunError::NotifierSetup(_)
            | RunError::UnknownTask { .. }
            | RunError::Runtime(_) => Phase::Resolving,
            RunError::Callback { phase, .. } => *phase,
            RunError::Notify { hook, .. } => match hook {
                Hook::Started => Phase::NotifyStart,
                Hook::Finished => Phase::NotifyFinish,
                Hook::Failed => Phase::NotifyFailure,
            },
            RunError::Task { .. } => Phase::RunningTask,
        }
    }

    /// Check if the task itself failed (as opposed to setup or notification).
    pub fn is_task_failure(&self) -> bool {
        matches!(self, RunError::Task { .. })
    }

    /// Recover the task's own error, or give `self` back.
    pub fn into_task_error(self) -> Result<anyhow::Error, Self> {
        match self {
            RunError::Task { source, .. } => Ok(source),
            other => Err(other),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Cli(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// What to do when the start or finish notification cannot be delivered.
///
/// The failure notification never overrides the task's error under either
/// policy; its delivery problems are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyErrorPolicy {
    /// Abort the run with `RunError::Notify`.
    #[default]
    FailFast,
    /// Log a warning and carry on.
    Log,
}

type NotifierBuilder = Box<dyn FnOnce() -> Result<Box<dyn Notifier>, NotifyError>>;

enum NotifierChoice {
    Default,
    Named(String),
    Instance(Box<dyn Notifier>),
    Factory(NotifierBuilder),
}

impl NotifierChoice {
    /// Pick the notifier; a `--notifier` flag beats anything set in code.
    fn build(
        self,
        flag: Option<&str>,
        registry: &NotifierRegistry,
        env: &NotifierEnv,
    ) -> Result<Box<dyn Notifier>, NotifyError> {
        if let Some(name) = flag {
            return registry.create(name, env);
        }
        match self {
            NotifierChoice::Default => Ok(Box::new(LoggingNotifier::new())),
            NotifierChoice::Named(name) => registry.create(&name, env),
            NotifierChoice::Instance(notifier) => Ok(notifier),
            NotifierChoice::Factory(factory) => factory(),
        }
    }
}

type DbConnector<D> = Box<dyn FnOnce(&MongoConfig) -> anyhow::Result<D>>;

enum DbSettings {
    Given(MongoConfig),
    FromConfig(String),
}

enum DbSetup<D> {
    None,
    Handle(D),
    Connect {
        settings: DbSettings,
        connect: DbConnector<D>,
    },
}

impl<D> DbSetup<D> {
    fn open(self, config: Option<&ConfigDict>) -> Result<Option<D>, DbError> {
        let (settings, connect) = match self {
            DbSetup::None => return Ok(None),
            DbSetup::Handle(handle) => return Ok(Some(handle)),
            DbSetup::Connect { settings, connect } => (settings, connect),
        };
        let settings = match settings {
            DbSettings::Given(settings) => settings,
            DbSettings::FromConfig(key) => {
                let config = config.ok_or_else(|| {
                    DbError::InvalidConfig(format!(
                        "no config loaded to read table '{}' from",
                        key
                    ))
                })?;
                MongoConfig::from_config(config, &key)?
            }
        };
        tracing::debug!(
            "Connecting to {}/{}",
            settings.db_name,
            settings.collection
        );
        settings.connect_with(connect).map(Some)
    }
}

/// Application with no flags of its own and no database handle.
pub type BasicApp = App<NoArgs, ()>;

/// Builder for a job runner.
///
/// `A` is the application's own `clap::Args` type and `D` the database
/// handle type. Use [`BasicApp`] when neither is needed.
pub struct App<A = NoArgs, D = ()> {
    name: String,
    job_name: Option<String>,
    about: Option<String>,
    notifier: NotifierChoice,
    registry: NotifierRegistry,
    notifier_env: NotifierEnv,
    config_file: Option<String>,
    dotenv: Option<PathBuf>,
    db: DbSetup<D>,
    notify_errors: NotifyErrorPolicy,
    tasks: BTreeMap<String, Task<A, D>>,
    init_callbacks: Vec<Callback<A, D>>,
    post_callbacks: Vec<Callback<A, D>>,
    install_tracing: bool,
}

impl<A, D> std::fmt::Debug for App<A, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("job_name", &self.job_name)
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("config_file", &self.config_file)
            .field("notify_errors", &self.notify_errors)
            .field("init_callbacks", &self.init_callbacks)
            .field("post_callbacks", &self.post_callbacks)
            .finish_non_exhaustive()
    }
}

impl<A, D> App<A, D> {
    /// Create an application named `name`.
    ///
    /// The name doubles as the job name in notifications unless
    /// [`App::job_name`] sets one.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            job_name: None,
            about: None,
            notifier: NotifierChoice::Default,
            registry: NotifierRegistry::with_builtins(),
            notifier_env: NotifierEnv::default(),
            config_file: None,
            dotenv: None,
            db: DbSetup::None,
            notify_errors: NotifyErrorPolicy::default(),
            tasks: BTreeMap::new(),
            init_callbacks: default_init_callbacks(),
            post_callbacks: Vec::new(),
            install_tracing: true,
        }
    }

    /// Name reported to the notifier, when it should differ from the
    /// command name shown in usage messages.
    pub fn job_name(mut self, job: impl Into<String>) -> Self {
        self.job_name = Some(job.into());
        self
    }

    /// One-line description shown in `--help`.
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Use this notifier instance.
    pub fn notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = NotifierChoice::Instance(Box::new(notifier));
        self
    }

    /// Build the notifier lazily, after the env file has been loaded.
    pub fn notifier_with<N, F>(mut self, factory: F) -> Self
    where
        N: Notifier + 'static,
        F: FnOnce() -> Result<N, NotifyError> + 'static,
    {
        self.notifier = NotifierChoice::Factory(Box::new(move || {
            factory().map(|n| Box::new(n) as Box<dyn Notifier>)
        }));
        self
    }

    /// Use the registry entry called `name`.
    pub fn notifier_named(mut self, name: impl Into<String>) -> Self {
        self.notifier = NotifierChoice::Named(name.into());
        self
    }

    /// Replace the registry consulted for `--notifier` and [`App::notifier_named`].
    pub fn notifier_registry(mut self, registry: NotifierRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Explicit settings passed to registry factories.
    pub fn notifier_env(mut self, env: NotifierEnv) -> Self {
        self.notifier_env = env;
        self
    }

    /// Default config source (`PATH[:ACCESSOR]`); `--config` wins over it.
    pub fn config_file(mut self, spec: impl Into<String>) -> Self {
        self.config_file = Some(spec.into());
        self
    }

    /// Default env file; `--dotenv` wins over it.
    pub fn dotenv(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv = Some(path.into());
        self
    }

    /// Provide a ready database handle.
    pub fn db(mut self, handle: D) -> Self {
        self.db = DbSetup::Handle(handle);
        self
    }

    /// Connect with explicit settings when the run starts.
    pub fn mongo<F>(mut self, settings: MongoConfig, connect: F) -> Self
    where
        F: FnOnce(&MongoConfig) -> anyhow::Result<D> + 'static,
    {
        self.db = DbSetup::Connect {
            settings: DbSettings::Given(settings),
            connect: Box::new(connect),
        };
        self
    }

    /// Connect with settings read from table `key` of the loaded config.
    pub fn mongo_from_config<F>(mut self, key: impl Into<String>, connect: F) -> Self
    where
        F: FnOnce(&MongoConfig) -> anyhow::Result<D> + 'static,
    {
        self.db = DbSetup::Connect {
            settings: DbSettings::FromConfig(key.into()),
            connect: Box::new(connect),
        };
        self
    }

    /// How to treat undeliverable start/finish notifications.
    pub fn notify_errors(mut self, policy: NotifyErrorPolicy) -> Self {
        self.notify_errors = policy;
        self
    }

    /// Replace the init callbacks (default: `log_flags`, `log_config`).
    pub fn init_callbacks(mut self, callbacks: Vec<Callback<A, D>>) -> Self {
        self.init_callbacks = callbacks;
        self
    }

    /// Replace the post callbacks (default: none).
    pub fn post_callbacks(mut self, callbacks: Vec<Callback<A, D>>) -> Self {
        self.post_callbacks = callbacks;
        self
    }

    /// Whether `run` installs the stderr log subscriber (default: true).
    pub fn install_tracing(mut self, install: bool) -> Self {
        self.install_tracing = install;
        self
    }

    /// Register `func` as task `name`, replacing any earlier one.
    pub fn task<F>(mut self, name: impl Into<String>, requirements: Requirements, func: F) -> Self
    where
        F: Fn(&TaskContext<'_, A, D>) -> anyhow::Result<()> + 'static,
    {
        self.tasks.insert(
            name.into(),
            Task {
                requirements,
                func: Box::new(func),
            },
        );
        self
    }

    /// Register the default task.
    pub fn main<F>(self, requirements: Requirements, func: F) -> Self
    where
        F: Fn(&TaskContext<'_, A, D>) -> anyhow::Result<()> + 'static,
    {
        self.task(DEFAULT_TASK, requirements, func)
    }

    /// Registered task names in sorted order.
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::Need;
    use crate::logging::capture::with_captured_logs;
    use crate::notify::mock::{FailOn, MockEvent, MockNotifier};
    use std::cell::RefCell;
    use std::io::Write;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;
    use tempfile::NamedTempFile;

    fn quiet_app() -> BasicApp {
        App::new("job").install_tracing(false)
    }

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn success_fires_start_and_finish_once() {
        let mock = MockNotifier::new();
        quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job"])
            .unwrap();

        assert_eq!(
            mock.events(),
            vec![
                MockEvent::Started { job: "job".into() },
                MockEvent::Finished { job: "job".into() },
            ]
        );
        assert_eq!(mock.count(Hook::Failed), 0);
    }

    #[test]
    fn failure_fires_once_and_returns_original_error() {
        let mock = MockNotifier::new();
        let err = quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none(), |_| anyhow::bail!("disk full"))
            .run_from(["job"])
            .unwrap_err();

        assert!(err.is_task_failure());
        assert_eq!(err.phase(), Phase::RunningTask);
        assert_eq!(mock.count(Hook::Failed), 1);
        assert_eq!(mock.count(Hook::Finished), 0);
        assert_eq!(
            mock.events().last(),
            Some(&MockEvent::Failed {
                job: "job".into(),
                error: "disk full".into(),
            })
        );
        let original = err.into_task_error().unwrap();
        assert_eq!(original.to_string(), "disk full");
    }

    #[test]
    fn failure_message_includes_cause_chain() {
        let mock = MockNotifier::new();
        let _ = quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none(), |_| {
                Err(anyhow::anyhow!("connection reset").context("upload failed"))
            })
            .run_from(["job"]);

        assert!(matches!(
            mock.events().last(),
            Some(MockEvent::Failed { error, .. }) if error == "upload failed: connection reset"
        ));
    }

    #[test]
    fn default_notifier_logs_lifecycle() {
        let logs = with_captured_logs(|| {
            quiet_app()
                .main(Requirements::none(), |_| Ok(()))
                .run_from(["job"])
                .unwrap();
        });
        assert!(logs.contains("Job job started."));
        assert!(logs.contains("Job job finished."));
        assert!(logs.contains("Phase NOTIFY_START -> RUNNING_TASK"));
    }

    #[test]
    fn default_notifier_logs_failure() {
        let logs = with_captured_logs(|| {
            let _ = quiet_app()
                .main(Requirements::none(), |_| anyhow::bail!("bad input"))
                .run_from(["job"]);
        });
        assert!(logs.contains("Job job started."));
        assert!(logs.contains("Job job failed with bad input"));
        assert!(!logs.contains("Job job finished."));
    }

    #[test]
    fn task_requesting_nothing_gets_only_arguments() {
        let file = config_file("lr = 0.1\n");
        let seen = Rc::new(RefCell::new(None));
        let seen_in_task = Rc::clone(&seen);

        quiet_app()
            .config_file(file.path().to_string_lossy())
            .db(())
            .main(Requirements::none(), move |ctx| {
                *seen_in_task.borrow_mut() = Some((
                    ctx.args().to_vec(),
                    ctx.config().is_some(),
                    ctx.db().is_some(),
                ));
                Ok(())
            })
            .run_from(["job", "--", "a", "b"])
            .unwrap();

        let (args, has_config, has_db) = seen.borrow_mut().take().unwrap();
        assert_eq!(args, vec!["job", "a", "b"]);
        assert!(!has_config);
        assert!(!has_db);
    }

    #[test]
    fn task_requesting_config_receives_loaded_config() {
        let file = config_file("lr = 0.1\n[model]\nlayers = 4\n");
        let path = file.path().to_string_lossy().into_owned();
        let seen = Rc::new(RefCell::new(None));
        let seen_in_task = Rc::clone(&seen);

        quiet_app()
            .main(Requirements::none().config(Need::Required), move |ctx| {
                let layers: u32 = ctx.require_config()?.get_as("model.layers")?;
                *seen_in_task.borrow_mut() = Some(layers);
                Ok(())
            })
            .run_from([
                "job",
                "--config",
                path.as_str(),
                "--config-override",
                "model.layers=8",
            ])
            .unwrap();

        assert_eq!(*seen.borrow(), Some(8));
    }

    #[test]
    fn missing_required_config_fails_before_start() {
        let mock = MockNotifier::new();
        let err = quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none().config(Need::Required), |_| Ok(()))
            .run_from(["job"])
            .unwrap_err();

        assert!(matches!(err, RunError::Dependency(_)));
        assert_eq!(err.phase(), Phase::Resolving);
        assert!(mock.events().is_empty());
    }

    #[test]
    fn missing_config_file_fails_before_start() {
        let mock = MockNotifier::new();
        let err = quiet_app()
            .notifier(mock.clone())
            .main(Requirements::any(), |_| Ok(()))
            .run_from(["job", "--config", "/nonexistent/jobhook.toml"])
            .unwrap_err();

        assert!(matches!(err, RunError::Config(ConfigError::NotFound { .. })));
        assert!(mock.events().is_empty());
    }

    #[test]
    fn unknown_task_lists_registered() {
        let err = quiet_app()
            .main(Requirements::none(), |_| Ok(()))
            .task("eval", Requirements::none(), |_| Ok(()))
            .run_from(["job", "--task", "train"])
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "unknown task 'train', registered tasks: eval, main"
        );
    }

    #[test]
    fn named_task_uses_qualified_job_name() {
        let mock = MockNotifier::new();
        quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none(), |_| anyhow::bail!("wrong task"))
            .task("eval", Requirements::none(), |ctx| {
                assert_eq!(ctx.run_info().task, "eval");
                Ok(())
            })
            .run_from(["job", "--task", "eval"])
            .unwrap();

        assert_eq!(
            mock.events()[0],
            MockEvent::Started {
                job: "job:eval".into()
            }
        );
    }

    #[test]
    fn fail_fast_aborts_on_start_notification_error() {
        let mock = MockNotifier::new().fail_on(FailOn::Started(NotifyError::RateLimited));
        let ran = Rc::new(RefCell::new(false));
        let ran_in_task = Rc::clone(&ran);

        let err = quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none(), move |_| {
                *ran_in_task.borrow_mut() = true;
                Ok(())
            })
            .run_from(["job"])
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Notify {
                hook: Hook::Started,
                source: NotifyError::RateLimited
            }
        ));
        assert!(!*ran.borrow());
    }

    #[test]
    fn log_policy_continues_past_notification_error() {
        let mock = MockNotifier::new().fail_on(FailOn::Finished(NotifyError::RateLimited));
        let result = quiet_app()
            .notifier(mock.clone())
            .notify_errors(NotifyErrorPolicy::Log)
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job"]);

        assert!(result.is_ok());
        assert_eq!(mock.count(Hook::Finished), 1);
    }

    #[test]
    fn failure_notification_error_does_not_mask_task_error() {
        let mock = MockNotifier::new().fail_on(FailOn::Failed(NotifyError::NetworkError(
            "down".into(),
        )));
        let err = quiet_app()
            .notifier(mock.clone())
            .main(Requirements::none(), |_| anyhow::bail!("real problem"))
            .run_from(["job"])
            .unwrap_err();

        assert_eq!(
            err.into_task_error().unwrap().to_string(),
            "real problem"
        );
    }

    #[test]
    fn notifier_flag_overrides_builder_choice() {
        let mut registry = NotifierRegistry::empty();
        let flagged = MockNotifier::new();
        let registered = flagged.clone();
        registry.register("mock", move |_| Ok(Box::new(registered.clone())));

        let built_in_code = MockNotifier::new();
        quiet_app()
            .notifier(built_in_code.clone())
            .notifier_registry(registry)
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job", "--notifier", "mock"])
            .unwrap();

        assert_eq!(flagged.count(Hook::Started), 1);
        assert!(built_in_code.events().is_empty());
    }

    #[test]
    fn unknown_notifier_flag_is_setup_error() {
        let err = quiet_app()
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job", "--notifier", "pager"])
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::NotifierSetup(NotifyError::UnknownNotifier { .. })
        ));
    }

    #[test]
    fn callbacks_run_in_order_around_task() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b, c) = (Rc::clone(&order), Rc::clone(&order), Rc::clone(&order));

        quiet_app()
            .init_callbacks(vec![Callback::new("init", move |_| {
                a.borrow_mut().push("init");
                Ok(())
            })])
            .post_callbacks(vec![Callback::new("post", move |_| {
                b.borrow_mut().push("post");
                Ok(())
            })])
            .main(Requirements::none(), move |_| {
                c.borrow_mut().push("task");
                Ok(())
            })
            .run_from(["job"])
            .unwrap();

        assert_eq!(*order.borrow(), vec!["init", "task", "post"]);
    }

    #[test]
    fn post_callbacks_skipped_on_failure() {
        let ran = Rc::new(RefCell::new(false));
        let ran_in_post = Rc::clone(&ran);

        let _ = quiet_app()
            .post_callbacks(vec![Callback::new("post", move |_| {
                *ran_in_post.borrow_mut() = true;
                Ok(())
            })])
            .main(Requirements::none(), |_| anyhow::bail!("nope"))
            .run_from(["job"]);

        assert!(!*ran.borrow());
    }

    #[test]
    fn init_callback_error_stops_before_start() {
        let mock = MockNotifier::new();
        let err = quiet_app()
            .notifier(mock.clone())
            .init_callbacks(vec![Callback::new("gate", |_| anyhow::bail!("closed"))])
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job"])
            .unwrap_err();

        assert_eq!(err.phase(), Phase::InitCallbacks);
        assert_eq!(err.to_string(), "callback 'gate' failed");
        assert!(mock.events().is_empty());
    }

    #[test]
    fn default_init_callbacks_log_flags_and_config() {
        let file = config_file("batch_size = 32\n");
        let logs = with_captured_logs(|| {
            quiet_app()
                .config_file(file.path().to_string_lossy())
                .main(Requirements::none(), |_| Ok(()))
                .run_from(["job", "--debug"])
                .unwrap();
        });
        assert!(logs.contains("Flags: {"));
        assert!(logs.contains("\"debug\": \"true\""));
        assert!(logs.contains("\"batch_size\": 32"));
    }

    #[test]
    fn db_handle_from_config_table() {
        let file = config_file(
            "[mongo]\nuri = \"mongodb://localhost\"\ndb_name = \"exp\"\ncollection = \"runs\"\n",
        );
        let seen = Rc::new(RefCell::new(None));
        let seen_in_task = Rc::clone(&seen);

        App::<NoArgs, String>::new("job")
            .install_tracing(false)
            .config_file(file.path().to_string_lossy())
            .mongo_from_config("mongo", |s| Ok(format!("{}.{}", s.db_name, s.collection)))
            .main(Requirements::none().db(Need::Required), move |ctx| {
                *seen_in_task.borrow_mut() = Some(ctx.require_db()?.clone());
                Ok(())
            })
            .run_from(["job"])
            .unwrap();

        assert_eq!(seen.borrow().as_deref(), Some("exp.runs"));
    }

    #[test]
    fn db_connect_failure_is_setup_error() {
        let settings = MongoConfig::new("mongodb://localhost", "exp", "runs").unwrap();
        let err = App::<NoArgs, String>::new("job")
            .install_tracing(false)
            .mongo(settings, |_| anyhow::bail!("refused"))
            .main(Requirements::any(), |_| Ok(()))
            .run_from(["job"])
            .unwrap_err();

        assert!(matches!(err, RunError::Db(DbError::Connect { .. })));
        assert_eq!(err.phase(), Phase::Resolving);
    }

    #[test]
    fn unknown_task_does_not_open_db() {
        let settings = MongoConfig::new("mongodb://localhost", "exp", "runs").unwrap();
        let connects = Rc::new(RefCell::new(0));
        let connects_in_connector = Rc::clone(&connects);

        let err = App::<NoArgs, String>::new("job")
            .install_tracing(false)
            .mongo(settings, move |_| {
                *connects_in_connector.borrow_mut() += 1;
                Ok("handle".to_string())
            })
            .main(Requirements::any(), |_| Ok(()))
            .run_from(["job", "--task", "evall"])
            .unwrap_err();

        assert!(matches!(err, RunError::UnknownTask { .. }));
        assert_eq!(*connects.borrow(), 0);
    }

    #[test]
    fn job_name_overrides_app_name_in_notifications() {
        let mock = MockNotifier::new();
        quiet_app()
            .job_name("train.sh")
            .notifier(mock.clone())
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job"])
            .unwrap();

        assert_eq!(
            mock.events(),
            vec![
                MockEvent::Started { job: "train.sh".into() },
                MockEvent::Finished { job: "train.sh".into() },
            ]
        );
    }

    #[test]
    fn help_is_cli_error() {
        let err = quiet_app()
            .main(Requirements::none(), |_| Ok(()))
            .run_from(["job", "--help"])
            .unwrap_err();
        assert!(matches!(err, RunError::Cli(_)));
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    #[should_panic(expected = "kaboom")]
    fn panicking_task_is_reported_then_resumed() {
        let mock = MockNotifier::new();
        let observer = mock.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            quiet_app()
                .notifier(mock)
                .main(Requirements::none(), |_| panic!("kaboom"))
                .run_from(["job"])
        }));
        assert!(matches!(
            observer.events().last(),
            Some(MockEvent::Failed { error, .. }) if error == "panicked: kaboom"
        ));
        if let Err(payload) = result {
            panic::resume_unwind(payload);
        }
    }
}
