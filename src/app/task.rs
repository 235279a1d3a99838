//! app::task
//!
//! Registered tasks and what they receive when they run.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cli::args::DEFAULT_TASK;
use crate::config::ConfigDict;
use crate::deps::{Dependency, DependencyError, Injected, Requirements};

/// Signature of a task entry point.
pub type TaskFn<A, D> = Box<dyn Fn(&TaskContext<'_, A, D>) -> anyhow::Result<()>>;

/// A task entry point together with the collaborators it asked for.
pub(crate) struct Task<A, D> {
    pub(crate) requirements: Requirements,
    pub(crate) func: TaskFn<A, D>,
}

/// Identity of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Job name used in notifications
    pub job: String,
    /// Selected task
    pub task: String,
    /// When the run was set up
    pub started_at: DateTime<Utc>,
}

impl RunInfo {
    /// Create run info for `task` of application `app`.
    ///
    /// The job name is the application name for the default task and
    /// `app:task` otherwise.
    pub fn new(app: &str, task: &str) -> Self {
        let job = if task == DEFAULT_TASK {
            app.to_string()
        } else {
            format!("{}:{}", app, task)
        };
        Self {
            run_id: Uuid::new_v4(),
            job,
            task: task.to_string(),
            started_at: Utc::now(),
        }
    }

    /// Time elapsed since `started_at`.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Everything a task entry point can see.
///
/// The positional arguments are always present. Config and database handle
/// are only present when the task asked for them and they are available.
pub struct TaskContext<'a, A, D> {
    pub(crate) argv: &'a [String],
    pub(crate) flags: &'a A,
    pub(crate) injected: Injected<'a, D>,
    pub(crate) run: &'a RunInfo,
}

impl<'a, A, D> TaskContext<'a, A, D> {
    /// Program name followed by the trailing command-line arguments.
    pub fn args(&self) -> &'a [String] {
        self.argv
    }

    /// The application's own typed flags.
    pub fn flags(&self) -> &'a A {
        self.flags
    }

    /// The loaded config, if requested and available.
    pub fn config(&self) -> Option<&'a ConfigDict> {
        self.injected.config
    }

    /// The database handle, if requested and available.
    pub fn db(&self) -> Option<&'a D> {
        self.injected.db
    }

    /// Identity of the current run.
    pub fn run_info(&self) -> &'a RunInfo {
        self.run
    }

    /// The loaded config, or an error naming the task.
    pub fn require_config(&self) -> Result<&'a ConfigDict, DependencyError> {
        self.injected.config.ok_or_else(|| DependencyError::Unavailable {
            task: self.run.task.clone(),
            dependency: Dependency::Config,
        })
    }

    /// The database handle, or an error naming the task.
    pub fn require_db(&self) -> Result<&'a D, DependencyError> {
        self.injected.db.ok_or_else(|| DependencyError::Unavailable {
            task: self.run.task.clone(),
            dependency: Dependency::Db,
        })
    }
}
