//! deps
//!
//! Dependency resolution for task entry points.
//!
//! # Design
//!
//! A task declares up front which optional collaborators it wants through
//! [`Requirements`]. At run time the orchestrator hands [`resolve`] what it
//! actually has and gets back exactly the subset the task asked for.
//!
//! | Need       | available      | unavailable                  |
//! |------------|----------------|------------------------------|
//! | `Skip`     | not passed     | not passed                   |
//! | `Optional` | passed         | not passed                   |
//! | `Required` | passed         | `DependencyError::Unavailable` |
//!
//! A required dependency that cannot be supplied stops the run before the
//! start notification is sent.

pub mod db;

pub use db::{DbError, MongoConfig};

use thiserror::Error;

use crate::config::ConfigDict;

/// Errors from dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// A task required a collaborator that the application does not provide.
    #[error("task '{task}' requires {dependency} but none is available")]
    Unavailable {
        task: String,
        dependency: Dependency,
    },
}

/// The collaborators that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Config,
    Db,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::Config => write!(f, "a config"),
            Dependency::Db => write!(f, "a database handle"),
        }
    }
}

/// How strongly a task wants a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Need {
    /// Never passed.
    #[default]
    Skip,
    /// Passed when available.
    Optional,
    /// Must be available or the run fails.
    Required,
}

/// Collaborators a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirements {
    pub config: Need,
    pub db: Need,
}

impl Requirements {
    /// Ask for nothing; the task only receives its positional arguments.
    pub fn none() -> Self {
        Self::default()
    }

    /// Take whatever is available.
    pub fn any() -> Self {
        Self {
            config: Need::Optional,
            db: Need::Optional,
        }
    }

    /// Set the config need.
    pub fn config(mut self, need: Need) -> Self {
        self.config = need;
        self
    }

    /// Set the database need.
    pub fn db(mut self, need: Need) -> Self {
        self.db = need;
        self
    }
}

/// What the orchestrator can offer.
#[derive(Debug)]
pub struct Available<'a, D> {
    pub config: Option<&'a ConfigDict>,
    pub db: Option<&'a D>,
}

// Manual impls: deriving would require `D: Clone`.
impl<D> Clone for Available<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Available<'_, D> {}

/// What a task receives.
#[derive(Debug)]
pub struct Injected<'a, D> {
    pub config: Option<&'a ConfigDict>,
    pub db: Option<&'a D>,
}

impl<D> Clone for Injected<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Injected<'_, D> {}

/// Resolve one task's requirements against what is available.
///
/// # Errors
///
/// Returns `DependencyError::Unavailable` for the first `Required`
/// collaborator that is missing (config is checked before db).
pub fn resolve<'a, D>(
    task: &str,
    requirements: &Requirements,
    available: Available<'a, D>,
) -> Result<Injected<'a, D>, DependencyError> {
    let config = pick(task, requirements.config, available.config, Dependency::Config)?;
    let db = pick(task, requirements.db, available.db, Dependency::Db)?;
    Ok(Injected { config, db })
}

fn pick<T>(
    task: &str,
    need: Need,
    value: Option<T>,
    dependency: Dependency,
) -> Result<Option<T>, DependencyError> {
    match (need, value) {
        (Need::Skip, _) => Ok(None),
        (Need::Optional, value) => Ok(value),
        (Need::Required, Some(value)) => Ok(Some(value)),
        (Need::Required, None) => Err(DependencyError::Unavailable {
            task: task.to_string(),
            dependency,
        }),
    }
}
