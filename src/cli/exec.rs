//! cli::exec
//!
//! Run an external command as the body of a job.

use std::process::Command;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::ConfigDict;

/// Environment variable holding the run id for the child process.
pub const RUN_ID_ENV: &str = "JOBHOOK_RUN_ID";
/// Environment variable holding the job name for the child process.
pub const JOB_ENV: &str = "JOBHOOK_JOB";
/// Environment variable holding the loaded config as compact JSON.
pub const CONFIG_ENV: &str = "JOBHOOK_CONFIG";

/// The child process ran but did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandFailed {
    #[error("'{program}' exited with status {code}")]
    Status { program: String, code: i32 },

    #[error("'{program}' was terminated by a signal")]
    Signal { program: String },
}

/// What the child process gets besides its arguments.
#[derive(Debug, Default, Clone)]
pub struct ChildEnv<'a> {
    pub run_id: Option<String>,
    pub job: Option<&'a str>,
    pub config: Option<&'a ConfigDict>,
}

/// Run `command` (program first) to completion, inheriting stdio.
///
/// # Errors
///
/// - no command given
/// - the program could not be started
/// - [`CommandFailed`] for a non-zero exit or a signal
pub fn run_command(command: &[String], env: &ChildEnv<'_>) -> Result<()> {
    let (program, rest) = command
        .split_first()
        .context("no command given (usage: jobhook [FLAGS] -- CMD [ARGS]...)")?;

    tracing::info!("Running {}", command.join(" "));

    let mut child = Command::new(program);
    child.args(rest);
    if let Some(run_id) = &env.run_id {
        child.env(RUN_ID_ENV, run_id);
    }
    if let Some(job) = env.job {
        child.env(JOB_ENV, job);
    }
    if let Some(config) = env.config {
        child.env(CONFIG_ENV, serde_json::to_string(config.as_map())?);
    }

    let status = child
        .status()
        .with_context(|| format!("failed to start '{}'", program))?;

    if status.success() {
        return Ok(());
    }
    let failure = match status.code() {
        Some(code) => CommandFailed::Status {
            program: program.clone(),
            code,
        },
        None => CommandFailed::Signal {
            program: program.clone(),
        },
    };
    Err(failure.into())
}
