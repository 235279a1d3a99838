//! cli
//!
//! Command-line layer: the built-in flags every application shares, and the
//! `jobhook` binary that wraps an external command in a job.
//!
//! # Responsibilities
//!
//! - Define and parse the built-in flags ([`args`])
//! - Run a child process as the default task ([`exec`])
//! - Does NOT implement the lifecycle itself; that is [`crate::app`]
//!
//! # Usage
//!
//! ```text
//! jobhook [--notifier slack] [--config run.toml] -- ./train.sh --epochs 3
//! ```
//!
//! The job name is the file name of the command. The child inherits stdio
//! and sees `JOBHOOK_RUN_ID`, `JOBHOOK_JOB` and, when a config was loaded,
//! `JOBHOOK_CONFIG`.

pub mod args;
pub mod exec;

pub use args::{CommonArgs, NoArgs, ParsedArgs, ParsedFlags, DEFAULT_TASK};
pub use exec::{run_command, ChildEnv, CommandFailed};

use std::ffi::OsString;
use std::path::Path;

use crate::app::BasicApp;
use crate::deps::Requirements;

/// Command name in usage messages, and the job name when no command follows `--`.
pub const BINARY_NAME: &str = "jobhook";

/// Build the runner application for the `jobhook` binary, reporting
/// notifications under `job`.
pub fn runner(job: &str) -> BasicApp {
    BasicApp::new(BINARY_NAME)
        .job_name(job)
        .about("Run a command as a job with lifecycle notifications")
        .main(Requirements::any(), |ctx| {
            let env = ChildEnv {
                run_id: Some(ctx.run_info().run_id.to_string()),
                job: Some(ctx.run_info().job.as_str()),
                config: ctx.config(),
            };
            run_command(&ctx.args()[1..], &env)
        })
}

/// Job name for a command line: the file name of the first word after `--`.
pub fn job_name(argv: &[OsString]) -> String {
    argv.iter()
        .skip_while(|arg| arg.as_os_str() != "--")
        .nth(1)
        .and_then(|program| Path::new(program).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| BINARY_NAME.to_string())
}

/// Run the `jobhook` binary with the process arguments.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> ! {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let job = job_name(&argv);
    runner(&job).exit_from(argv)
}
