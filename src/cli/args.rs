//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Built-in Flags
//!
//! Every application gets these flags next to its own:
//! - `--task <NAME>`: Task to run (default `main`)
//! - `--config <PATH[:ACCESSOR]>`: Config file
//! - `--config-override <KEY=VALUE>`: Override a config value (repeatable)
//! - `--dotenv <PATH>`: Env file merged before anything else
//! - `--notifier <NAME>`: Notifier to use
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Warnings and errors only
//! - `[ARGS]...`: Trailing arguments handed to the task
//!
//! Application flags come from any `clap::Args` type and must not reuse
//! these names.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{ArgAction, ArgMatches, Args, Command, FromArgMatches};

/// Task selected when `--task` is not given.
pub const DEFAULT_TASK: &str = "main";

/// Flags shared by every application.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
#[command(about = None, long_about = None)]
pub struct CommonArgs {
    /// Name of the task to execute
    #[arg(long, value_name = "NAME", default_value = DEFAULT_TASK)]
    pub task: String,

    /// Config file, optionally selecting one table in it
    #[arg(long, value_name = "PATH[:ACCESSOR]")]
    pub config: Option<String>,

    /// Override an existing config value (repeatable)
    #[arg(long = "config-override", value_name = "KEY=VALUE")]
    pub config_overrides: Vec<String>,

    /// Load environment variables from this file first
    #[arg(long, value_name = "PATH")]
    pub dotenv: Option<PathBuf>,

    /// Notifier to use (logging, slack, or a registered plugin)
    #[arg(long, value_name = "NAME")]
    pub notifier: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Arguments handed to the task
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    pub args: Vec<String>,
}

/// Application flags for programs that define none of their own.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
#[command(about = None, long_about = None)]
pub struct NoArgs {}

/// Raw values of every flag after parsing, keyed by flag id.
///
/// This is what gets logged at startup. It includes defaults, so the log
/// shows the effective value of each flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFlags {
    values: BTreeMap<String, Vec<String>>,
}

impl ParsedFlags {
    /// Capture every non-help argument of `command` from `matches`.
    pub fn from_matches(command: &Command, matches: &ArgMatches) -> Self {
        let mut values = BTreeMap::new();
        for arg in command.get_arguments() {
            if matches!(
                arg.get_action(),
                ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
            ) {
                continue;
            }
            let id = arg.get_id().as_str();
            if let Ok(Some(raw)) = matches.try_get_raw(id) {
                let collected = raw.map(|v| v.to_string_lossy().into_owned()).collect();
                values.insert(id.to_string(), collected);
            }
        }
        Self { values }
    }

    /// Values for one flag id.
    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.values.get(id).map(Vec::as_slice)
    }

    /// Iterate over `(id, values)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of captured flags.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object with one entry per flag; single values are unwrapped.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(id, values)| {
                let value = match values.as_slice() {
                    [single] => serde_json::Value::String(single.clone()),
                    many => serde_json::Value::from(many.to_vec()),
                };
                (id.clone(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Everything the command line produced.
#[derive(Debug, Clone)]
pub struct ParsedArgs<A> {
    /// Built-in flags
    pub common: CommonArgs,
    /// Application flags
    pub app: A,
    /// Raw view of all flags
    pub flags: ParsedFlags,
    /// Program name followed by the trailing arguments
    pub argv: Vec<String>,
}

/// Build the clap command for an application with flags `A`.
///
/// `about` is applied last so doc comments on flag structs cannot replace it.
pub fn build_command<A: Args>(name: &str, about: Option<&str>) -> Command {
    let command = Command::new(name.to_string()).version(env!("CARGO_PKG_VERSION"));
    let command = CommonArgs::augment_args(A::augment_args(command));
    match about {
        Some(about) => command.about(about.to_string()),
        None => command,
    }
}

/// Parse `argv` (program name first) into built-in and application flags.
///
/// # Errors
///
/// Returns clap's error for usage problems and for `--help` / `--version`;
/// callers normally end the process with [`clap::Error::exit`].
pub fn parse_from<A, I, T>(
    name: &str,
    about: Option<&str>,
    argv: I,
) -> Result<ParsedArgs<A>, clap::Error>
where
    A: Args + FromArgMatches,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let program = argv
        .first()
        .and_then(|p| Path::new(p).file_name())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    let mut command = build_command::<A>(name, about);
    let matches = command.try_get_matches_from_mut(argv)?;

    let common = CommonArgs::from_arg_matches(&matches)?;
    let app = A::from_arg_matches(&matches)?;
    let flags = ParsedFlags::from_matches(&command, &matches);

    let mut task_argv = Vec::with_capacity(common.args.len() + 1);
    task_argv.push(program);
    task_argv.extend(common.args.iter().cloned());

    Ok(ParsedArgs {
        common,
        app,
        flags,
        argv: task_argv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[derive(Args, Debug, Clone, Default, PartialEq)]
    struct TrainArgs {
        /// Learning rate
        #[arg(long, default_value_t = 0.1)]
        lr: f64,

        /// Dry run
        #[arg(long)]
        dry_run: bool,
    }

    fn parse<A: Args + FromArgMatches>(args: &[&str]) -> Result<ParsedArgs<A>, clap::Error> {
        let mut argv = vec!["/usr/bin/train"];
        argv.extend_from_slice(args);
        parse_from::<A, _, _>("train", Some("Train a model"), argv)
    }

    #[test]
    fn defaults() {
        let parsed = parse::<NoArgs>(&[]).unwrap();
        assert_eq!(parsed.common.task, DEFAULT_TASK);
        assert!(parsed.common.config.is_none());
        assert!(parsed.common.config_overrides.is_empty());
        assert!(!parsed.common.debug);
        assert_eq!(parsed.argv, vec!["train".to_string()]);
    }

    #[test]
    fn builtin_flags() {
        let parsed = parse::<NoArgs>(&[
            "--task",
            "eval",
            "--config",
            "cfg.toml:small",
            "--config-override",
            "lr=0.5",
            "--config-override",
            "epochs=2",
            "--dotenv",
            ".env",
            "--notifier",
            "slack",
            "-q",
        ])
        .unwrap();

        assert_eq!(parsed.common.task, "eval");
        assert_eq!(parsed.common.config.as_deref(), Some("cfg.toml:small"));
        assert_eq!(parsed.common.config_overrides, vec!["lr=0.5", "epochs=2"]);
        assert_eq!(parsed.common.dotenv, Some(PathBuf::from(".env")));
        assert_eq!(parsed.common.notifier.as_deref(), Some("slack"));
        assert!(parsed.common.quiet);
    }

    #[test]
    fn application_flags_are_merged() {
        let parsed = parse::<TrainArgs>(&["--lr", "0.01", "--dry-run", "--debug"]).unwrap();
        assert_eq!(parsed.app.lr, 0.01);
        assert!(parsed.app.dry_run);
        assert!(parsed.common.debug);
    }

    #[test]
    fn trailing_args_after_separator() {
        let parsed = parse::<NoArgs>(&["--debug", "--", "make", "-j", "4"]).unwrap();
        assert_eq!(parsed.argv, vec!["train", "make", "-j", "4"]);
        assert!(parsed.common.debug);
    }

    #[test]
    fn unknown_flag_is_usage_error() {
        let err = parse::<NoArgs>(&["--nope"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn misspelled_flag_is_not_passed_to_task() {
        let err = parse::<NoArgs>(&["--notifer", "slack"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn hyphen_values_after_first_trailing_arg_are_kept() {
        let parsed = parse::<NoArgs>(&["make", "-j", "4", "--keep-going"]).unwrap();
        assert_eq!(parsed.argv, vec!["train", "make", "-j", "4", "--keep-going"]);
    }

    #[test]
    fn about_text_reaches_help() {
        let err = parse::<TrainArgs>(&["--help"]).unwrap_err();
        let help = err.to_string();
        assert!(help.contains("Train a model"), "help was: {}", help);
        assert!(!help.contains("Flags shared by every application"));
    }

    #[test]
    fn help_is_reported_as_error_kind() {
        let err = parse::<TrainArgs>(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let help = err.to_string();
        assert!(help.contains("--config-override"));
        assert!(help.contains("--lr"));
    }

    #[test]
    fn parsed_flags_capture_defaults_and_app_flags() {
        let parsed = parse::<TrainArgs>(&["--task", "eval"]).unwrap();
        let flags = &parsed.flags;

        assert_eq!(flags.get("task"), Some(&["eval".to_string()][..]));
        assert_eq!(flags.get("lr"), Some(&["0.1".to_string()][..]));
        assert_eq!(flags.get("dry_run"), Some(&["false".to_string()][..]));
        assert!(flags.get("help").is_none());
        assert!(flags.get("config").is_none());
    }

    #[test]
    fn parsed_flags_json() {
        let parsed = parse::<NoArgs>(&["--config-override", "a=1", "--config-override", "b=2"])
            .unwrap();
        let json = parsed.flags.to_json();
        assert_eq!(json["task"], "main");
        assert_eq!(json["config_overrides"], serde_json::json!(["a=1", "b=2"]));
    }
}
