//! config
//!
//! Configuration loading.
//!
//! # Overview
//!
//! A job may be given one configuration file. It is located by a
//! [`ConfigSource`] (`PATH[:ACCESSOR]`) and loaded exactly once per run into
//! an immutable [`ConfigDict`].
//!
//! # Formats
//!
//! Chosen by extension:
//! - `.json` → JSON
//! - anything else → TOML
//!
//! # Accessor
//!
//! The accessor picks one top-level table out of the file. Without an
//! accessor the conventional `[get_config]` table is used when present,
//! otherwise the whole document.
//!
//! # Precedence
//!
//! 1. The file (through the accessor)
//! 2. `--config-override KEY=VALUE` flags, applied in order
//!
//! # Environment
//!
//! [`load_dotenv`] merges a dotenv file into the process environment so that
//! notifier credentials can live next to the config.
//!
//! # Example
//!
//! ```no_run
//! use jobhook::config::{ConfigLoader, ConfigSource};
//!
//! let source = ConfigSource::parse("configs/train.toml:small").unwrap();
//! let config = ConfigLoader::new(source)
//!     .with_overrides(["optimizer.lr=0.01"])
//!     .load()
//!     .unwrap();
//! println!("lr = {:?}", config.get("optimizer.lr"));
//! ```

mod source;
mod value;

pub use source::{ConfigSource, CONVENTIONAL_ACCESSOR};
pub use value::ConfigDict;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("config file '{path}' has no table named '{accessor}'")]
    AttributeMissing { path: PathBuf, accessor: String },

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("invalid config override: {0}")]
    InvalidOverride(String),

    #[error("config key '{key}' does not exist")]
    UnknownKey { key: String },

    #[error("failed to load env file '{path}': {message}")]
    Dotenv { path: PathBuf, message: String },
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick a format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Loads a [`ConfigDict`] from a [`ConfigSource`] and applies overrides.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source: ConfigSource,
    overrides: Vec<String>,
}

impl ConfigLoader {
    /// Create a loader for `source` with no overrides.
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            overrides: Vec::new(),
        }
    }

    /// Add `KEY=VALUE` overrides, applied in order after loading.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.overrides.extend(overrides.into_iter().map(Into::into));
        self
    }

    /// The source this loader reads.
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Read, parse, select and override.
    ///
    /// The file is read once per call. Calling `load` twice on an unchanged
    /// file yields equal values.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the file does not exist
    /// - `ReadError` / `ParseError` for unreadable or malformed files
    /// - `AttributeMissing` if the accessor names a missing table
    /// - `InvalidValue` if the selected value is not a table
    /// - `InvalidOverride` / `UnknownKey` for bad overrides
    pub fn load(&self) -> Result<ConfigDict, ConfigError> {
        let path = self.source.path();
        let contents = read_file(path)?;
        let document = parse_document(path, &contents)?;
        let selected = select(path, document, self.source.accessor())?;

        let mut config = ConfigDict::from_value(selected)?;
        for spec in &self.overrides {
            config.apply_override(spec)?;
        }
        Ok(config)
    }
}

/// Read a whole file, mapping a missing file onto `NotFound`.
fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Parse a document into JSON according to its format.
fn parse_document(path: &Path, contents: &str) -> Result<Value, ConfigError> {
    let parse_error = |message: String| ConfigError::ParseError {
        path: path.to_path_buf(),
        message,
    };

    match ConfigFormat::from_path(path) {
        ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string())),
        ConfigFormat::Toml => {
            let table: toml::Table =
                toml::from_str(contents).map_err(|e| parse_error(e.to_string()))?;
            value::toml_table_to_json(None, table).map(Value::Object)
        }
    }
}

/// Pick the accessor's table out of a document.
fn select(path: &Path, document: Value, accessor: Option<&str>) -> Result<Value, ConfigError> {
    let Value::Object(mut root) = document else {
        return Err(ConfigError::InvalidValue(format!(
            "'{}' must contain a table at the top level",
            path.display()
        )));
    };

    match accessor {
        Some(name) => match root.remove(name) {
            Some(value @ Value::Object(_)) => Ok(value),
            Some(_) => Err(ConfigError::InvalidValue(format!(
                "'{}' in '{}' is not a table",
                name,
                path.display()
            ))),
            None => Err(ConfigError::AttributeMissing {
                path: path.to_path_buf(),
                accessor: name.to_string(),
            }),
        },
        None => match root.remove(CONVENTIONAL_ACCESSOR) {
            Some(value @ Value::Object(_)) => Ok(value),
            Some(other) => {
                root.insert(CONVENTIONAL_ACCESSOR.to_string(), other);
                Ok(Value::Object(root))
            }
            None => Ok(Value::Object(root)),
        },
    }
}

/// Merge a dotenv file into the process environment.
///
/// Variables that are already set are left untouched. Returns the names of
/// the variables that were added (values are never logged).
///
/// # Errors
///
/// Returns `ConfigError::Dotenv` if the file is missing or malformed.
pub fn load_dotenv(path: &Path) -> Result<Vec<String>, ConfigError> {
    let dotenv_error = |e: dotenvy::Error| ConfigError::Dotenv {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut added = Vec::new();
    for item in dotenvy::from_path_iter(path).map_err(dotenv_error)? {
        let (key, value) = item.map_err(dotenv_error)?;
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            added.push(key);
        }
    }
    Ok(added)
}
