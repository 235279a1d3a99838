//! config::source
//!
//! Where a configuration comes from: a file path plus an optional accessor.
//!
//! # Syntax
//!
//! `PATH[:ACCESSOR]`, e.g. `configs/train.toml:small`. The accessor names a
//! top-level table inside the file. The suffix after the last `:` is only
//! treated as an accessor when it is a plain identifier, so paths such as
//! `C:\configs\train.toml` are left intact.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::ConfigError;

/// Top-level table picked when no accessor is given, if the file has one.
pub const CONVENTIONAL_ACCESSOR: &str = "get_config";

/// A parsed `PATH[:ACCESSOR]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    path: PathBuf,
    accessor: Option<String>,
}

impl ConfigSource {
    /// Create a source for a whole file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            accessor: None,
        }
    }

    /// Create a source that selects `accessor` inside the file.
    pub fn with_accessor(path: impl Into<PathBuf>, accessor: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            accessor: Some(accessor.into()),
        }
    }

    /// Parse `PATH[:ACCESSOR]`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty path.
    ///
    /// # Example
    ///
    /// ```
    /// use jobhook::config::ConfigSource;
    ///
    /// let source = ConfigSource::parse("train.toml:small").unwrap();
    /// assert_eq!(source.accessor(), Some("small"));
    /// ```
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        if let Some((path, accessor)) = spec.rsplit_once(':') {
            if !path.is_empty() && is_identifier(accessor) {
                return Ok(Self::with_accessor(path, accessor));
            }
        }

        if spec.is_empty() {
            return Err(ConfigError::InvalidValue(
                "config source path cannot be empty".to_string(),
            ));
        }
        Ok(Self::new(spec))
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The explicit accessor, if any.
    pub fn accessor(&self) -> Option<&str> {
        self.accessor.as_deref()
    }
}

impl FromStr for ConfigSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.accessor {
            Some(accessor) => write!(f, "{}:{}", self.path.display(), accessor),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
