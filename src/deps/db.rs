//! deps::db
//!
//! Connection settings for the optional database collection handle.
//!
//! The handle type itself belongs to the caller (whatever driver they use);
//! this module only carries and validates the settings and adapts the
//! caller's connector into a [`DbError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigDict;

/// Errors from database setup.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid database config: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to '{db_name}': {source}")]
    Connect {
        db_name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Where the collection lives.
///
/// # Example
///
/// ```toml
/// [mongo]
/// uri = "mongodb://localhost:27017"
/// db_name = "experiments"
/// collection = "runs"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MongoConfig {
    /// Connection string
    pub uri: String,
    /// Database name
    pub db_name: String,
    /// Collection name
    pub collection: String,
}

impl MongoConfig {
    /// Accepted connection string schemes.
    pub const VALID_SCHEMES: &'static [&'static str] = &["mongodb://", "mongodb+srv://"];

    /// Create and validate settings.
    pub fn new(
        uri: impl Into<String>,
        db_name: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, DbError> {
        let config = Self {
            uri: uri.into(),
            db_name: db_name.into(),
            collection: collection.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read settings from a table of a loaded config.
    pub fn from_config(config: &ConfigDict, key: &str) -> Result<Self, DbError> {
        let settings: Self = config
            .get_as(key)
            .map_err(|e| DbError::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), DbError> {
        if !Self::VALID_SCHEMES
            .iter()
            .any(|scheme| self.uri.starts_with(scheme))
        {
            return Err(DbError::InvalidConfig(format!(
                "uri must start with one of: {}",
                Self::VALID_SCHEMES.join(", ")
            )));
        }
        if self.db_name.trim().is_empty() {
            return Err(DbError::InvalidConfig("db_name cannot be empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(DbError::InvalidConfig("collection cannot be empty".into()));
        }
        Ok(())
    }

    /// Open a handle with the caller's connector.
    ///
    /// # Example
    ///
    /// ```
    /// use jobhook::deps::MongoConfig;
    ///
    /// let settings = MongoConfig::new("mongodb://localhost", "exp", "runs").unwrap();
    /// let handle = settings
    ///     .connect_with(|s| Ok(format!("{}/{}", s.db_name, s.collection)))
    ///     .unwrap();
    /// assert_eq!(handle, "exp/runs");
    /// ```
    pub fn connect_with<D, F>(&self, connect: F) -> Result<D, DbError>
    where
        F: FnOnce(&MongoConfig) -> anyhow::Result<D>,
    {
        connect(self).map_err(|source| DbError::Connect {
            db_name: self.db_name.clone(),
            source,
        })
    }
}
