//! notify::registry
//!
//! Notifier selection and creation.
//!
//! # Design
//!
//! The orchestrator never names a concrete notifier type. It asks the
//! registry for a notifier by name (from `--notifier` or the builder) and gets
//! a boxed trait object back. Applications can register their own factories
//! next to the builtins.
//!
//! # Builtins
//!
//! - `logging` → [`LoggingNotifier`] (default)
//! - `slack` → [`SlackNotifier`] built from the environment
//!
//! # Example
//!
//! ```
//! use jobhook::notify::{LoggingNotifier, NotifierRegistry};
//!
//! let mut registry = NotifierRegistry::with_builtins();
//! registry.register("quiet", |_env| Ok(Box::new(LoggingNotifier::new())));
//!
//! assert!(registry.names().contains(&"quiet".to_string()));
//! let notifier = registry.create("logging", &Default::default()).unwrap();
//! assert_eq!(notifier.name(), "logging");
//! ```

use std::collections::BTreeMap;

use super::logging::LoggingNotifier;
use super::slack::SlackNotifier;
use super::traits::{Notifier, NotifyError};

/// Name of the notifier used when nothing else is configured.
pub const DEFAULT_NOTIFIER: &str = "logging";

/// Explicit settings handed to notifier factories.
///
/// Fields left as `None` are resolved by each factory on its own, usually
/// from the process environment.
#[derive(Debug, Clone, Default)]
pub struct NotifierEnv {
    /// Chat token override
    pub token: Option<String>,
    /// Chat channel override
    pub channel_id: Option<String>,
}

/// Factory closure stored in the registry.
pub type NotifierFactory =
    Box<dyn Fn(&NotifierEnv) -> Result<Box<dyn Notifier>, NotifyError> + Send + Sync>;

/// Supported builtin notifier providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierProvider {
    /// Log sink only
    Logging,
    /// Slack chat webhook
    Slack,
}

impl NotifierProvider {
    /// Get all builtin providers.
    pub fn all() -> &'static [NotifierProvider] {
        &[NotifierProvider::Logging, NotifierProvider::Slack]
    }

    /// Get the provider name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            NotifierProvider::Logging => "logging",
            NotifierProvider::Slack => "slack",
        }
    }

    /// Parse a provider from a string (case-insensitive).
    ///
    /// # Example
    ///
    /// ```
    /// use jobhook::notify::NotifierProvider;
    ///
    /// assert_eq!(NotifierProvider::parse("Slack"), Some(NotifierProvider::Slack));
    /// assert_eq!(NotifierProvider::parse("pager"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "logging" => Some(NotifierProvider::Logging),
            "slack" => Some(NotifierProvider::Slack),
            _ => None,
        }
    }

    /// Create the builtin notifier for this provider.
    pub fn create(&self, env: &NotifierEnv) -> Result<Box<dyn Notifier>, NotifyError> {
        match self {
            NotifierProvider::Logging => Ok(Box::new(LoggingNotifier::new())),
            NotifierProvider::Slack => Ok(Box::new(SlackNotifier::from_parts(
                env.token.clone(),
                env.channel_id.clone(),
            )?)),
        }
    }
}

impl std::fmt::Display for NotifierProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Get the list of builtin notifier names.
pub fn valid_notifier_names() -> Vec<&'static str> {
    NotifierProvider::all().iter().map(|p| p.name()).collect()
}

/// Name-keyed collection of notifier factories.
pub struct NotifierRegistry {
    factories: BTreeMap<String, NotifierFactory>,
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl NotifierRegistry {
    /// Create a registry with no factories at all.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry holding every builtin provider.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for provider in NotifierProvider::all() {
            let provider = *provider;
            registry.register(provider.name(), move |env| provider.create(env));
        }
        registry
    }

    /// Register (or replace) a factory under `name`.
    ///
    /// Names are stored lowercase; lookups are case-insensitive.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&NotifierEnv) -> Result<Box<dyn Notifier>, NotifyError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Box::new(factory));
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Check whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Create a notifier by name.
    ///
    /// # Errors
    ///
    /// - `NotifyError::UnknownNotifier` if nothing is registered under `name`
    /// - whatever the factory itself returns (e.g. `MissingCredential`)
    pub fn create(&self, name: &str, env: &NotifierEnv) -> Result<Box<dyn Notifier>, NotifyError> {
        let factory =
            self.factories
                .get(&name.to_lowercase())
                .ok_or_else(|| NotifyError::UnknownNotifier {
                    name: name.to_string(),
                    valid: self.names(),
                })?;
        factory(env)
    }
}
