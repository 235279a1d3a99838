//! config::value
//!
//! The loaded configuration document.
//!
//! # Design
//!
//! `ConfigDict` is an opaque nested key/value document. Both TOML and JSON
//! files are normalised into `serde_json::Value` so accessors, overrides,
//! logging and fingerprinting work the same regardless of the file format.
//! Map keys are kept sorted, which makes the JSON rendering canonical.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::ConfigError;

/// A loaded configuration document. The root is always a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDict {
    root: Map<String, Value>,
}

impl ConfigDict {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` unless `value` is an object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ConfigError::InvalidValue(format!(
                "configuration root must be a table, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Check whether the configuration has no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// Look up a value by dotted path (`"optimizer.lr"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a value by dotted path and deserialize it.
    ///
    /// # Errors
    ///
    /// - `ConfigError::UnknownKey` if the path does not exist
    /// - `ConfigError::InvalidValue` if the value has the wrong shape
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self.get(path).ok_or_else(|| ConfigError::UnknownKey {
            key: path.to_string(),
        })?;
        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::InvalidValue(format!("'{}': {}", path, e)))
    }

    /// Deserialize the whole document into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.root.clone()))
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Apply a `KEY=VALUE` override.
    ///
    /// `KEY` is a dotted path that must already exist. `VALUE` is read as a
    /// TOML literal (`3`, `0.5`, `true`, `[1, 2]`, `"quoted"`, `{ a = 1 }`);
    /// anything that does not parse is kept as a plain string.
    ///
    /// # Example
    ///
    /// ```
    /// use jobhook::config::ConfigDict;
    ///
    /// let mut config = ConfigDict::from_value(serde_json::json!({"batch": 32})).unwrap();
    /// config.apply_override("batch=64").unwrap();
    /// assert_eq!(config.get("batch"), Some(&serde_json::json!(64)));
    /// ```
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (key, raw) = spec.split_once('=').ok_or_else(|| {
            ConfigError::InvalidOverride(format!("expected KEY=VALUE, got '{}'", spec))
        })?;
        let key = key.trim();
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidOverride(format!(
                "invalid key in '{}'",
                spec
            )));
        }

        let unknown = || ConfigError::UnknownKey {
            key: key.to_string(),
        };
        let mut segments: Vec<&str> = key.split('.').collect();
        let leaf = segments.pop().ok_or_else(unknown)?;

        let mut table = &mut self.root;
        for segment in segments {
            table = table
                .get_mut(segment)
                .and_then(Value::as_object_mut)
                .ok_or_else(unknown)?;
        }
        let slot = table.get_mut(leaf).ok_or_else(unknown)?;
        *slot = parse_literal(raw.trim());
        Ok(())
    }

    /// Borrow the underlying table.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Convert into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Render as indented JSON with sorted keys.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| "{}".to_string())
    }

    /// SHA-256 of the canonical compact JSON rendering, hex encoded.
    ///
    /// Equal configurations always share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(&self.root).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

impl std::fmt::Display for ConfigDict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_pretty_json())
    }
}

/// Read an override value as a TOML literal, falling back to a string.
fn parse_literal(raw: &str) -> Value {
    toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .and_then(|value| toml_to_json("v", value).ok())
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Convert a TOML value into JSON.
///
/// Datetimes become their RFC 3339 text. Non-finite floats have no JSON
/// form and are rejected, naming the dotted `path` of the offending key.
pub(crate) fn toml_to_json(path: &str, value: toml::Value) -> Result<Value, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "'{}' is {}, which has no JSON representation",
                    path, f
                ))
            })?,
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| toml_to_json(&format!("{}[{}]", path, i), item))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => Value::Object(toml_table_to_json(Some(path), table)?),
    })
}

/// Convert a TOML table, prefixing key paths with `parent` when nested.
pub(crate) fn toml_table_to_json(
    parent: Option<&str>,
    table: toml::Table,
) -> Result<Map<String, Value>, ConfigError> {
    table
        .into_iter()
        .map(|(key, value)| {
            let path = match parent {
                Some(parent) => format!("{}.{}", parent, key),
                None => key.clone(),
            };
            toml_to_json(&path, value).map(|value| (key, value))
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> ConfigDict {
        ConfigDict::from_value(json!({
            "name": "resnet",
            "batch_size": 32,
            "optimizer": { "kind": "adam", "lr": 0.001 },
            "tags": ["a", "b"],
        }))
        .unwrap()
    }

    #[test]
    fn root_must_be_table() {
        assert!(ConfigDict::from_value(json!([1, 2])).is_err());
        assert!(ConfigDict::from_value(json!("x")).is_err());
        assert!(ConfigDict::from_value(json!({})).unwrap().is_empty());
    }

    #[test]
    fn dotted_get() {
        let config = sample();
        assert_eq!(config.get("name"), Some(&json!("resnet")));
        assert_eq!(config.get("optimizer.lr"), Some(&json!(0.001)));
        assert_eq!(config.get("optimizer.missing"), None);
        assert_eq!(config.get("name.inner"), None);
    }

    #[test]
    fn typed_get() {
        let config = sample();
        let batch: u32 = config.get_as("batch_size").unwrap();
        assert_eq!(batch, 32);

        let err = config.get_as::<u32>("nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { .. }));

        let err = config.get_as::<u32>("name").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn deserialize_whole_document() {
        #[derive(Deserialize)]
        struct Optimizer {
            kind: String,
        }
        #[derive(Deserialize)]
        struct Train {
            batch_size: u32,
            optimizer: Optimizer,
        }

        let train: Train = sample().deserialize().unwrap();
        assert_eq!(train.batch_size, 32);
        assert_eq!(train.optimizer.kind, "adam");
    }

    #[test]
    fn override_typed_values() {
        let mut config = sample();
        config.apply_override("batch_size=64").unwrap();
        config.apply_override("optimizer.lr = 0.01").unwrap();
        config.apply_override("tags=[\"x\"]").unwrap();
        config.apply_override("name=vit").unwrap();

        assert_eq!(config.get("batch_size"), Some(&json!(64)));
        assert_eq!(config.get("optimizer.lr"), Some(&json!(0.01)));
        assert_eq!(config.get("tags"), Some(&json!(["x"])));
        assert_eq!(config.get("name"), Some(&json!("vit")));
    }

    #[test]
    fn override_bool_and_quoted_string() {
        let mut config = ConfigDict::from_value(json!({"debug": false, "id": "x"})).unwrap();
        config.apply_override("debug=true").unwrap();
        config.apply_override("id=\"42\"").unwrap();

        assert_eq!(config.get("debug"), Some(&json!(true)));
        assert_eq!(config.get("id"), Some(&json!("42")));
    }

    #[test]
    fn override_datetime_is_stored_as_text() {
        let mut config = sample();
        config.apply_override("name=2024-05-01").unwrap();
        assert_eq!(config.get("name"), Some(&json!("2024-05-01")));
        let name: String = config.get_as("name").unwrap();
        assert_eq!(name, "2024-05-01");
    }

    #[test]
    fn override_non_finite_float_falls_back_to_text() {
        let mut config = sample();
        config.apply_override("optimizer.lr=nan").unwrap();
        assert_eq!(config.get("optimizer.lr"), Some(&json!("nan")));
    }

    #[test]
    fn toml_conversion_names_non_finite_key() {
        let table: toml::Table = toml::from_str("[opt]\nrates = [0.1, inf]\n").unwrap();
        let err = toml_table_to_json(None, table).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref m) if m.contains("opt.rates[1]")));
    }

    #[test]
    fn override_unknown_key_rejected() {
        let mut config = sample();
        assert!(matches!(
            config.apply_override("epochs=3"),
            Err(ConfigError::UnknownKey { .. })
        ));
        assert!(matches!(
            config.apply_override("name.inner=3"),
            Err(ConfigError::UnknownKey { .. })
        ));
    }

    #[test]
    fn override_malformed_rejected() {
        let mut config = sample();
        for spec in ["batch_size", "=3", "optimizer..lr=1"] {
            assert!(
                matches!(
                    config.apply_override(spec),
                    Err(ConfigError::InvalidOverride(_))
                ),
                "{} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.apply_override("batch_size=1").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn pretty_json_sorted() {
        let config = ConfigDict::from_value(json!({"b": 1, "a": 2})).unwrap();
        let rendered = config.to_pretty_json();
        assert!(rendered.find("\"a\"").unwrap() < rendered.find("\"b\"").unwrap());
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
