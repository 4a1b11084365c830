//! Plugin options.
//!
//! Option *parsing* (command line, config files) happens outside the core;
//! plugins only ever see an already-merged [`Options`] map. Each plugin may
//! declare the options it understands in an [`OptionsSchema`], which is used
//! to fill in defaults, to flag values redundantly set to their default, and
//! to render a commented default configuration listing.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AppError;
use crate::result::AppResult;

/// Parsed option values keyed by option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: Map<String, Value>,
}

impl Options {
    /// Creates an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON object.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the raw value for `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns whether `key` was set at all.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns `true` when `key` is present and not `false`/`null`.
    ///
    /// Switch-style options (`--readonly`) are stored as `true` or as an
    /// empty value, both of which count as set.
    pub fn flag(&self, key: &str) -> bool {
        !matches!(self.values.get(key), None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    /// Deserializes the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| AppError::not_found(format!("Option '{key}' is not set")))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            AppError::with_source(
                crate::error::ErrorKind::Validation,
                format!("Option '{key}' has an unexpected type: {e}"),
                e,
            )
        })
    }

    /// Deserializes the value stored under `key`, or returns `default`.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> AppResult<T> {
        if self.contains(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Number of options set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether no option is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over every option.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// One declared option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    /// Option name, as it appears in the options map.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Default value, if the option has one.
    pub default: Option<Value>,
    /// Plugin that declared the option.
    pub owner: Option<String>,
}

/// The set of options declared by every registered plugin.
#[derive(Debug, Clone, Default)]
pub struct OptionsSchema {
    specs: Vec<OptionSpec>,
    owner: Option<String>,
}

impl OptionsSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes subsequently declared options to `owner`.
    pub fn set_owner(&mut self, owner: Option<&str>) {
        self.owner = owner.map(str::to_string);
    }

    /// Declares an option without a default (a switch or a required value).
    pub fn add(&mut self, name: &str, description: &str) -> &mut Self {
        self.push(name, description, None)
    }

    /// Declares an option with a default value.
    pub fn add_with_default(
        &mut self,
        name: &str,
        default: impl Into<Value>,
        description: &str,
    ) -> &mut Self {
        self.push(name, description, Some(default.into()))
    }

    fn push(&mut self, name: &str, description: &str, default: Option<Value>) -> &mut Self {
        if self.specs.iter().any(|s| s.name == name) {
            warn!(option = %name, owner = ?self.owner, "Option declared twice, keeping first declaration");
            return self;
        }
        self.specs.push(OptionSpec {
            name: name.to_string(),
            description: description.to_string(),
            default,
            owner: self.owner.clone(),
        });
        self
    }

    /// Declared options, in declaration order.
    pub fn specs(&self) -> &[OptionSpec] {
        &self.specs
    }

    /// Looks up a declared option.
    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Returns `options` with every missing defaulted option filled in.
    pub fn apply_defaults(&self, options: &Options) -> Options {
        let mut merged = options.clone();
        for spec in &self.specs {
            if let Some(default) = &spec.default {
                if !merged.contains(&spec.name) {
                    merged.insert(spec.name.clone(), default.clone());
                }
            }
        }
        merged
    }

    /// Names of options explicitly set to exactly their default value.
    pub fn redundant_defaults(&self, options: &Options) -> Vec<String> {
        self.specs
            .iter()
            .filter(|spec| match (&spec.default, options.value(&spec.name)) {
                (Some(default), Some(value)) => default == value,
                _ => false,
            })
            .map(|spec| spec.name.clone())
            .collect()
    }

    /// Names present in `options` that no plugin declared.
    pub fn undeclared<'a>(&self, options: &'a Options) -> Vec<&'a str> {
        let declared: HashSet<&str> = self.specs.iter().map(|s| s.name.as_str()).collect();
        options
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(|k| !declared.contains(k))
            .collect()
    }

    /// Renders a commented listing of every option and its default.
    pub fn render_default_config(&self) -> String {
        let mut out = String::new();
        for spec in &self.specs {
            if !spec.description.is_empty() {
                out.push_str("# ");
                out.push_str(&spec.description.replace('\n', "\n# "));
                if let Some(owner) = &spec.owner {
                    out.push_str(&format!(" ({owner})"));
                }
                out.push('\n');
            }
            match &spec.default {
                Some(default) => out.push_str(&format!("# {} = {}\n", spec.name, default)),
                None => out.push_str(&format!("# {} = \n", spec.name)),
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> OptionsSchema {
        let mut schema = OptionsSchema::new();
        schema.set_owner(Some("db"));
        schema
            .add("readonly", "open db in read only mode")
            .add_with_default("dbsize", 8 * 1024, "Minimum size MB of database");
        schema.set_owner(Some("net"));
        schema.add_with_default("endpoint", "127.0.0.1:9876", "address and port.");
        schema
    }

    #[test]
    fn test_typed_get() {
        let options = Options::new().with("dbsize", 10000).with("endpoint", "127.0.0.1:55");
        assert_eq!(options.get::<u64>("dbsize").unwrap(), 10000);
        assert_eq!(options.get::<String>("endpoint").unwrap(), "127.0.0.1:55");
    }

    #[test]
    fn test_get_missing_and_mistyped() {
        let options = Options::new().with("dbsize", "large");
        assert_eq!(
            options.get::<u64>("absent").unwrap_err().kind,
            crate::error::ErrorKind::NotFound
        );
        assert_eq!(
            options.get::<u64>("dbsize").unwrap_err().kind,
            crate::error::ErrorKind::Validation
        );
        assert_eq!(options.get_or::<u64>("absent", 3).unwrap(), 3);
    }

    #[test]
    fn test_flag() {
        let options = Options::new()
            .with("readonly", true)
            .with("replay", Value::Null)
            .with("log", false);
        assert!(options.flag("readonly"));
        assert!(!options.flag("replay"));
        assert!(!options.flag("log"));
        assert!(!options.flag("missing"));
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_values() {
        let options = Options::new().with("dbsize", 10000);
        let merged = schema().apply_defaults(&options);
        assert_eq!(merged.get::<u64>("dbsize").unwrap(), 10000);
        assert_eq!(merged.get::<String>("endpoint").unwrap(), "127.0.0.1:9876");
        assert!(!merged.contains("readonly"));
    }

    #[test]
    fn test_redundant_and_undeclared() {
        let options = Options::new()
            .with("endpoint", "127.0.0.1:9876")
            .with("dbsize", 1)
            .with("mystery", 1);
        let schema = schema();
        assert_eq!(schema.redundant_defaults(&options), vec!["endpoint".to_string()]);
        assert_eq!(schema.undeclared(&options), vec!["mystery"]);
    }

    #[test]
    fn test_duplicate_declaration_keeps_first() {
        let mut schema = schema();
        schema.add_with_default("dbsize", 1, "again");
        assert_eq!(schema.specs().len(), 3);
        assert_eq!(schema.get("dbsize").unwrap().default, Some(Value::from(8 * 1024)));
    }

    #[test]
    fn test_render_default_config() {
        let rendered = schema().render_default_config();
        assert!(rendered.contains("# open db in read only mode (db)\n# readonly = \n"));
        assert!(rendered.contains("# dbsize = 8192\n"));
        assert!(rendered.contains("# endpoint = \"127.0.0.1:9876\"\n"));
    }
}
