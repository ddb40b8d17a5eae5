//! Serialization formats for template data files and command output.
//!
//! A [`FormatRegistry`] is built once at startup and passed by reference to
//! whatever needs to look a format up by file suffix or configured name.
use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context as _, Result};
use serde_json::Value;

use crate::error::FormatError;

/// A named serialization format over generic JSON-shaped values.
pub trait Format: fmt::Debug {
    /// Registry name, also the file suffix the format is recognised by.
    fn name(&self) -> &'static str;

    /// Serialize `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented in this format.
    fn marshal(&self, value: &Value) -> Result<Vec<u8>>;

    /// Deserialize `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid in this format.
    fn unmarshal(&self, data: &[u8]) -> Result<Value>;
}

/// Pretty-printed JSON with a two-space indent and a trailing newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec_pretty(value).context("failed to encode JSON")?;
        out.push(b'\n');
        Ok(out)
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).context("failed to parse JSON")
    }
}

/// YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormat;

impl Format for YamlFormat {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(value)
            .context("failed to encode YAML")?
            .into_bytes())
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        serde_yaml::from_slice(data).context("failed to parse YAML")
    }
}

/// TOML. Values without a TOML representation (e.g. `null`) fail to marshal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFormat;

impl Format for TomlFormat {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(toml::to_string(value)
            .context("failed to encode TOML")?
            .into_bytes())
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(data).context("TOML is not valid UTF-8")?;
        toml::from_str(text).context("failed to parse TOML")
    }
}

/// Formats by lower-case name.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Box<dyn Format>>,
}

impl FormatRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the JSON, TOML and YAML formats.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(JsonFormat));
        registry.register(Box::new(TomlFormat));
        registry.register(Box::new(YamlFormat));
        registry
    }

    /// Add `format`, replacing any format with the same name.
    pub fn register(&mut self, format: Box<dyn Format>) {
        self.formats.insert(format.name().to_string(), format);
    }

    /// Look a format up by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Unknown`] if no format has that name.
    pub fn get(&self, name: &str) -> Result<&dyn Format, FormatError> {
        self.formats
            .get(&name.to_ascii_lowercase())
            .map(Box::as_ref)
            .ok_or_else(|| FormatError::Unknown {
                name: name.to_string(),
                known: self.names().map(str::to_string).collect(),
            })
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.get("JSON").unwrap().name(), "json");
        assert_eq!(registry.get("yaml").unwrap().name(), "yaml");
    }

    #[test]
    fn registry_unknown_format() {
        let registry = FormatRegistry::with_defaults();
        let err = registry.get("ini").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown format 'ini' (expected one of: json, toml, yaml)"
        );
    }

    #[test]
    fn registry_names_sorted() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["json", "toml", "yaml"]
        );
    }

    #[test]
    fn json_marshal_is_indented_with_newline() {
        let out = JsonFormat.marshal(&json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn each_format_parses_nested_tables() {
        let expected = json!({"git": {"email": "me@example.com"}});
        assert_eq!(
            JsonFormat
                .unmarshal(br#"{"git":{"email":"me@example.com"}}"#)
                .unwrap(),
            expected
        );
        assert_eq!(
            TomlFormat
                .unmarshal(b"[git]\nemail = \"me@example.com\"\n")
                .unwrap(),
            expected
        );
        assert_eq!(
            YamlFormat
                .unmarshal(b"git:\n  email: me@example.com\n")
                .unwrap(),
            expected
        );
    }

    #[test]
    fn toml_rejects_null() {
        assert!(TomlFormat.marshal(&json!({"a": null})).is_err());
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(JsonFormat.unmarshal(b"{").is_err());
        assert!(TomlFormat.unmarshal(b"= =").is_err());
    }
}
