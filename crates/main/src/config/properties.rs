//! Flat key/value property source
//!
//! Properties are loaded once, before any injection happens, and are never
//! mutated afterwards. Two document formats are understood:
//!
//! - `.properties` text (`key=value` or `key: value`, `#`/`!` comments,
//!   trailing `\` continues a value on the next line)
//! - YAML (`.yaml`/`.yml`), flattened into dotted keys so that
//!   `component: {seda: {queueSize: 500}}` becomes `component.seda.queueSize`
//!
//! Lookups are case-sensitive and the last loaded value wins when a key is
//! defined more than once.

use crate::config::PropertyOrigin;
use crate::errors::MainError;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

/// Prefix marking a location whose absence is not an error
pub const OPTIONAL_PREFIX: &str = "optional:";

const MAX_PLACEHOLDER_DEPTH: usize = 32;

/// Immutable key/value store used for property injection and auto-configuration
#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    values: BTreeMap<String, String>,
    origins: BTreeMap<String, PropertyOrigin>,
}

impl PropertySource {
    /// Create an empty property source
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a property source from in-memory pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut source = Self::new();
        for (key, value) in pairs {
            source.insert(key.into(), value.into(), PropertyOrigin::Inline);
        }
        source
    }

    /// Parse a `.properties` document
    pub fn parse_properties(text: &str, origin: PropertyOrigin) -> Result<Self, MainError> {
        let mut source = Self::new();
        let mut lines = text.lines().enumerate();

        while let Some((index, raw)) = lines.next() {
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let mut logical = trimmed.trim_end().to_string();
            while logical.ends_with('\\') {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim()),
                    None => break,
                }
            }

            let separator = logical.find(['=', ':']).ok_or_else(|| {
                MainError::config_load(
                    origin.to_string(),
                    format!("line {}: expected 'key=value', found '{}'", index + 1, logical),
                )
            })?;

            let key = logical[..separator].trim();
            if key.is_empty() {
                return Err(MainError::config_load(
                    origin.to_string(),
                    format!("line {}: empty key", index + 1),
                ));
            }
            let value = logical[separator + 1..].trim();
            source.insert(key.to_string(), value.to_string(), origin.clone());
        }

        Ok(source)
    }

    /// Parse a YAML document and flatten it into dotted keys
    pub fn parse_yaml(text: &str, origin: PropertyOrigin) -> Result<Self, MainError> {
        let document: Value = serde_yaml::from_str(text)
            .map_err(|e| MainError::config_load(origin.to_string(), e.to_string()))?;

        let mut flattened = Vec::new();
        match document {
            Value::Null => {}
            Value::Mapping(_) => flatten_yaml("", &document, &mut flattened)
                .map_err(|message| MainError::config_load(origin.to_string(), message))?,
            _ => {
                return Err(MainError::config_load(
                    origin.to_string(),
                    "top-level YAML value must be a mapping",
                ))
            }
        }

        let mut source = Self::new();
        for (key, value) in flattened {
            source.insert(key, value, origin.clone());
        }
        Ok(source)
    }

    /// Load a single location. Locations prefixed with `optional:` yield an
    /// empty source when the file does not exist.
    pub fn load(location: &str) -> Result<Self, MainError> {
        let (optional, path) = match location.strip_prefix(OPTIONAL_PREFIX) {
            Some(path) => (true, path),
            None => (false, location),
        };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound && optional => {
                tracing::debug!("Optional property location '{}' not found, skipping", path);
                return Ok(Self::new());
            }
            Err(e) => return Err(MainError::config_load(path, e.to_string())),
        };

        let origin = PropertyOrigin::File(path.to_string());
        let source = if is_yaml(path) {
            Self::parse_yaml(&text, origin)?
        } else {
            Self::parse_properties(&text, origin)?
        };

        tracing::debug!("Loaded {} properties from '{}'", source.len(), path);
        Ok(source)
    }

    /// Load several locations in order, later locations overriding earlier ones
    pub fn load_all<I, S>(locations: I) -> Result<Self, MainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut merged = Self::new();
        for location in locations {
            merged = merged.merge(Self::load(location.as_ref())?);
        }
        Ok(merged)
    }

    /// Combine two sources; keys from `other` win
    pub fn merge(mut self, other: PropertySource) -> Self {
        for (key, value) in other.values {
            let origin = other
                .origins
                .get(&key)
                .cloned()
                .unwrap_or(PropertyOrigin::Inline);
            self.insert(key, value, origin);
        }
        self
    }

    fn insert(&mut self, key: String, value: String, origin: PropertyOrigin) {
        self.origins.insert(key.clone(), origin);
        self.values.insert(key, value);
    }

    /// Get the raw value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Where the value of `key` was loaded from
    pub fn origin(&self, key: &str) -> Option<&PropertyOrigin> {
        self.origins.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Every key starting with `prefix`, returned as `(suffix, value)` in sorted order
    pub fn keys_with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.values
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| key.len() > prefix.len())
            .map(|(key, value)| (key[prefix.len()..].to_string(), value.clone()))
            .collect()
    }

    /// Replace every `{{key}}` (or `{{key:default}}`) in `text`.
    ///
    /// Values are resolved recursively, so a property may itself reference
    /// other properties.
    pub fn resolve_placeholders(&self, text: &str) -> Result<String, MainError> {
        self.resolve_nested(text, 0)
    }

    fn resolve_nested(&self, text: &str, depth: usize) -> Result<String, MainError> {
        if depth > MAX_PLACEHOLDER_DEPTH {
            return Err(MainError::config_load(
                "placeholders",
                format!(
                    "placeholders nested deeper than {} levels in '{}', possible cycle",
                    MAX_PLACEHOLDER_DEPTH, text
                ),
            ));
        }

        let mut resolved = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("{{") {
            resolved.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = closing_delimiter(after).ok_or_else(|| {
                MainError::config_load("placeholders", format!("unterminated placeholder in '{}'", text))
            })?;

            let expression = after[..end].trim();
            let (key, default) = match expression.split_once(':') {
                Some((key, default)) => (key.trim(), Some(default)),
                None => (expression, None),
            };

            match (self.get(key), default) {
                (Some(value), _) => resolved.push_str(&self.resolve_nested(value, depth + 1)?),
                (None, Some(default)) => {
                    resolved.push_str(&self.resolve_nested(default, depth + 1)?)
                }
                (None, None) => return Err(MainError::missing_property("placeholder", key)),
            }

            rest = &after[end + 2..];
        }

        resolved.push_str(rest);
        Ok(resolved)
    }
}

/// Offset of the `}}` closing a placeholder body, skipping nested placeholders
fn closing_delimiter(body: &str) -> Option<usize> {
    let mut open = 0usize;
    let mut i = 0;
    while i + 1 < body.len() {
        match &body.as_bytes()[i..i + 2] {
            b"{{" => {
                open += 1;
                i += 2;
            }
            b"}}" if open == 0 => return Some(i),
            b"}}" => {
                open -= 1;
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

fn is_yaml(path: &str) -> bool {
    matches!(
        Path::new(path).extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn flatten_yaml(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) -> Result<(), String> {
    match value {
        Value::Mapping(map) => {
            for (key, nested) in map {
                let key = scalar_to_string(key)
                    .ok_or_else(|| format!("non-scalar mapping key under '{}'", prefix))?;
                let full_key = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_yaml(&full_key, nested, out)?;
            }
        }
        Value::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_yaml(&format!("{}[{}]", prefix, index), item, out)?;
            }
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out)?,
        scalar => {
            // scalar_to_string covers every non-container variant
            if let Some(text) = scalar_to_string(scalar) {
                out.push((prefix.to_string(), text));
            }
        }
    }
    Ok(())
}
