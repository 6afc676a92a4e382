//! Configuration management for `mongoguard-core`.
//!
//! This module defines the user-facing, partial configuration for the sanitization
//! engine. Every field is optional; an absent field inherits the built-in default.
//! It handles deserialization of YAML/JSON configuration documents, validates each
//! field of loosely typed documents before anything is built, and merges partial
//! configurations over each other.
//!
//! License: MIT OR Apache-2.0

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use log::{debug, info, warn};

use crate::engine::CustomSanitizer;
use crate::errors::GuardError;

/// Maximum allowed length for a pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// The built-in pattern set, applied in order.
///
/// 1. the operator sigil;
/// 2. the field-path dot plus regex and template metacharacters;
/// 3. NUL bytes.
pub const DEFAULT_PATTERNS: &[&str] = &[
    r"\$",
    r"[\\/{}.(*+?|\[\]^)]",
    r"\x00",
];

/// Whether sanitization runs on every request or only when asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Auto,
    Manual,
}

impl FromStr for Mode {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Mode::Auto),
            "manual" => Ok(Mode::Manual),
            other => Err(GuardError::configuration("mode", format!("\"{}\"", other))),
        }
    }
}

/// A named section of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSection {
    Body,
    Params,
    Query,
}

impl RequestSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSection::Body => "body",
            RequestSection::Params => "params",
            RequestSection::Query => "query",
        }
    }
}

impl fmt::Display for RequestSection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestSection {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "body" => Ok(RequestSection::Body),
            "params" => Ok(RequestSection::Params),
            "query" => Ok(RequestSection::Query),
            other => Err(GuardError::configuration("sanitizeObjects", format!("\"{}\"", other))),
        }
    }
}

/// Partial string post-processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StringOptionsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowercase: Option<bool>,
    /// `Some(None)` explicitly removes a limit inherited from a base configuration.
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<Option<usize>>,
}

/// Partial array post-processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArrayOptionsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_null: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
}

/// The user-supplied configuration. `None` fields inherit the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SanitizeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_empty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_keys: Option<Vec<String>>,
    pub string_options: StringOptionsConfig,
    pub array_options: ArrayOptionsConfig,
    /// Programmatic only; documents may carry `null` here and nothing else.
    #[serde(skip)]
    pub custom_sanitizer: Option<CustomSanitizer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitize_objects: Option<Vec<RequestSection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_routes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The top-level keys a configuration document may carry.
const KNOWN_FIELDS: &[&str] = &[
    "replaceWith",
    "removeMatches",
    "patterns",
    "recursive",
    "removeEmpty",
    "allowedKeys",
    "deniedKeys",
    "stringOptions",
    "arrayOptions",
    "customSanitizer",
    "sanitizeObjects",
    "skipRoutes",
    "mode",
];

impl SanitizeConfig {
    /// The fully populated default configuration.
    pub fn defaults() -> Self {
        Self {
            replace_with: Some(String::new()),
            remove_matches: Some(false),
            patterns: Some(DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()),
            recursive: Some(true),
            remove_empty: Some(false),
            allowed_keys: Some(Vec::new()),
            denied_keys: Some(Vec::new()),
            string_options: StringOptionsConfig {
                trim: Some(false),
                lowercase: Some(false),
                max_length: Some(None),
            },
            array_options: ArrayOptionsConfig {
                filter_null: Some(false),
                distinct: Some(false),
            },
            custom_sanitizer: None,
            sanitize_objects: Some(vec![RequestSection::Body, RequestSection::Params, RequestSection::Query]),
            skip_routes: Some(Vec::new()),
            mode: Some(Mode::Auto),
        }
    }

    /// Validates a loosely typed document and converts it into a configuration.
    ///
    /// Fields are checked in a fixed order; the first violation is returned as a
    /// `Configuration` error naming the field and the value received. Unknown
    /// top-level keys are ignored with a warning.
    pub fn from_json(document: &serde_json::Value) -> Result<Self, GuardError> {
        let Some(object) = document.as_object() else {
            return Err(GuardError::configuration("options", describe(document)));
        };

        for key in object.keys() {
            if !KNOWN_FIELDS.contains(&key.as_str()) {
                warn!("Ignoring unknown configuration field '{}'.", key);
            }
        }

        check_field(object, "replaceWith", is_string)?;
        check_field(object, "removeMatches", is_bool)?;
        check_field(object, "patterns", is_string_list)?;
        check_field(object, "recursive", is_bool)?;
        check_field(object, "removeEmpty", is_bool)?;
        check_field(object, "allowedKeys", is_string_list)?;
        check_field(object, "deniedKeys", is_string_list)?;
        check_field(object, "skipRoutes", is_string_list)?;
        check_field(object, "customSanitizer", serde_json::Value::is_null)?;

        if let Some(mode) = object.get("mode") {
            match mode.as_str() {
                Some(s) => {
                    s.parse::<Mode>()?;
                }
                None => return Err(GuardError::configuration("mode", describe(mode))),
            }
        }

        if let Some(sections) = object.get("sanitizeObjects") {
            let Some(items) = sections.as_array() else {
                return Err(GuardError::configuration("sanitizeObjects", describe(sections)));
            };
            for item in items {
                match item.as_str() {
                    Some(s) => {
                        s.parse::<RequestSection>()?;
                    }
                    None => return Err(GuardError::configuration("sanitizeObjects", describe(item))),
                }
            }
        }

        if let Some(string_options) = object.get("stringOptions") {
            let Some(sub) = string_options.as_object() else {
                return Err(GuardError::configuration("stringOptions", describe(string_options)));
            };
            check_field(sub, "trim", is_bool).map_err(|e| prefix(e, "stringOptions"))?;
            check_field(sub, "lowercase", is_bool).map_err(|e| prefix(e, "stringOptions"))?;
            check_field(sub, "maxLength", is_length_or_null).map_err(|e| prefix(e, "stringOptions"))?;
        }

        if let Some(array_options) = object.get("arrayOptions") {
            let Some(sub) = array_options.as_object() else {
                return Err(GuardError::configuration("arrayOptions", describe(array_options)));
            };
            check_field(sub, "filterNull", is_bool).map_err(|e| prefix(e, "arrayOptions"))?;
            check_field(sub, "distinct", is_bool).map_err(|e| prefix(e, "arrayOptions"))?;
        }

        let mut known = serde_json::Map::new();
        for (key, value) in object {
            if KNOWN_FIELDS.contains(&key.as_str()) && key != "customSanitizer" {
                known.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(serde_json::Value::Object(known))
            .map_err(|e| GuardError::configuration("options", e.to_string()))
    }

    /// Parses a YAML (or JSON) document and validates it with [`SanitizeConfig::from_json`].
    pub fn from_yaml_str(text: &str) -> Result<Self, GuardError> {
        let document: serde_json::Value = serde_yml::from_str(text)
            .map_err(|e| GuardError::Yaml(e.to_string()))?;
        Self::from_json(&document)
    }

    /// Loads a configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GuardError> {
        let path = path.as_ref();
        info!("Loading sanitizer configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        debug!("Loaded configuration from file {}.", path.display());
        Ok(config)
    }

    /// Builder-style setter for the custom sanitizer.
    pub fn with_custom_sanitizer(mut self, sanitizer: CustomSanitizer) -> Self {
        self.custom_sanitizer = Some(sanitizer);
        self
    }
}

/// Overlays `overrides` on `base`, field by field. Set fields in `overrides` win.
pub fn merge_config(base: SanitizeConfig, overrides: &SanitizeConfig) -> SanitizeConfig {
    debug!("merge_config called.");

    fn pick<T: Clone>(base: Option<T>, over: &Option<T>) -> Option<T> {
        over.clone().or(base)
    }

    SanitizeConfig {
        replace_with: pick(base.replace_with, &overrides.replace_with),
        remove_matches: pick(base.remove_matches, &overrides.remove_matches),
        patterns: pick(base.patterns, &overrides.patterns),
        recursive: pick(base.recursive, &overrides.recursive),
        remove_empty: pick(base.remove_empty, &overrides.remove_empty),
        allowed_keys: pick(base.allowed_keys, &overrides.allowed_keys),
        denied_keys: pick(base.denied_keys, &overrides.denied_keys),
        string_options: StringOptionsConfig {
            trim: pick(base.string_options.trim, &overrides.string_options.trim),
            lowercase: pick(base.string_options.lowercase, &overrides.string_options.lowercase),
            max_length: pick(base.string_options.max_length, &overrides.string_options.max_length),
        },
        array_options: ArrayOptionsConfig {
            filter_null: pick(base.array_options.filter_null, &overrides.array_options.filter_null),
            distinct: pick(base.array_options.distinct, &overrides.array_options.distinct),
        },
        custom_sanitizer: pick(base.custom_sanitizer, &overrides.custom_sanitizer),
        sanitize_objects: pick(base.sanitize_objects, &overrides.sanitize_objects),
        skip_routes: pick(base.skip_routes, &overrides.skip_routes),
        mode: pick(base.mode, &overrides.mode),
    }
}

fn check_field(
    object: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    predicate: fn(&serde_json::Value) -> bool,
) -> Result<(), GuardError> {
    match object.get(field) {
        Some(value) if !predicate(value) => Err(GuardError::configuration(field, describe(value))),
        _ => Ok(()),
    }
}

fn prefix(error: GuardError, parent: &str) -> GuardError {
    match error {
        GuardError::Configuration { field, received } => GuardError::Configuration {
            field: format!("{}.{}", parent, field),
            received,
        },
        other => other,
    }
}

fn is_string(value: &serde_json::Value) -> bool {
    value.is_string()
}

fn is_bool(value: &serde_json::Value) -> bool {
    value.is_boolean()
}

fn is_string_list(value: &serde_json::Value) -> bool {
    value.as_array().is_some_and(|items| items.iter().all(serde_json::Value::is_string))
}

fn is_length_or_null(value: &serde_json::Value) -> bool {
    value.is_null() || value.is_u64()
}

fn describe(value: &serde_json::Value) -> String {
    let kind = match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    };
    format!("{} ({})", value, kind)
}
