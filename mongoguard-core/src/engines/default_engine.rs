// mongoguard-core/src/engines/default_engine.rs
//! The built-in recursive sanitization engine.
//!
//! Dispatch happens once per node on the closed [`Value`] variants. Scalars that
//! cannot carry operator syntax pass through, strings go to the pattern sanitizer,
//! sequences and mappings are rebuilt from their sanitized children. The input is
//! never modified; every call returns a fresh value of the same shape.
//!
//! License: MIT OR APACHE 2.0

use std::collections::HashSet;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use log::trace;

use crate::engine::{CustomSanitizer, ValueSanitizer};
use crate::errors::GuardError;
use crate::options::SanitizeOptions;
use crate::sanitizers::key_policy::{KeyDecision, KeyPolicy};
use crate::sanitizers::string::sanitize_string;
use crate::validators::is_email;
use crate::value::{Mapping, NumericKey, Value};

/// Hashable view of a scalar, for order-preserving de-duplication.
#[derive(PartialEq, Eq, Hash)]
enum ScalarKey<'a> {
    Null,
    Bool(bool),
    Number(NumericKey),
    Date(&'a DateTime<Utc>),
    String(&'a str),
}

impl<'a> ScalarKey<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => Some(ScalarKey::Null),
            Value::Bool(b) => Some(ScalarKey::Bool(*b)),
            Value::Number(n) => Some(ScalarKey::Number(NumericKey::of(n))),
            Value::Date(d) => Some(ScalarKey::Date(d)),
            Value::String(s) => Some(ScalarKey::String(s)),
            _ => None,
        }
    }
}

fn retain_first_seen<K, F>(items: Vec<Value>, key_of: F) -> Vec<Value>
where
    K: Hash + Eq,
    F: Fn(&Value) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(key_of(item))).collect()
}

/// The default engine. Stateless; all behaviour comes from the options passed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEngine;

impl DefaultEngine {
    pub fn new() -> Self {
        DefaultEngine
    }

    /// Sanitizes any value. Strings are treated as values, so `max_length` applies.
    pub fn sanitize_value(&self, value: &Value, options: &SanitizeOptions) -> Value {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Date(_) => value.clone(),
            Value::String(s) if is_email(s) => value.clone(),
            Value::Sequence(items) => Value::Sequence(self.sanitize_items(items, options)),
            Value::Mapping(map) => Value::Mapping(self.sanitize_entries(map, options)),
            Value::String(s) => Value::String(sanitize_string(s, options, true)),
            Value::Opaque(_) => value.clone(),
        }
    }

    /// Sanitizes a sequence.
    ///
    /// Elements are always sanitized, whatever `recursive` says. Afterwards `null`
    /// elements are filtered, then duplicates removed, when the array options ask
    /// for it.
    pub fn sanitize_array(&self, value: &Value, options: &SanitizeOptions) -> Result<Value, GuardError> {
        match value {
            Value::Sequence(items) => Ok(Value::Sequence(self.sanitize_items(items, options))),
            other => Err(GuardError::InputType { expected: "sequence", found: other.kind() }),
        }
    }

    /// Sanitizes a mapping: key policy, removal mode, value recursion and empty
    /// pruning, applied entry by entry in insertion order.
    pub fn sanitize_mapping(&self, value: &Value, options: &SanitizeOptions) -> Result<Value, GuardError> {
        match value {
            Value::Mapping(map) => Ok(Value::Mapping(self.sanitize_entries(map, options))),
            other => Err(GuardError::InputType { expected: "mapping", found: other.kind() }),
        }
    }

    fn sanitize_items(&self, items: &[Value], options: &SanitizeOptions) -> Vec<Value> {
        let mut sanitized: Vec<Value> = items.iter().map(|item| self.sanitize_value(item, options)).collect();

        let array_options = options.array_options;
        if array_options.filter_null {
            sanitized.retain(|item| !item.is_null());
        }
        if array_options.distinct {
            sanitized = if sanitized.iter().all(Value::is_scalar) {
                let mut seen = HashSet::with_capacity(sanitized.len());
                let keep: Vec<bool> = sanitized.iter().map(|item| seen.insert(ScalarKey::of(item))).collect();
                sanitized.into_iter().zip(keep).filter_map(|(item, keep)| keep.then_some(item)).collect()
            } else {
                retain_first_seen(sanitized, Value::deep_key)
            };
        }
        sanitized
    }

    fn sanitize_entries(&self, map: &Mapping, options: &SanitizeOptions) -> Mapping {
        let policy = KeyPolicy::new(options);
        let mut result = Mapping::with_capacity(map.len());

        for (key, value) in map.iter() {
            let sanitized_key = match policy.decide(key) {
                KeyDecision::Keep(sanitized) => sanitized,
                KeyDecision::Drop(_) => continue,
            };

            if let Value::String(s) = value {
                if is_email(s) {
                    result.insert(sanitized_key, value.clone());
                    continue;
                }
                if options.remove_matches && options.patterns.is_match(s) {
                    trace!("Dropping key '{}': value matches a pattern.", key);
                    continue;
                }
            }

            let sanitized_value = match &options.custom_sanitizer {
                CustomSanitizer::Custom(custom) => custom.sanitize(value, options),
                CustomSanitizer::Default => self.descend(value, options),
            };

            if options.remove_empty && sanitized_value.is_empty_container() {
                trace!("Dropping key '{}': value is empty after sanitization.", key);
                continue;
            }

            result.insert(sanitized_key, sanitized_value);
        }

        result
    }

    /// Mapping and sequence values are copied through untouched when recursion is off.
    fn descend(&self, value: &Value, options: &SanitizeOptions) -> Value {
        match value {
            Value::Mapping(_) | Value::Sequence(_) if !options.recursive => value.clone(),
            _ => self.sanitize_value(value, options),
        }
    }
}

impl ValueSanitizer for DefaultEngine {
    fn sanitize(&self, value: &Value, options: &SanitizeOptions) -> Value {
        self.sanitize_value(value, options)
    }
}
