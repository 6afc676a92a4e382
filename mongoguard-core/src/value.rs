// mongoguard-core/src/value.rs
//! The payload value model.
//!
//! Inbound request payloads are arbitrary trees. Rather than inspecting their shape
//! at every call site, the engine works on a closed set of variants and dispatches
//! once per node. Conversions to and from `serde_json::Value` cover the common case
//! of JSON bodies; dates and opaque host values only exist on the Rust side.
//!
//! License: MIT OR APACHE 2.0

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// A single node of an inbound payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Date(DateTime<Utc>),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Opaque(Opaque),
}

impl Value {
    /// Short, stable name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Date(_) => "date",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Opaque(_) => "opaque",
        }
    }

    /// True for variants that hold no children.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Date(_) | Value::String(_)
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// `""`, `{}` and `[]`. Everything else, including `null`, counts as content.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Mapping(m) => m.is_empty(),
            Value::Sequence(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Digest identifying a value up to deep equality.
    ///
    /// Mapping entries are hashed in insertion order, so `{a, b}` and `{b, a}` differ.
    /// Opaque values hash their pointer identity.
    pub fn deep_key(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        self.feed(&mut hasher);
        hasher.finalize().into()
    }

    fn feed(&self, hasher: &mut Sha256) {
        match self {
            Value::Null => hasher.update([0u8]),
            Value::Bool(b) => hasher.update([1u8, *b as u8]),
            Value::Number(n) => {
                hasher.update([2u8]);
                match NumericKey::of(n) {
                    NumericKey::Integral(i) => {
                        hasher.update([0u8]);
                        hasher.update(i.to_be_bytes());
                    }
                    NumericKey::Fractional(bits) => {
                        hasher.update([1u8]);
                        hasher.update(bits.to_be_bytes());
                    }
                }
            }
            Value::Date(d) => {
                hasher.update([3u8]);
                hasher.update(d.timestamp_micros().to_be_bytes());
            }
            Value::String(s) => {
                hasher.update([4u8]);
                feed_str(hasher, s);
            }
            Value::Sequence(items) => {
                hasher.update([5u8]);
                hasher.update((items.len() as u64).to_be_bytes());
                for item in items {
                    item.feed(hasher);
                }
            }
            Value::Mapping(map) => {
                hasher.update([6u8]);
                hasher.update((map.len() as u64).to_be_bytes());
                for (k, v) in map.iter() {
                    feed_str(hasher, k);
                    v.feed(hasher);
                }
            }
            Value::Opaque(o) => {
                hasher.update([7u8]);
                hasher.update((Arc::as_ptr(&o.inner) as *const () as usize as u64).to_be_bytes());
            }
        }
    }

    /// Lossy conversion back to JSON: dates become RFC 3339 strings and opaque
    /// values become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// A number keyed by numeric value, so `1`, `1.0` and `-0.0`/`0` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKey {
    Integral(i128),
    Fractional(u64),
}

impl NumericKey {
    pub fn of(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            return NumericKey::Integral(i as i128);
        }
        if let Some(u) = n.as_u64() {
            return NumericKey::Integral(u as i128);
        }
        let f = n.as_f64().unwrap_or_default();
        // 2^127 bounds what an i128 holds exactly.
        if f.fract() == 0.0 && f.abs() < 1.7e38 {
            NumericKey::Integral(f as i128)
        } else {
            NumericKey::Fractional(f.to_bits())
        }
    }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_be_bytes());
    hasher.update(s.as_bytes());
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Sequence(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Mapping(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// An insertion-ordered, string-keyed map.
///
/// Inserting an existing key replaces its value but keeps its original position.
#[derive(Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Replaces every entry with the contents of `other`, keeping `self` as the
    /// same allocation.
    pub fn replace_with(&mut self, other: Mapping) {
        self.clear();
        for (k, v) in other {
            self.insert(k, v);
        }
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = Mapping::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A host value the engine does not understand. It is carried through untouched.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_reinsert_keeps_position() {
        let mut map = Mapping::new();
        map.insert("a", 1);
        map.insert("b", 2);
        let previous = map.insert("a", 3);

        assert_eq!(previous, Some(Value::from(1)));
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::from(3)));
    }

    #[test]
    fn test_mapping_remove_reindexes() {
        let mut map = Mapping::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        map.remove("a");

        assert_eq!(map.get("c"), Some(&Value::from(3)));
        assert_eq!(map.len(), 2);
        map.insert("c", 4);
        assert_eq!(map.keys().last().map(String::as_str), Some("c"));
    }

    #[test]
    fn test_json_conversion_preserves_shape() {
        let value = Value::from(json!({"user": {"tags": ["a", 1, true, null]}}));
        let user = value.as_mapping().and_then(|m| m.get("user")).and_then(Value::as_mapping).unwrap();
        let tags = user.get("tags").and_then(Value::as_sequence).unwrap();

        assert_eq!(tags.len(), 4);
        assert_eq!(tags[3], Value::Null);
        assert_eq!(value.to_json(), json!({"user": {"tags": ["a", 1, true, null]}}));
    }

    #[test]
    fn test_deep_key_distinguishes_structure() {
        let a = Value::from(json!({"x": [1, 2]}));
        let b = Value::from(json!({"x": [1, 2]}));
        let c = Value::from(json!({"x": [2, 1]}));
        let s = Value::from(json!("1"));
        let n = Value::from(json!(1));

        assert_eq!(a.deep_key(), b.deep_key());
        assert_ne!(a.deep_key(), c.deep_key());
        assert_ne!(s.deep_key(), n.deep_key());
    }

    #[test]
    fn test_opaque_equality_is_identity() {
        let first = Opaque::new(42u8);
        let copy = first.clone();
        let other = Opaque::new(42u8);

        assert_eq!(first, copy);
        assert_ne!(first, other);
        assert_eq!(first.downcast_ref::<u8>(), Some(&42));
    }

    #[test]
    fn test_empty_containers() {
        assert!(Value::from("").is_empty_container());
        assert!(Value::Mapping(Mapping::new()).is_empty_container());
        assert!(Value::Sequence(vec![]).is_empty_container());
        assert!(!Value::Null.is_empty_container());
        assert!(!Value::from(false).is_empty_container());
    }
}
