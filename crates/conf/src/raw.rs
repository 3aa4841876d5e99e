//! Raw configuration values and the ordered key/value configuration they are
//! emitted into.
//!
//! Fragments expose an ordered list of `(key, RawValue)` pairs; before a pair
//! lands in a [`Configuration`], the elision rule applies: empty optionals,
//! empty collections and optionals wrapping empty collections are dropped, and
//! non-empty optionals are unwrapped to their inner value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw configuration value, prior to canonical string encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Str(String),
    Bool(bool),
    I64(i64),
    F64(f64),
    /// Collections join their elements with `;`.
    List(Vec<String>),
    /// Mappings join entries as `k=v` with `;`, preserving insertion order.
    Pairs(Vec<(String, String)>),
    OptStr(Option<String>),
    OptBool(Option<bool>),
    OptList(Option<Vec<String>>),
}

impl RawValue {
    /// Canonical string form, or `None` when the value elides.
    pub fn encode(&self) -> Option<String> {
        match self {
            RawValue::Str(s) if s.trim().is_empty() => None,
            RawValue::Str(s) => Some(s.clone()),
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::I64(n) => Some(n.to_string()),
            RawValue::F64(n) => Some(n.to_string()),
            RawValue::List(xs) if xs.is_empty() => None,
            RawValue::List(xs) => Some(xs.join(";")),
            RawValue::Pairs(ps) if ps.is_empty() => None,
            RawValue::Pairs(ps) => Some(
                ps.iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
            RawValue::OptStr(o) => o.as_ref().and_then(|s| RawValue::Str(s.clone()).encode()),
            RawValue::OptBool(o) => o.map(|b| b.to_string()),
            RawValue::OptList(o) => o.as_ref().and_then(|xs| RawValue::List(xs.clone()).encode()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Str(s)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::I64(n)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::F64(n)
    }
}

/// An ordered list of `(key, RawValue)` pairs as produced by a raw-config
/// fragment.
pub type RawMapping = Vec<(&'static str, RawValue)>;

/// Insertion-ordered Flink configuration map. `set` overwrites in place, so a
/// key keeps its first position while the last written value wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    entries: Vec<(String, String)>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Apply the elision rule, then set.
    pub fn append(&mut self, key: &str, value: RawValue) {
        if let Some(encoded) = value.encode() {
            self.set(key, encoded);
        }
    }

    pub fn append_all(&mut self, mapping: RawMapping) {
        for (k, v) in mapping {
            self.append(k, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted view, convenient for diffing and tests.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}
