use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single typed parameter value.
///
/// Serialized untagged so presets read as plain JSON scalars. Anything else
/// (null, arrays, objects) is kept verbatim in `Other` and read as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Choice(String),
    Other(serde_json::Value),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Choice(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Choice(v)
    }
}

/// Parameter mapping for one effect instance.
///
/// There is no schema: effects read through the typed accessors below, which
/// coerce between numeric kinds and fall back to the supplied default when a
/// key is missing or holds an unusable value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads a float. Integers convert exactly; non-finite values yield `default`.
    pub fn float(&self, key: &str, default: f64) -> f64 {
        let value = match self.0.get(key) {
            Some(ParamValue::Float(f)) => *f,
            Some(ParamValue::Int(i)) => *i as f64,
            Some(ParamValue::Bool(b)) => f64::from(u8::from(*b)),
            _ => default,
        };
        if value.is_finite() { value } else { default }
    }

    /// Reads an integer. Floats truncate toward zero.
    pub fn int(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(ParamValue::Int(i)) => *i,
            Some(ParamValue::Float(f)) if f.is_finite() => *f as i64,
            Some(ParamValue::Bool(b)) => i64::from(*b),
            _ => default,
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(ParamValue::Bool(b)) => *b,
            Some(ParamValue::Int(i)) => *i != 0,
            Some(ParamValue::Float(f)) => *f != 0.0,
            _ => default,
        }
    }

    pub fn choice<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.0.get(key) {
            Some(ParamValue::Choice(s)) => s.as_str(),
            _ => default,
        }
    }

    /// Seeds are stored as signed integers; the bit pattern is reused as-is.
    pub fn seed(&self, key: &str, default: i64) -> u64 {
        self.int(key, default) as u64
    }
}
