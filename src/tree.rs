//! Ordered settings trees used to describe program input.
//!
//! A [`Settings`] tree is an insertion-ordered list of `(key, Value)` pairs
//! where each [`Value`] is either a scalar, a list of values or a nested
//! tree. The input writers in [`cp2k`](crate::cp2k), [`orca`](crate::orca)
//! and [`adf`](crate::adf) walk these trees with a `match` over [`Value`].
//!
//! Two per-node annotations replace the magic keys used by older job
//! frameworks:
//!
//! - `terminator`: printed as `<terminator> end` by the ORCA writer
//!   (JSON key `_end`)
//! - `header`: arguments printed on the block header line by the ADF
//!   writer (JSON key `_h`)
//!
//! # Loading from JSON
//!
//! Key order in the JSON document is preserved:
//!
//! ```
//! use qmadapt::tree::Settings;
//!
//! let s = Settings::from_json_str(r#"{"b": 1, "a": {"x": true}}"#).unwrap();
//! let keys: Vec<&str> = s.keys().collect();
//! assert_eq!(keys, vec!["b", "a"]);
//! ```

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// JSON key holding a node's ORCA line terminator.
pub const TERMINATOR_KEY: &str = "_end";
/// JSON key holding a node's ADF block header arguments.
pub const HEADER_KEY: &str = "_h";

/// Errors raised while loading a settings tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The document root is not an object
    #[error("settings root must be a JSON object")]
    NotATree,
}

/// A single leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Text, written verbatim
    Str(String),
    /// Integer
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// Boolean, written as `True`/`False`
    Bool(bool),
}

impl Scalar {
    /// `true` for values that are written as a bare keyword: `""` and `true`.
    pub fn is_flag(&self) -> bool {
        match self {
            Scalar::Str(s) => s.is_empty(),
            Scalar::Bool(b) => *b,
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{}", i),
            // Debug keeps the trailing ".0" on integral floats and writes 1e-6, not 1e-06
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
        }
    }
}

/// A node of a settings tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Leaf value
    Scalar(Scalar),
    /// Repeated entries under one key
    List(Vec<Value>),
    /// Nested block
    Tree(Settings),
}

impl Value {
    /// Returns the nested tree, if this value is one.
    pub fn as_tree(&self) -> Option<&Settings> {
        match self {
            Value::Tree(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the leaf, if this value is one.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the text of a string leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::Str(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::Str(s))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Scalar(Scalar::Int(i as i64))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(Scalar::Float(x))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<Settings> for Value {
    fn from(s: Settings) -> Self {
        Value::Tree(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered nested key/value tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    entries: Vec<(String, Value)>,
    terminator: Option<Scalar>,
    header: Option<Scalar>,
}

impl Settings {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a tree from a JSON document, keeping key order.
    pub fn from_json_str(text: &str) -> Result<Self, TreeError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Tree(t) => Ok(t),
            _ => Err(TreeError::NotATree),
        }
    }

    /// Loads a tree from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, TreeError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON, with `_h` first and `_end` last.
    pub fn to_json_string(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of entries, annotations excluded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// First entry in iteration order.
    pub fn first(&self) -> Option<(&str, &Value)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }

    /// Value stored under `key` (exact match).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Mutable value stored under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Looks up a dotted path such as `"force_eval.dft.basis_set_file_name"`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_tree()?.get(part)?;
        }
        Some(current)
    }

    /// Sets `key`, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
        self
    }

    /// Sets a dotted path, creating intermediate trees as needed.
    ///
    /// An intermediate value that is not a tree is replaced by one.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match path.split_once('.') {
            None => {
                self.set(path, value);
            }
            Some((head, rest)) => {
                if !matches!(self.get(head), Some(Value::Tree(_))) {
                    self.set(head, Settings::new());
                }
                if let Some(Value::Tree(child)) = self.get_mut(head) {
                    child.set_path(rest, value);
                }
            }
        }
        self
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Finds the stored spelling of `key`, ignoring ASCII case.
    pub fn find_case(&self, key: &str) -> Option<&str> {
        self.keys().find(|k| k.eq_ignore_ascii_case(key))
    }

    /// Adds entries from `other` that are missing here, recursing into trees
    /// present on both sides. Existing values are never overwritten.
    pub fn soft_update(&mut self, other: &Settings) -> &mut Self {
        for (key, value) in other.iter() {
            match (self.get_mut(key), value) {
                (Some(Value::Tree(mine)), Value::Tree(theirs)) => {
                    mine.soft_update(theirs);
                }
                (Some(_), _) => {}
                (None, _) => {
                    self.entries.push((key.to_string(), value.clone()));
                }
            }
        }
        if self.terminator.is_none() {
            self.terminator = other.terminator.clone();
        }
        if self.header.is_none() {
            self.header = other.header.clone();
        }
        self
    }

    /// ORCA line terminator of this node.
    pub fn terminator(&self) -> Option<&Scalar> {
        self.terminator.as_ref()
    }

    /// Sets or clears the ORCA line terminator.
    pub fn set_terminator(&mut self, value: Option<Scalar>) -> &mut Self {
        self.terminator = value;
        self
    }

    /// ADF block header arguments of this node.
    pub fn header(&self) -> Option<&Scalar> {
        self.header.as_ref()
    }

    /// Sets or clears the ADF block header arguments.
    pub fn set_header(&mut self, value: Option<Scalar>) -> &mut Self {
        self.header = value;
        self
    }

    /// Appends `value` under `key`, turning repeated keys into a list.
    pub fn push_repeated(&mut self, key: &str, value: Value) {
        match self.get_mut(key) {
            Some(Value::List(items)) => items.push(value),
            Some(slot) => {
                let previous = std::mem::replace(slot, Value::List(Vec::new()));
                *slot = Value::List(vec![previous, value]);
            }
            None => self.entries.push((key.to_string(), value)),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Str(s) => serializer.serialize_str(s),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(x) => serializer.serialize_f64(*x),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::List(items) => items.serialize(serializer),
            Value::Tree(t) => t.serialize(serializer),
        }
    }
}

impl Serialize for Settings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(self.header.is_some()) + usize::from(self.terminator.is_some());
        let mut map = serializer.serialize_map(Some(self.entries.len() + extra))?;
        if let Some(h) = &self.header {
            map.serialize_entry(HEADER_KEY, h)?;
        }
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        if let Some(end) = &self.terminator {
            map.serialize_entry(TERMINATOR_KEY, end)?;
        }
        map.end()
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number, boolean, array or object")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(|i| Value::Scalar(Scalar::Int(i)))
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Str(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Scalar(Scalar::Str(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut tree = Settings::new();
        while let Some(key) = map.next_key::<String>()? {
            let value: Value = map.next_value()?;
            if key == TERMINATOR_KEY || key == HEADER_KEY {
                let scalar = match value {
                    Value::Scalar(s) => s,
                    _ => {
                        return Err(de::Error::custom(format!(
                            "'{}' must hold a scalar value",
                            key
                        )))
                    }
                };
                if key == TERMINATOR_KEY {
                    tree.terminator = Some(scalar);
                } else {
                    tree.header = Some(scalar);
                }
            } else {
                tree.set(&key, value);
            }
        }
        Ok(Value::Tree(tree))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Tree(t) => Ok(t),
            _ => Err(de::Error::custom("expected a JSON object")),
        }
    }
}
