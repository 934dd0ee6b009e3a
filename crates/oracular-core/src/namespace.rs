//! Nested settings record used for stats payloads and model configuration.
//!
//! Supports dotted-path access (`ns.get("a.b.c")`), assignment that
//! auto-creates intermediate nodes, and byte-identical YAML/JSON round-trips
//! for scalar and nested-mapping values. Iteration skips metadata keys
//! prefixed by `__`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NsValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<NsValue>),
    Map(BTreeMap<String, NsValue>),
}

impl NsValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NsValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NsValue::Float(v) => Some(*v),
            NsValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NsValue]> {
        match self {
            NsValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, NsValue>> {
        match self {
            NsValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Wrap a list of strings.
    pub fn str_list<I: IntoIterator<Item = S>, S: Into<String>>(items: I) -> NsValue {
        NsValue::List(
            items
                .into_iter()
                .map(|s| NsValue::Str(s.into()))
                .collect(),
        )
    }

    /// Wrap a list of floats.
    pub fn float_list<I: IntoIterator<Item = f64>>(items: I) -> NsValue {
        NsValue::List(items.into_iter().map(NsValue::Float).collect())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(flatten)]
    root: BTreeMap<String, NsValue>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Dotted-path lookup.
    pub fn get(&self, path: &str) -> Option<&NsValue> {
        let mut map = &self.root;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            let value = map.get(part)?;
            if parts.peek().is_none() {
                return Some(value);
            }
            map = value.as_map()?;
        }
        None
    }

    /// Dotted-path assignment; intermediate maps are created as needed, and
    /// non-map intermediates are replaced.
    pub fn set(&mut self, path: &str, value: NsValue) {
        set_inner(&mut self.root, path, value);
    }

    pub fn remove(&mut self, path: &str) -> Option<NsValue> {
        match path.split_once('.') {
            None => self.root.remove(path),
            Some((head, rest)) => {
                let mut sub = Namespace {
                    root: match self.root.get_mut(head)? {
                        NsValue::Map(map) => std::mem::take(map),
                        _ => return None,
                    },
                };
                let removed = sub.remove(rest);
                if let Some(NsValue::Map(map)) = self.root.get_mut(head) {
                    *map = sub.root;
                }
                removed
            }
        }
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(NsValue::as_str)
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(NsValue::as_f64)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(NsValue::as_bool)
    }

    /// Fetch a list of strings at `path`; non-string items are skipped.
    pub fn get_str_list(&self, path: &str) -> Option<Vec<String>> {
        self.get(path).and_then(NsValue::as_list).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Fetch a list of floats at `path`.
    pub fn get_float_list(&self, path: &str) -> Option<Vec<f64>> {
        self.get(path).and_then(NsValue::as_list).map(|items| {
            items.iter().filter_map(NsValue::as_f64).collect()
        })
    }

    pub fn set_str(&mut self, path: &str, value: &str) {
        self.set(path, NsValue::Str(value.to_string()));
    }

    pub fn set_f64(&mut self, path: &str, value: f64) {
        self.set(path, NsValue::Float(value));
    }

    pub fn set_bool(&mut self, path: &str, value: bool) {
        self.set(path, NsValue::Bool(value));
    }

    /// Iterate top-level entries, skipping `__`-prefixed metadata keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NsValue)> {
        self.root
            .iter()
            .filter(|(k, _)| !k.starts_with("__"))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn set_inner(map: &mut BTreeMap<String, NsValue>, path: &str, value: NsValue) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| NsValue::Map(BTreeMap::new()));
            if !matches!(entry, NsValue::Map(_)) {
                *entry = NsValue::Map(BTreeMap::new());
            }
            if let NsValue::Map(inner) = entry {
                set_inner(inner, rest, value);
            }
        }
    }
}

impl fmt::Display for Namespace {
    /// Pretty-printed JSON, for debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("<unprintable namespace>"),
        }
    }
}
