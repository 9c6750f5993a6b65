// src/db/models/package_info.rs

//! Multi-valued release metadata
//!
//! Upstream metadata is an open-ended set of fields, several of which repeat
//! (`classifier`, `requires_dist`, ...). Every key therefore maps to a list of
//! zero or more strings. The map is replaced wholesale on update.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which trove classifiers are stored
pub const CLASSIFIER_KEY: &str = "classifier";

/// Ordered key → multi-value metadata map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageInfo(BTreeMap<String, Vec<String>>);

impl PackageInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for a key (empty when the key is absent)
    pub fn get_list(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Replace all values for a key
    pub fn set_list(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    /// Append one value to a key
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    /// Drop values matching `predicate` from every key, keeping the keys
    pub fn retain_values<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&str) -> bool,
    {
        for values in self.0.values_mut() {
            values.retain(|v| predicate(v));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize for the `package_info` column
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0)
            .map_err(|e| Error::ParseError(format!("Failed to serialize package info: {e}")))
    }

    /// Deserialize the `package_info` column
    ///
    /// Scalar values (written by older tools) are read as single-element
    /// lists and `null` as an empty list.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| Error::ParseError(format!("Invalid package info JSON: {e}")))?;

        let map = raw
            .into_iter()
            .map(|(key, value)| (key, json_values(value)))
            .collect();
        Ok(Self(map))
    }
}

fn json_values(value: serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().flat_map(json_values).collect(),
        other => vec![other.to_string()],
    }
}

impl FromIterator<(String, Vec<String>)> for PackageInfo {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
