//! Exact-match metadata filtering.
//!
//! A [`Filter`] is a set of `key = value` conditions joined with AND. A record
//! passes only when its metadata holds every key with exactly the required
//! value. The empty filter passes everything.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{VafError, VafResult};
use crate::Metadata;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    conditions: HashMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `key = value` condition, replacing any earlier one for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Parses a `key=value` pair as passed on the command line.
    pub fn parse_condition(raw: &str) -> VafResult<(String, String)> {
        match raw.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(VafError::InvalidArgument(format!(
                "expected key=value, got '{}'",
                raw
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.get(key).is_some_and(|v| v == value))
    }
}

impl From<HashMap<String, String>> for Filter {
    fn from(conditions: HashMap<String, String>) -> Self {
        Self { conditions }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
