//! Configuration override hook
//!
//! The application under test builds its configuration from a key/value
//! source. Before that happens, the fixture writes the live datasource
//! coordinates into a [`PropertySink`] so the application talks to the
//! ephemeral instance and nothing else.

use crate::config::ConnectionConfig;
use std::collections::BTreeMap;

/// Receives configuration overrides
pub trait PropertySink {
    fn add(&mut self, key: &str, value: String);
}

impl PropertySink for BTreeMap<String, String> {
    fn add(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

/// Ordered collection of overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRegistry {
    values: BTreeMap<String, String>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values
    }
}

impl PropertySink for PropertyRegistry {
    fn add(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

/// The three datasource overrides derived from a live endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceProperties {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl DatasourceProperties {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            url: config.url(),
            username: config.username.clone(),
            password: config.password.clone().unwrap_or_default(),
        }
    }

    /// Write `<prefix>.url`, `<prefix>.username` and `<prefix>.password`
    pub fn write_to<S>(&self, prefix: &str, sink: &mut S)
    where
        S: PropertySink + ?Sized,
    {
        sink.add(&format!("{}.url", prefix), self.url.clone());
        sink.add(&format!("{}.username", prefix), self.username.clone());
        sink.add(&format!("{}.password", prefix), self.password.clone());
    }
}
