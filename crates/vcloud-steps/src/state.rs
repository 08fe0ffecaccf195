//! Per-run state shared between steps
//!
//! Each step records what it created under its own key so that its
//! rollback can find it again.

use crate::error::{Result, StepError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBag {
    values: BTreeMap<String, serde_json::Value>,
}

impl StateBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| StepError::State {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Typed read; a value of the wrong shape is an error, not a miss
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| StepError::State {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
