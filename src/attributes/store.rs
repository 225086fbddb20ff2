use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("attribute store unavailable: {0}")]
    Unavailable(String),
    #[error("attribute `{key}` holds an unexpected value: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub action: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Attribute(String),
    Activity(String),
}

pub type ChangeListener = Box<dyn Fn(&StoreChange) + Send + Sync>;

/// Reader-side key/value and activity log. The core only reads and writes
/// through this contract.
///
/// Cached criterion results are keyed on `(instance_id, revision)`: the id
/// must be unique per store and `revision` must increase on every mutation.
pub trait AttributeStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;

    fn on_change(&mut self, listener: ChangeListener);

    /// Activities in insertion order, optionally filtered by action.
    fn activities(&self, action: Option<&str>) -> Result<Vec<Activity>, StoreError>;

    fn record_activity(
        &mut self,
        action: &str,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn revision(&self) -> u64;

    fn instance_id(&self) -> Uuid;
}

pub struct MemoryStore {
    id: Uuid,
    values: HashMap<String, Value>,
    activities: Vec<Activity>,
    listeners: Vec<ChangeListener>,
    revision: u64,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("id", &self.id)
            .field("values", &self.values)
            .field("activities", &self.activities.len())
            .field("listeners", &self.listeners.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            values: HashMap::new(),
            activities: Vec::new(),
            listeners: Vec::new(),
            revision: 0,
        }
    }

    fn notify(&mut self, change: StoreChange) {
        self.revision += 1;
        for listener in &self.listeners {
            listener(&change);
        }
    }
}

impl AttributeStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        self.notify(StoreChange::Attribute(key.to_string()));
        Ok(())
    }

    fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    fn activities(&self, action: Option<&str>) -> Result<Vec<Activity>, StoreError> {
        Ok(self
            .activities
            .iter()
            .filter(|activity| action.map_or(true, |wanted| activity.action == wanted))
            .cloned()
            .collect())
    }

    fn record_activity(
        &mut self,
        action: &str,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.activities.push(Activity {
            action: action.to_string(),
            data,
            timestamp,
        });
        self.notify(StoreChange::Activity(action.to_string()));
        Ok(())
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn instance_id(&self) -> Uuid {
        self.id
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
