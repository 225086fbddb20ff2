use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::attributes::{AttributeStore, StoreError};

use super::matchers::{CriterionValue, MatchError, Matcher};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Derives a criterion's value from the whole store, e.g. from the activity log.
pub type ComputedValue =
    Arc<dyn Fn(&dyn AttributeStore) -> Result<Value, StoreError> + Send + Sync>;

#[derive(Clone)]
pub enum ValueAccessor {
    Key(String),
    Computed(ComputedValue),
}

impl ValueAccessor {
    pub fn computed<F>(accessor: F) -> Self
    where
        F: Fn(&dyn AttributeStore) -> Result<Value, StoreError> + Send + Sync + 'static,
    {
        ValueAccessor::Computed(Arc::new(accessor))
    }

    fn resolve(&self, store: &dyn AttributeStore) -> Result<Value, StoreError> {
        match self {
            ValueAccessor::Key(key) => Ok(store.get(key)?.unwrap_or(Value::Null)),
            ValueAccessor::Computed(accessor) => accessor(store),
        }
    }
}

impl From<&str> for ValueAccessor {
    fn from(key: &str) -> Self {
        ValueAccessor::Key(key.to_string())
    }
}

impl From<String> for ValueAccessor {
    fn from(key: String) -> Self {
        ValueAccessor::Key(key)
    }
}

impl fmt::Debug for ValueAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueAccessor::Key(key) => write!(f, "Key({key})"),
            ValueAccessor::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// Value snapshot taken on first evaluation for one revision of one store.
#[derive(Debug, Default)]
struct Snapshot {
    source: Option<(Uuid, u64)>,
    /// `None` when the accessor failed.
    value: Option<Value>,
    results: HashMap<String, Option<bool>>,
}

#[derive(Debug)]
pub struct Criterion {
    id: String,
    accessor: ValueAccessor,
    matcher: Matcher,
    snapshot: Snapshot,
}

impl Criterion {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn accessor(&self) -> &ValueAccessor {
        &self.accessor
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot.source.is_some()
    }

    fn refresh(&mut self, store: &dyn AttributeStore) {
        let source = (store.instance_id(), store.revision());
        if self.snapshot.source == Some(source) {
            return;
        }

        let value = match self.accessor.resolve(store) {
            Ok(value) => Some(value),
            Err(err) => {
                log_warn!("criterion `{}` could not read its value: {err}", self.id);
                None
            }
        };

        self.snapshot = Snapshot {
            source: Some(source),
            value,
            results: HashMap::new(),
        };
    }

    fn evaluate(&mut self, config: &Value, store: &dyn AttributeStore) -> Option<bool> {
        self.refresh(store);

        let key = cache_key(config);
        if let Some(cached) = self.snapshot.results.get(&key) {
            return *cached;
        }

        let result = match &self.snapshot.value {
            None => None,
            Some(value) => match self.matcher.evaluate(
                &CriterionValue {
                    id: &self.id,
                    value,
                },
                config,
            ) {
                Ok(matched) => Some(matched),
                Err(err) => {
                    log_warn!("criterion `{}` ignored: {err}", self.id);
                    None
                }
            },
        };

        self.snapshot.results.insert(key, result);
        result
    }
}

/// Named criteria evaluated against segment configs.
///
/// Results are cached per normalized config and per store revision: a page
/// view sees a stable snapshot, and any store mutation invalidates it. One
/// registry may be shared across readers; switching stores drops the cache.
#[derive(Debug, Default)]
pub struct CriteriaRegistry {
    criteria: HashMap<String, Criterion>,
}

impl CriteriaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a criterion. Replacing resets its snapshot.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        accessor: impl Into<ValueAccessor>,
        matcher: impl Into<Matcher>,
    ) {
        let id = id.into();
        if self.criteria.contains_key(&id) {
            log_debug!("criterion `{id}` re-registered");
        }
        self.criteria.insert(
            id.clone(),
            Criterion {
                id,
                accessor: accessor.into(),
                matcher: matcher.into(),
                snapshot: Snapshot::default(),
            },
        );
    }

    pub fn register_named(
        &mut self,
        id: impl Into<String>,
        accessor: impl Into<ValueAccessor>,
        matcher_name: &str,
    ) -> Result<(), MatchError> {
        let matcher = Matcher::by_name(matcher_name)?;
        self.register(id, accessor, matcher);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.criteria.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Criterion> {
        self.criteria.get(id)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// `Some(matched)` for a resolvable criterion; `None` ("no opinion") when
    /// the criterion is unknown, its value could not be read, or the config is
    /// malformed.
    pub fn evaluate(
        &mut self,
        id: &str,
        config: &Value,
        store: &dyn AttributeStore,
    ) -> Option<bool> {
        match self.criteria.get_mut(id) {
            Some(criterion) => criterion.evaluate(config, store),
            None => {
                log_warn!("criterion `{id}` is not registered; skipping");
                None
            }
        }
    }

    /// Drops every cached value and result.
    pub fn invalidate(&mut self) {
        for criterion in self.criteria.values_mut() {
            criterion.snapshot = Snapshot::default();
        }
    }
}

/// Canonical text for a config: object keys sorted at every depth, so
/// `{"min":1,"max":2}` and `{"max":2,"min":1}` share a cache slot.
pub fn cache_key(config: &Value) -> String {
    normalize(config).to_string()
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(entries.len());
            for key in keys {
                sorted.insert(key.clone(), normalize(&entries[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}
