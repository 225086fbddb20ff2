use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentCriterion {
    pub criteria_id: String,
    #[serde(default, alias = "config")]
    pub value: Value,
}

impl SegmentCriterion {
    pub fn new(criteria_id: impl Into<String>, value: Value) -> Self {
        Self {
            criteria_id: criteria_id.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentDefinition {
    pub priority: i64,
    #[serde(default)]
    pub criteria: Vec<SegmentCriterion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    pub priority: i64,
    pub criteria: Vec<SegmentCriterion>,
    /// Registration order; breaks priority ties, earliest first.
    pub sequence: u64,
}

/// Configured segments in registration order.
#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    segments: Vec<Segment>,
    next_sequence: u64,
}

impl SegmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a segment, or replaces the definition of an existing id while
    /// keeping its first registration sequence.
    pub fn register(&mut self, id: impl Into<String>, definition: SegmentDefinition) {
        let id = id.into();
        if let Some(existing) = self.segments.iter_mut().find(|segment| segment.id == id) {
            existing.priority = definition.priority;
            existing.criteria = definition.criteria;
            return;
        }

        self.segments.push(Segment {
            id,
            priority: definition.priority,
            criteria: definition.criteria,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
    }

    /// Parses `{"segment_id": {"priority": n, "criteria": [...]}, ...}`.
    /// Document order becomes registration order.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(raw).context("segment configuration is not valid JSON")?;
        let Value::Object(entries) = document else {
            bail!("segment configuration must be an object keyed by segment id");
        };
        Self::from_map(entries)
    }

    pub fn from_map(entries: Map<String, Value>) -> Result<Self> {
        let mut set = Self::new();
        for (id, definition) in entries {
            let definition: SegmentDefinition = serde_json::from_value(definition)
                .with_context(|| format!("invalid definition for segment `{id}`"))?;
            set.register(id, definition);
        }
        Ok(set)
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_order_is_registration_order() {
        let set = SegmentSet::from_json(
            r#"{
                "zeta": {"priority": 1, "criteria": []},
                "alpha": {"priority": 1, "criteria": [{"criteria_id": "donation", "value": true}]}
            }"#,
        )
        .unwrap();

        let ids: Vec<_> = set.iter().map(|s| (s.id.as_str(), s.sequence)).collect();
        assert_eq!(ids, vec![("zeta", 0), ("alpha", 1)]);
        assert_eq!(
            set.get("alpha").unwrap().criteria,
            vec![SegmentCriterion::new("donation", json!(true))]
        );
    }

    #[test]
    fn config_alias_is_accepted() {
        let set = SegmentSet::from_json(
            r#"{"s": {"priority": 0, "criteria": [{"criteria_id": "articles_read", "config": {"min": 2}}]}}"#,
        )
        .unwrap();
        assert_eq!(set.get("s").unwrap().criteria[0].value, json!({"min": 2}));
    }

    #[test]
    fn re_registering_keeps_sequence() {
        let mut set = SegmentSet::new();
        set.register("a", SegmentDefinition { priority: 5, criteria: vec![] });
        set.register("b", SegmentDefinition { priority: 5, criteria: vec![] });
        set.register("a", SegmentDefinition { priority: 2, criteria: vec![] });

        let a = set.get("a").unwrap();
        assert_eq!((a.priority, a.sequence), (2, 0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(SegmentSet::from_json("[]").is_err());
        assert!(SegmentSet::from_json(r#"{"s": {"criteria": []}}"#).is_err());
    }
}
