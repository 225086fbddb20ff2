use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One article read by one reader. Stored at most once per (reader, article).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub reader_id: String,
    pub article_id: i64,
    pub category_ids: Vec<i64>,
    pub occurred_at: DateTime<Utc>,
}
