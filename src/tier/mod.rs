//! Reader loyalty tiers derived from recent read counts.

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

const LOYAL_MIN_READS: usize = 2;
const BRAND_LOVER_MIN_READS: usize = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReaderTier {
    Casual,
    Loyal,
    BrandLover,
}

impl ReaderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderTier::Casual => "casual",
            ReaderTier::Loyal => "loyal",
            ReaderTier::BrandLover => "brand_lover",
        }
    }

    /// 0-1 reads casual, 2-14 loyal, 15+ brand lover.
    pub fn from_read_count(reads: usize) -> Self {
        if reads >= BRAND_LOVER_MIN_READS {
            ReaderTier::BrandLover
        } else if reads >= LOYAL_MIN_READS {
            ReaderTier::Loyal
        } else {
            ReaderTier::Casual
        }
    }
}

impl fmt::Display for ReaderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts reads at or after `now - window_days` and classifies them.
pub fn classify(history: &[DateTime<Utc>], now: DateTime<Utc>, window_days: i64) -> ReaderTier {
    let cutoff = now - Duration::days(window_days);
    let reads = history.iter().filter(|read| **read >= cutoff).count();
    ReaderTier::from_read_count(reads)
}

/// Server-side tier lookup backing the tier query.
pub async fn tier_for_reader(
    db: &Database,
    reader_id: &str,
    now: DateTime<Utc>,
    window_days: i64,
) -> Result<ReaderTier> {
    let history = db.read_history(reader_id).await?;
    Ok(classify(&history, now, window_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 30, 12, 0, 0).unwrap()
    }

    fn reads(count: usize, days_ago: i64) -> Vec<DateTime<Utc>> {
        (0..count).map(|_| now() - Duration::days(days_ago)).collect()
    }

    #[test]
    fn boundaries_are_exact() {
        assert_eq!(ReaderTier::from_read_count(0), ReaderTier::Casual);
        assert_eq!(ReaderTier::from_read_count(1), ReaderTier::Casual);
        assert_eq!(ReaderTier::from_read_count(2), ReaderTier::Loyal);
        assert_eq!(ReaderTier::from_read_count(14), ReaderTier::Loyal);
        assert_eq!(ReaderTier::from_read_count(15), ReaderTier::BrandLover);
    }

    #[test]
    fn only_the_trailing_window_counts() {
        let mut history = reads(1, 2);
        history.extend(reads(20, 31));
        assert_eq!(classify(&history, now(), 30), ReaderTier::Casual);

        let history = reads(14, 5);
        assert_eq!(classify(&history, now(), 30), ReaderTier::Loyal);

        let history = reads(15, 29);
        assert_eq!(classify(&history, now(), 30), ReaderTier::BrandLover);
    }

    #[test]
    fn window_lower_bound_is_inclusive() {
        let history = reads(2, 30);
        assert_eq!(classify(&history, now(), 30), ReaderTier::Loyal);
    }

    #[test]
    fn serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReaderTier::BrandLover).unwrap(),
            "\"brand_lover\""
        );
        assert_eq!(ReaderTier::Loyal.to_string(), "loyal");
    }
}
