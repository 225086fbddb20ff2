//! Reader-level data models.
//!
//! A reader is identified by the opaque client token carried in the visit log.
//! It may later be bound to one authenticated user id.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReaderEventKind {
    Donation,
    Subscription,
}

impl ReaderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderEventKind::Donation => "donation",
            ReaderEventKind::Subscription => "subscription",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "donation" => Some(ReaderEventKind::Donation),
            "subscription" => Some(ReaderEventKind::Subscription),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReaderEvent {
    pub kind: ReaderEventKind,
    pub amount: Option<f64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderRecord {
    pub reader_id: String,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    pub bound_user_id: Option<String>,
    pub donation_events: Vec<ReaderEvent>,
    pub subscription_events: Vec<ReaderEvent>,
}

impl ReaderRecord {
    pub fn is_donor(&self) -> bool {
        !self.donation_events.is_empty()
    }

    pub fn is_subscriber(&self) -> bool {
        !self.subscription_events.is_empty()
    }
}

/// Counters derived from durable reader state, used to seed the attribute store
/// at page render.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSummary {
    pub reader_id: String,
    pub articles_read: u64,
    pub articles_read_recently: u64,
    /// Category ids ordered by visit count, most read first.
    pub favorite_categories: Vec<i64>,
    pub is_donor: bool,
    pub is_subscriber: bool,
    pub bound_user_id: Option<String>,
}
