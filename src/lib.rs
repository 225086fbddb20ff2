//! Reader segmentation and prompt gating.
//!
//! Read events flow through the visit log into durable reader counters
//! ([`aggregator`], [`db`]). At page render those counters seed the
//! [`attributes`] store, [`criteria`] are evaluated against each configured
//! [`segments`] entry, the best segment is picked, and [`frequency`] decides
//! which prompts to show. [`tier`] summarises recent reading for analytics.

pub mod aggregator;
pub mod attributes;
pub mod criteria;
pub mod db;
pub mod frequency;
pub mod segments;
pub mod settings;
pub mod tier;
mod utils;

pub use aggregator::{
    AggregationController, AggregationOutcome, AggregationReport, VisitLogAggregator,
    VisitLogWriter,
};
pub use attributes::{seed_store, AttributeStore, MemoryStore, ReaderIdentity, StoreError};
pub use criteria::{register_builtin_criteria, CriteriaRegistry, Matcher, ValueAccessor};
pub use db::{Database, ReaderRecord, ReaderSummary, VisitRecord};
pub use frequency::{evaluate_page, mark_seen, FrequencyPolicy, PageDecision, Prompt, ResetPeriod};
pub use segments::{best_priority_segment, SegmentSet};
pub use settings::{GateSettings, SettingsStore};
pub use tier::{tier_for_reader, ReaderTier};
