//! Per-prompt display frequency gating.

pub mod counters;
pub mod gate;
pub mod policy;

pub use counters::{record_pageview, PageviewCounter, PageviewCounters};
pub use gate::{
    decide, evaluate_page, mark_seen, seen_times, HideReason, PageDecision, PromptDecision,
    Visibility,
};
pub use policy::{FrequencyPolicy, Prompt, ResetPeriod};
