use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::attributes::{keys, AttributeStore, StoreError};
use crate::criteria::CriteriaRegistry;
use crate::segments::{best_priority_segment, SegmentSet};

use super::counters::{record_pageview, PageviewCounters};
use super::policy::Prompt;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HideReason {
    NotEnoughPageviews,
    BetweenGap,
    MaxReached,
    SegmentMismatch,
    /// Reader state could not be read; display fails closed.
    StoreUnavailable,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "visibility", content = "reason", rename_all = "snake_case")]
pub enum Visibility {
    Shown,
    Hidden(HideReason),
}

impl Visibility {
    pub fn is_shown(&self) -> bool {
        matches!(self, Visibility::Shown)
    }
}

/// Applies the frequency rules in order; the first failing rule hides the
/// prompt. `seen` holds timestamps of earlier shows of this prompt.
pub fn decide(
    prompt: &Prompt,
    counters: &PageviewCounters,
    seen: &[DateTime<Utc>],
    segment_id: Option<&str>,
    now: DateTime<Utc>,
) -> Visibility {
    let policy = &prompt.frequency;
    let count = counters.count(policy.reset_period);

    if count <= policy.start {
        return Visibility::Hidden(HideReason::NotEnoughPageviews);
    }

    if policy.between > 0 {
        // `count > start` here, so this cannot underflow.
        let views_after_start = count - policy.start - 1;
        let shown_on_cycle = match policy.between.checked_add(1) {
            Some(cycle) => views_after_start % cycle == 0,
            None => views_after_start == 0,
        };
        if !shown_on_cycle {
            return Visibility::Hidden(HideReason::BetweenGap);
        }
    }

    if policy.max > 0 {
        let window_start = now - policy.reset_period.duration();
        let shown = seen.iter().filter(|at| **at > window_start).count() as u64;
        if shown >= policy.max {
            return Visibility::Hidden(HideReason::MaxReached);
        }
    }

    if !prompt.assigned_segments.is_empty() {
        let assigned = segment_id.map_or(false, |id| {
            prompt.assigned_segments.iter().any(|assigned| assigned == id)
        });
        if !assigned {
            return Visibility::Hidden(HideReason::SegmentMismatch);
        }
    }

    Visibility::Shown
}

/// Timestamps of `prompt_seen` activities recorded for `prompt_id`.
pub fn seen_times(
    store: &dyn AttributeStore,
    prompt_id: &str,
) -> Result<Vec<DateTime<Utc>>, StoreError> {
    Ok(store
        .activities(Some(keys::ACTIVITY_PROMPT_SEEN))?
        .into_iter()
        .filter(|activity| {
            activity.data.get("prompt_id").and_then(|id| id.as_str()) == Some(prompt_id)
        })
        .map(|activity| activity.timestamp)
        .collect())
}

pub fn mark_seen(
    store: &mut dyn AttributeStore,
    prompt_id: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    store.record_activity(
        keys::ACTIVITY_PROMPT_SEEN,
        json!({ "prompt_id": prompt_id }),
        now,
    )
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PromptDecision {
    pub prompt_id: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageDecision {
    pub segment_id: Option<String>,
    pub prompts: Vec<PromptDecision>,
}

impl PageDecision {
    pub fn shown(&self) -> impl Iterator<Item = &str> {
        self.prompts
            .iter()
            .filter(|decision| decision.visibility.is_shown())
            .map(|decision| decision.prompt_id.as_str())
    }
}

/// Full per-pageview flow: count the view once, resolve the reader's segment
/// once, then gate every prompt. Store failures hide prompts rather than
/// surfacing to the page.
pub fn evaluate_page(
    registry: &mut CriteriaRegistry,
    segments: &SegmentSet,
    store: &mut dyn AttributeStore,
    prompts: &[Prompt],
    now: DateTime<Utc>,
) -> PageDecision {
    let counters = match record_pageview(store, now) {
        Ok(counters) => Some(counters),
        Err(err) => {
            log_warn!("pageview counters unavailable: {err}");
            None
        }
    };

    let segment_id =
        best_priority_segment(segments, registry, &*store).map(|segment| segment.id.clone());

    let prompts = prompts
        .iter()
        .map(|prompt| {
            let visibility = match (&counters, seen_times(&*store, &prompt.id)) {
                (Some(counters), Ok(seen)) => {
                    decide(prompt, counters, &seen, segment_id.as_deref(), now)
                }
                (_, Err(err)) => {
                    log_warn!("seen history for prompt `{}` unavailable: {err}", prompt.id);
                    Visibility::Hidden(HideReason::StoreUnavailable)
                }
                (None, Ok(_)) => Visibility::Hidden(HideReason::StoreUnavailable),
            };
            PromptDecision {
                prompt_id: prompt.id.clone(),
                visibility,
            }
        })
        .collect();

    PageDecision {
        segment_id,
        prompts,
    }
}
