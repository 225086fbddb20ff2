use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResetPeriod {
    Day,
    Week,
    #[default]
    Month,
}

impl ResetPeriod {
    pub const ALL: [ResetPeriod; 3] = [ResetPeriod::Day, ResetPeriod::Week, ResetPeriod::Month];

    pub fn duration(&self) -> Duration {
        match self {
            ResetPeriod::Day => Duration::days(1),
            ResetPeriod::Week => Duration::days(7),
            ResetPeriod::Month => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPeriod::Day => "day",
            ResetPeriod::Week => "week",
            ResetPeriod::Month => "month",
        }
    }
}

/// How often a prompt may be displayed.
///
/// * `start`: pageviews in the reset period that must pass before the first show.
/// * `between`: pageviews skipped between shows; 0 shows on every view.
/// * `max`: shows allowed per reset period; 0 is unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FrequencyPolicy {
    pub start: u64,
    pub between: u64,
    pub max: u64,
    #[serde(alias = "reset")]
    pub reset_period: ResetPeriod,
}

/// A displayable prompt as described by its markup attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub id: String,
    #[serde(default)]
    pub frequency: FrequencyPolicy,
    /// Empty means the prompt is shown to every segment.
    #[serde(default)]
    pub assigned_segments: Vec<String>,
}

impl Prompt {
    pub fn new(id: impl Into<String>, frequency: FrequencyPolicy) -> Self {
        Self {
            id: id.into(),
            frequency,
            assigned_segments: Vec::new(),
        }
    }

    pub fn with_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assigned_segments = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Builds a prompt from its two structured markup attributes: the frequency
    /// policy as a JSON object and the segment list as a JSON array or a
    /// comma-separated string.
    pub fn from_markup(id: &str, frequency_attr: &str, segments_attr: &str) -> Result<Self> {
        let frequency = if frequency_attr.trim().is_empty() {
            FrequencyPolicy::default()
        } else {
            serde_json::from_str(frequency_attr)
                .with_context(|| format!("invalid frequency attribute on prompt `{id}`"))?
        };

        Ok(Self {
            id: id.to_string(),
            frequency,
            assigned_segments: parse_segment_list(segments_attr)
                .with_context(|| format!("invalid segments attribute on prompt `{id}`"))?,
        })
    }
}

fn parse_segment_list(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if !trimmed.starts_with('[') {
        return Ok(split_list(trimmed));
    }

    let items: Vec<Value> = serde_json::from_str(trimmed)?;
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id.trim().to_string()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .collect())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
