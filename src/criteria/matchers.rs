//! Matchers compare a criterion's current value with a segment's config.
//!
//! Built-ins are a closed set looked up by name; callers can still supply
//! their own comparison through [`Matcher::Custom`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("list config must be an array or a comma-separated string, got {0}")]
    InvalidList(Value),
    #[error("range config must be an object with `min` / `max`, got {0}")]
    InvalidRange(Value),
    #[error("range bound `{bound}` is not numeric: {value}")]
    InvalidBound { bound: &'static str, value: Value },
    #[error("unknown matcher `{0}`")]
    UnknownMatcher(String),
}

/// The criterion being evaluated, as seen by a matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriterionValue<'a> {
    pub id: &'a str,
    pub value: &'a Value,
}

/// `(criterion, segment config) -> matched`.
pub type CustomMatcher = Arc<dyn Fn(&CriterionValue<'_>, &Value) -> bool + Send + Sync>;

type BuiltinFn = fn(&Value, &Value) -> Result<bool, MatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMatcher {
    Default,
    ListIn,
    ListNotIn,
    Range,
}

const BUILTIN_MATCHERS: [(&str, BuiltinMatcher, BuiltinFn); 4] = [
    ("default", BuiltinMatcher::Default, matches_default),
    ("list_in", BuiltinMatcher::ListIn, matches_list_in),
    ("list_not_in", BuiltinMatcher::ListNotIn, matches_list_not_in),
    ("range", BuiltinMatcher::Range, matches_range),
];

impl BuiltinMatcher {
    pub fn by_name(name: &str) -> Option<Self> {
        BUILTIN_MATCHERS
            .iter()
            .find(|(candidate, _, _)| *candidate == name)
            .map(|(_, matcher, _)| *matcher)
    }

    pub fn name(&self) -> &'static str {
        self.entry().0
    }

    fn entry(&self) -> (&'static str, BuiltinMatcher, BuiltinFn) {
        BUILTIN_MATCHERS[*self as usize]
    }

    pub fn evaluate(&self, value: &Value, config: &Value) -> Result<bool, MatchError> {
        (self.entry().2)(value, config)
    }
}

#[derive(Clone)]
pub enum Matcher {
    Builtin(BuiltinMatcher),
    Custom(CustomMatcher),
}

impl Matcher {
    pub fn by_name(name: &str) -> Result<Self, MatchError> {
        BuiltinMatcher::by_name(name)
            .map(Matcher::Builtin)
            .ok_or_else(|| MatchError::UnknownMatcher(name.to_string()))
    }

    pub fn custom<F>(matcher: F) -> Self
    where
        F: Fn(&CriterionValue<'_>, &Value) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom(Arc::new(matcher))
    }

    pub fn evaluate(
        &self,
        criterion: &CriterionValue<'_>,
        config: &Value,
    ) -> Result<bool, MatchError> {
        match self {
            Matcher::Builtin(builtin) => builtin.evaluate(criterion.value, config),
            Matcher::Custom(matcher) => Ok(matcher(criterion, config)),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::Builtin(BuiltinMatcher::Default)
    }
}

impl From<BuiltinMatcher> for Matcher {
    fn from(builtin: BuiltinMatcher) -> Self {
        Matcher::Builtin(builtin)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Builtin(builtin) => write!(f, "Matcher::{}", builtin.name()),
            Matcher::Custom(_) => f.write_str("Matcher::custom"),
        }
    }
}

fn matches_default(value: &Value, config: &Value) -> Result<bool, MatchError> {
    Ok(value == config)
}

fn matches_list_in(value: &Value, config: &Value) -> Result<bool, MatchError> {
    let list = config_list(config)?;
    if list.is_empty() {
        return Ok(false);
    }

    let contains = |item: &Value| scalar_text(item).map_or(false, |text| list.contains(&text));
    Ok(match value {
        Value::Array(items) => items.iter().any(contains),
        other => contains(other),
    })
}

/// Absence of a signal never excludes a reader: an empty value or an empty
/// list both match.
fn matches_list_not_in(value: &Value, config: &Value) -> Result<bool, MatchError> {
    if is_empty(value) {
        return Ok(true);
    }
    if config_list(config)?.is_empty() {
        return Ok(true);
    }
    matches_list_in(value, config).map(|matched| !matched)
}

fn matches_range(value: &Value, config: &Value) -> Result<bool, MatchError> {
    let (min, max) = match config {
        Value::Null => (None, None),
        Value::Object(bounds) => (
            bound(bounds.get("min"), "min")?,
            bound(bounds.get("max"), "max")?,
        ),
        other => return Err(MatchError::InvalidRange(other.clone())),
    };

    if is_falsy(value) {
        return Ok(false);
    }
    let Some(number) = as_number(value) else {
        return Ok(false);
    };

    Ok(min.map_or(true, |min| number >= min) && max.map_or(true, |max| number <= max))
}

fn bound(raw: Option<&Value>, name: &'static str) -> Result<Option<f64>, MatchError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => as_number(value).map(Some).ok_or_else(|| MatchError::InvalidBound {
            bound: name,
            value: value.clone(),
        }),
    }
}

/// Accepts `["a", "b"]` or `"a, b"`; entries are trimmed and blanks dropped.
fn config_list(config: &Value) -> Result<Vec<String>, MatchError> {
    match config {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => Ok(text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()),
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(scalar_text)
            .filter(|item| !item.is_empty())
            .collect()),
        other => Err(MatchError::InvalidList(other.clone())),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn range(value: Value, config: Value) -> bool {
        BuiltinMatcher::Range.evaluate(&value, &config).unwrap()
    }

    fn list_in(value: Value, config: Value) -> bool {
        BuiltinMatcher::ListIn.evaluate(&value, &config).unwrap()
    }

    fn list_not_in(value: Value, config: Value) -> bool {
        BuiltinMatcher::ListNotIn.evaluate(&value, &config).unwrap()
    }

    #[test]
    fn lookup_by_name_covers_every_builtin() {
        for (name, matcher, _) in BUILTIN_MATCHERS {
            assert_eq!(BuiltinMatcher::by_name(name), Some(matcher));
            assert_eq!(matcher.name(), name);
        }
        assert!(matches!(
            Matcher::by_name("fuzzy"),
            Err(MatchError::UnknownMatcher(name)) if name == "fuzzy"
        ));
    }

    fn criterion<'a>(id: &'a str, value: &'a Value) -> CriterionValue<'a> {
        CriterionValue { id, value }
    }

    #[test]
    fn default_is_exact_equality() {
        let matcher = Matcher::default();
        let yes = json!(true);
        assert!(matcher.evaluate(&criterion("donation", &yes), &json!(true)).unwrap());
        assert!(!matcher.evaluate(&criterion("donation", &yes), &json!("true")).unwrap());
        assert!(!matcher
            .evaluate(&criterion("donation", &Value::Null), &json!(false))
            .unwrap());
    }

    #[test]
    fn range_bounds_are_inclusive_and_optional() {
        assert!(range(json!(5), json!({"min": 1, "max": 10})));
        assert!(!range(json!(5), json!({"min": 10})));
        assert!(range(json!(5), json!({})));
        assert!(range(json!(10), json!({"min": 1, "max": 10})));
        assert!(range(json!(1), json!({"min": 1, "max": 10})));
        assert!(!range(json!(11), json!({"max": 10})));
        assert!(range(json!("7"), json!({"min": "5", "max": ""})));
    }

    #[test]
    fn range_rejects_absent_or_falsy_values() {
        assert!(!range(Value::Null, json!({})));
        assert!(!range(json!(0), json!({"max": 10})));
        assert!(!range(json!(""), json!({})));
        assert!(!range(json!("many"), json!({})));
    }

    #[test]
    fn malformed_range_config_is_an_error() {
        assert!(BuiltinMatcher::Range.evaluate(&json!(3), &json!([1, 2])).is_err());
        assert_eq!(
            BuiltinMatcher::Range.evaluate(&json!(3), &json!({"min": "lots"})),
            Err(MatchError::InvalidBound {
                bound: "min",
                value: json!("lots")
            })
        );
    }

    #[test]
    fn list_in_accepts_arrays_and_comma_strings() {
        assert!(list_in(json!("bar"), json!(["foo", "bar"])));
        assert!(list_in(json!("bar"), json!("foo, bar")));
        assert!(list_in(json!(" bar "), json!([" bar"])));
        assert!(!list_in(json!("qux"), json!(["foo", "bar"])));
    }

    #[test]
    fn list_in_with_array_value_matches_on_any_overlap() {
        assert!(list_in(json!([4, 9]), json!("9,12")));
        assert!(list_in(json!(["x", "baz"]), json!(["foo", "baz"])));
        assert!(!list_in(json!(["x", "y"]), json!(["foo", "baz"])));
        assert!(!list_in(json!([]), json!(["foo"])));
    }

    #[test]
    fn list_in_with_empty_list_never_matches() {
        assert!(!list_in(json!("foo"), json!([])));
        assert!(!list_in(json!("foo"), json!("")));
        assert!(!list_in(json!("foo"), Value::Null));
    }

    #[test]
    fn list_not_in_never_excludes_on_missing_signal() {
        assert!(list_not_in(json!(""), json!([])));
        assert!(list_not_in(Value::Null, json!(["foo"])));
        assert!(list_not_in(json!([]), json!(["foo"])));
        assert!(list_not_in(json!("foo"), json!("")));
    }

    #[test]
    fn list_not_in_is_complement_otherwise() {
        assert!(!list_not_in(json!("google.com"), json!("google.com, bing.com")));
        assert!(list_not_in(json!("duckduckgo.com"), json!(["google.com"])));
    }

    #[test]
    fn malformed_list_config_is_an_error() {
        assert!(BuiltinMatcher::ListIn
            .evaluate(&json!("foo"), &json!({"foo": 1}))
            .is_err());
        assert!(BuiltinMatcher::ListNotIn
            .evaluate(&json!("foo"), &json!(3))
            .is_err());
    }

    #[test]
    fn custom_matcher_receives_criterion_and_config() {
        let matcher = Matcher::custom(|criterion, config| {
            criterion.id == "articles_read"
                && criterion.value.as_u64().unwrap_or(0) * 2 == config.as_u64().unwrap_or(1)
        });
        let four = json!(4);
        assert!(matcher.evaluate(&criterion("articles_read", &four), &json!(8)).unwrap());
        assert!(!matcher.evaluate(&criterion("articles_read", &four), &json!(9)).unwrap());
        assert!(!matcher.evaluate(&criterion("pageviews", &four), &json!(8)).unwrap());
    }
}
