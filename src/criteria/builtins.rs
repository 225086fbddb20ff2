use chrono::Duration;
use serde_json::{json, Value};

use crate::attributes::{keys, AttributeStore, StoreError};

use super::matchers::BuiltinMatcher;
use super::registry::{CriteriaRegistry, ValueAccessor};

/// Views separated by more than this start a new reading session.
pub const SESSION_GAP_MINUTES: i64 = 30;

/// Registers the stock reader criteria. Callers may re-register any id
/// afterwards to override one before first use.
pub fn register_builtin_criteria(registry: &mut CriteriaRegistry) {
    registry.register("articles_read", keys::ARTICLES_READ, BuiltinMatcher::Range);
    registry.register(
        "articles_read_in_session",
        ValueAccessor::computed(articles_read_in_session),
        BuiltinMatcher::Range,
    );
    registry.register(
        "favorite_categories",
        keys::FAVORITE_CATEGORIES,
        BuiltinMatcher::ListIn,
    );
    registry.register("newsletter", keys::IS_SUBSCRIBER, BuiltinMatcher::Default);
    registry.register("donation", keys::IS_DONOR, BuiltinMatcher::Default);
    registry.register("user_account", keys::IS_LOGGED_IN, BuiltinMatcher::Default);
    registry.register("sources_to_match", keys::REFERRER, BuiltinMatcher::ListIn);
    registry.register("sources_to_exclude", keys::REFERRER, BuiltinMatcher::ListNotIn);
}

/// Article views in the current session: the trailing run of `article_view`
/// activities with no gap longer than [`SESSION_GAP_MINUTES`].
pub fn articles_read_in_session(store: &dyn AttributeStore) -> Result<Value, StoreError> {
    let mut timestamps: Vec<_> = store
        .activities(Some(keys::ACTIVITY_ARTICLE_VIEW))?
        .into_iter()
        .map(|activity| activity.timestamp)
        .collect();
    timestamps.sort();

    let gap = Duration::minutes(SESSION_GAP_MINUTES);
    let mut count = 0u64;
    let mut later = None;
    for timestamp in timestamps.iter().rev() {
        if let Some(later) = later {
            if later - *timestamp > gap {
                break;
            }
        }
        count += 1;
        later = Some(*timestamp);
    }

    Ok(json!(count))
}
