use serde_json::{json, Value};

use crate::db::ReaderSummary;

use super::{keys, AttributeStore, StoreError};

/// Copies durable reader counters into the attribute store before criteria
/// run for a page render.
pub fn seed_store(
    store: &mut dyn AttributeStore,
    summary: &ReaderSummary,
) -> Result<(), StoreError> {
    let entries: [(&str, Value); 6] = [
        (keys::ARTICLES_READ, json!(summary.articles_read_recently)),
        (keys::ARTICLES_READ_TOTAL, json!(summary.articles_read)),
        (keys::FAVORITE_CATEGORIES, json!(summary.favorite_categories)),
        (keys::IS_DONOR, json!(summary.is_donor)),
        (keys::IS_SUBSCRIBER, json!(summary.is_subscriber)),
        (keys::IS_LOGGED_IN, json!(summary.bound_user_id.is_some())),
    ];

    for (key, value) in entries {
        store.set(key, value)?;
    }
    Ok(())
}
