/// Page-render flow: seeded attributes, segment resolution and frequency gating
///
/// Run with: cargo test --test prompt_flow_tests
use campaign_gate::attributes::keys;
use campaign_gate::frequency::{HideReason, Visibility};
use campaign_gate::{
    best_priority_segment, evaluate_page, mark_seen, register_builtin_criteria, seed_store,
    AttributeStore, CriteriaRegistry, FrequencyPolicy, MemoryStore, Prompt, ReaderSummary,
    ResetPeriod, SegmentSet,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

const SEGMENTS: &str = r#"{
    "everyone": {"priority": 10, "criteria": []},
    "donors": {"priority": 0, "criteria": [{"criteria_id": "donation", "value": true}]},
    "heavy_readers": {"priority": 5, "criteria": [{"criteria_id": "articles_read", "value": {"min": 10}}]}
}"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 20, 18, 0, 0).unwrap()
}

fn registry() -> CriteriaRegistry {
    let mut registry = CriteriaRegistry::new();
    register_builtin_criteria(&mut registry);
    registry
}

fn monthly(start: u64, between: u64, max: u64) -> FrequencyPolicy {
    FrequencyPolicy {
        start,
        between,
        max,
        reset_period: ResetPeriod::Month,
    }
}

#[test]
fn test_donor_segment_beats_catch_all() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    seed_store(
        &mut store,
        &ReaderSummary {
            reader_id: "r1".into(),
            articles_read_recently: 3,
            is_donor: true,
            ..Default::default()
        },
    )
    .unwrap();

    let best = best_priority_segment(&segments, &mut registry, &store).unwrap();
    assert_eq!(best.id, "donors");
}

#[test]
fn test_non_donor_falls_through_to_catch_all() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    store.set(keys::IS_DONOR, json!(false)).unwrap();
    store.set(keys::ARTICLES_READ, json!(2)).unwrap();

    let best = best_priority_segment(&segments, &mut registry, &store).unwrap();
    assert_eq!(best.id, "everyone");
}

#[test]
fn test_donation_in_same_session_updates_segment() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    store.set(keys::IS_DONOR, json!(false)).unwrap();

    let before = best_priority_segment(&segments, &mut registry, &store).map(|s| s.id.clone());
    store.set(keys::IS_DONOR, json!(true)).unwrap();
    let after = best_priority_segment(&segments, &mut registry, &store).map(|s| s.id.clone());

    assert_eq!(before.as_deref(), Some("everyone"));
    assert_eq!(after.as_deref(), Some("donors"));
}

#[test]
fn test_start_threshold_scenario() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    let prompts = [Prompt::new("overlay", monthly(2, 0, 0))];

    let first = evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    assert_eq!(
        first.prompts[0].visibility,
        Visibility::Hidden(HideReason::NotEnoughPageviews)
    );

    evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    let third = evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    assert_eq!(third.prompts[0].visibility, Visibility::Shown);
    assert_eq!(third.segment_id.as_deref(), Some("everyone"));
}

#[test]
fn test_max_one_per_month_hides_after_seen() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    store.set(keys::IS_DONOR, json!(true)).unwrap();
    let prompts = [Prompt::new("donate-thanks", monthly(0, 0, 1)).with_segments(["donors"])];

    let page = evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    assert_eq!(page.shown().collect::<Vec<_>>(), vec!["donate-thanks"]);
    mark_seen(&mut store, "donate-thanks", now()).unwrap();

    let later = now() + Duration::days(2);
    let page = evaluate_page(&mut registry, &segments, &mut store, &prompts, later);
    assert_eq!(page.segment_id.as_deref(), Some("donors"));
    assert_eq!(
        page.prompts[0].visibility,
        Visibility::Hidden(HideReason::MaxReached)
    );
}

#[test]
fn test_prompt_restricted_to_other_segment_is_hidden() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    let prompts = [
        Prompt::new("for-donors", monthly(0, 0, 0)).with_segments(["donors"]),
        Prompt::new("for-all", monthly(0, 0, 0)),
    ];

    let page = evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    assert_eq!(
        page.prompts[0].visibility,
        Visibility::Hidden(HideReason::SegmentMismatch)
    );
    assert_eq!(page.prompts[1].visibility, Visibility::Shown);
}

#[test]
fn test_pageviews_counted_once_per_page() {
    let segments = SegmentSet::new();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    let prompts = [
        Prompt::new("a", monthly(0, 0, 0)),
        Prompt::new("b", monthly(0, 0, 0)),
        Prompt::new("c", monthly(0, 0, 0)),
    ];

    evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    evaluate_page(&mut registry, &segments, &mut store, &prompts, now());

    let stored = store.get(keys::PAGEVIEWS).unwrap().unwrap();
    assert_eq!(stored["day"]["count"], json!(2));
    assert_eq!(stored["week"]["count"], json!(2));
    assert_eq!(stored["month"]["count"], json!(2));
}

#[test]
fn test_heavy_reader_outranks_catch_all_but_not_donor() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    store.set(keys::ARTICLES_READ, json!(12)).unwrap();
    store.set(keys::IS_DONOR, json!(false)).unwrap();

    let best = best_priority_segment(&segments, &mut registry, &store).unwrap();
    assert_eq!(best.id, "heavy_readers");

    store.set(keys::IS_DONOR, json!(true)).unwrap();
    let best = best_priority_segment(&segments, &mut registry, &store).unwrap();
    assert_eq!(best.id, "donors");
}

#[test]
fn test_shared_registry_resolves_each_reader_separately() {
    let segments = SegmentSet::from_json(SEGMENTS).unwrap();
    let mut registry = registry();
    let prompts = [Prompt::new("donate-thanks", monthly(0, 0, 0)).with_segments(["donors"])];

    let mut donor = MemoryStore::new();
    donor.set(keys::IS_DONOR, json!(true)).unwrap();
    let mut reader = MemoryStore::new();
    reader.set(keys::IS_DONOR, json!(false)).unwrap();

    let donor_page = evaluate_page(&mut registry, &segments, &mut donor, &prompts, now());
    let reader_page = evaluate_page(&mut registry, &segments, &mut reader, &prompts, now());

    assert_eq!(donor_page.segment_id.as_deref(), Some("donors"));
    assert_eq!(donor_page.prompts[0].visibility, Visibility::Shown);
    assert_eq!(reader_page.segment_id.as_deref(), Some("everyone"));
    assert_eq!(
        reader_page.prompts[0].visibility,
        Visibility::Hidden(HideReason::SegmentMismatch)
    );
}

#[test]
fn test_corrupt_pageview_counters_recover() {
    let segments = SegmentSet::new();
    let mut registry = registry();
    let mut store = MemoryStore::new();
    store.set(keys::PAGEVIEWS, json!({"day": "broken"})).unwrap();
    let prompts = [Prompt::new("overlay", monthly(0, 0, 0))];

    let page = evaluate_page(&mut registry, &segments, &mut store, &prompts, now());
    assert_eq!(page.prompts[0].visibility, Visibility::Shown);

    let stored = store.get(keys::PAGEVIEWS).unwrap().unwrap();
    assert_eq!(stored["month"]["count"], json!(1));
}
