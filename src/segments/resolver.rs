use crate::attributes::AttributeStore;
use crate::criteria::CriteriaRegistry;

use super::config::{Segment, SegmentSet};

/// Clauses whose criterion is unknown or unresolvable are dropped from the AND.
/// A segment with no clauses at all is a catch-all and always matches; a
/// segment whose every clause was dropped matches nothing.
pub fn segment_matches(
    segment: &Segment,
    registry: &mut CriteriaRegistry,
    store: &dyn AttributeStore,
) -> bool {
    if segment.criteria.is_empty() {
        return true;
    }

    let mut resolved = 0;
    for clause in &segment.criteria {
        match registry.evaluate(&clause.criteria_id, &clause.value, store) {
            Some(false) => return false,
            Some(true) => resolved += 1,
            None => {}
        }
    }
    resolved > 0
}

/// Every matching segment, best first: ascending priority, then registration
/// order.
pub fn matching_segments<'a>(
    segments: &'a SegmentSet,
    registry: &mut CriteriaRegistry,
    store: &dyn AttributeStore,
) -> Vec<&'a Segment> {
    let mut matches: Vec<&Segment> = segments
        .iter()
        .filter(|segment| segment_matches(segment, registry, store))
        .collect();
    matches.sort_by_key(|segment| (segment.priority, segment.sequence));
    matches
}

/// The single segment a reader falls into, or `None`. Lowest priority number
/// wins.
pub fn best_priority_segment<'a>(
    segments: &'a SegmentSet,
    registry: &mut CriteriaRegistry,
    store: &dyn AttributeStore,
) -> Option<&'a Segment> {
    matching_segments(segments, registry, store).into_iter().next()
}
