pub mod config;
pub mod resolver;

pub use config::{Segment, SegmentCriterion, SegmentDefinition, SegmentSet};
pub use resolver::{best_priority_segment, matching_segments, segment_matches};
