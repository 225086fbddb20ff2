//! Criteria registry and matching engine.

pub mod builtins;
pub mod matchers;
pub mod registry;

pub use builtins::register_builtin_criteria;
pub use matchers::{BuiltinMatcher, CriterionValue, CustomMatcher, MatchError, Matcher};
pub use registry::{cache_key, ComputedValue, CriteriaRegistry, Criterion, ValueAccessor};
