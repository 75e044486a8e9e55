pub mod metrics;
pub mod reachable;

pub use metrics::{collect_metrics, compare, Metrics};
pub use reachable::{ReachableIntegerValues, ReachableValuesMap};
