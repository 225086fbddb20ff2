//! Visit log ingestion: the writer appends read events, the aggregator drains
//! them into durable reader and visit rows under a lock marker.

pub mod job;
pub mod lock;
pub mod log_line;
pub mod scheduler;
pub mod writer;

pub use job::{AggregationOutcome, AggregationReport, VisitLogAggregator};
pub use lock::LockMarker;
pub use scheduler::AggregationController;
pub use writer::VisitLogWriter;
