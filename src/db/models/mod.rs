pub mod reader;
pub mod visit;

pub use reader::{ReaderEvent, ReaderEventKind, ReaderRecord, ReaderSummary};
pub use visit::VisitRecord;
