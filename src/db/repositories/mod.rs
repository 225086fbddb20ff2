pub mod readers;
pub mod visits;

pub(crate) use readers::upsert_reader;
pub(crate) use visits::insert_visit_if_absent;
