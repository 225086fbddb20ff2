use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::db::VisitRecord;

use super::{lock::is_locked, log_line::format_line};

/// Appends read events to the visit log consumed by the aggregator.
#[derive(Debug, Clone)]
pub struct VisitLogWriter {
    log_path: PathBuf,
    lock_path: PathBuf,
}

impl VisitLogWriter {
    pub fn new(log_path: PathBuf, lock_path: PathBuf) -> Self {
        Self {
            log_path,
            lock_path,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Returns `false` without writing while an aggregation run holds the lock;
    /// the log is about to be truncated and the event would be lost anyway.
    pub fn append(&self, visit: &VisitRecord) -> Result<bool> {
        if is_locked(&self.lock_path) {
            return Ok(false);
        }

        let line = format_line(visit)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("failed to open visit log {}", self.log_path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", self.log_path.display()))?;
        Ok(true)
    }
}
