use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::fs;

use crate::db::{repositories, Database, VisitRecord};
use crate::settings::GateSettings;

use super::{lock::LockMarker, log_line::parse_line};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    pub lines_read: usize,
    pub unique_lines: usize,
    pub malformed_lines: usize,
    pub readers_touched: usize,
    pub visits_inserted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationOutcome {
    Completed(AggregationReport),
    /// Another run held the lock marker.
    Skipped,
}

/// Drains the append-only visit log into `readers` / `reader_visits`.
#[derive(Clone)]
pub struct VisitLogAggregator {
    db: Database,
    log_path: PathBuf,
    lock_path: PathBuf,
    stale_lock_after: Option<Duration>,
}

impl VisitLogAggregator {
    pub fn new(db: Database, log_path: PathBuf, lock_path: PathBuf) -> Self {
        Self {
            db,
            log_path,
            lock_path,
            stale_lock_after: None,
        }
    }

    pub fn from_settings(db: Database, settings: &GateSettings) -> Self {
        Self::new(
            db,
            settings.visit_log_path.clone(),
            settings.lock_path.clone(),
        )
        .with_stale_lock_after(match settings.stale_lock_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        })
    }

    pub fn with_stale_lock_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_lock_after = stale_after;
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// One aggregation pass. `today` stamps `created_at` / `updated_at`.
    ///
    /// On a database or truncation failure the error is returned and the lock
    /// marker is still removed; the log keeps its lines for the next run.
    pub async fn run(&self, today: NaiveDate) -> Result<AggregationOutcome> {
        let Some(lock) = LockMarker::acquire(&self.lock_path, self.stale_lock_after)? else {
            log_info!(
                "Aggregation lock {} present; skipping this run",
                self.lock_path.display()
            );
            return Ok(AggregationOutcome::Skipped);
        };
        log_info!("Aggregating visit log {}", self.log_path.display());

        let (contents, log_exists) = match fs::read_to_string(&self.log_path).await {
            Ok(contents) => (contents, true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => (String::new(), false),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read visit log {}", self.log_path.display())
                })
            }
        };

        let mut report = AggregationReport::default();
        let visits = collect_visits(&contents, &mut report);

        let (readers_touched, visits_inserted) = self
            .store_visits(visits, today)
            .await
            .context("aggregation aborted; visit log left untouched")?;
        report.readers_touched = readers_touched;
        report.visits_inserted = visits_inserted;

        // Truncate rather than delete so writers holding the path keep appending.
        if log_exists {
            fs::OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.log_path)
                .await
                .with_context(|| {
                    format!("failed to truncate visit log {}", self.log_path.display())
                })?;
        }

        lock.release()?;

        log_info!(
            "Aggregated {} log lines ({} unique, {} malformed): {} readers, {} new visits",
            report.lines_read,
            report.unique_lines,
            report.malformed_lines,
            report.readers_touched,
            report.visits_inserted
        );

        Ok(AggregationOutcome::Completed(report))
    }

    async fn store_visits(
        &self,
        visits: Vec<VisitRecord>,
        today: NaiveDate,
    ) -> Result<(usize, usize)> {
        if visits.is_empty() {
            return Ok((0, 0));
        }

        self.db
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let mut readers = HashSet::new();
                let mut inserted = 0;

                for visit in &visits {
                    if readers.insert(visit.reader_id.clone()) {
                        repositories::upsert_reader(&tx, &visit.reader_id, today)?;
                    }
                    if repositories::insert_visit_if_absent(&tx, visit)? {
                        inserted += 1;
                    }
                }

                tx.commit().context("failed to commit aggregated visits")?;
                Ok((readers.len(), inserted))
            })
            .await
    }
}

/// Exact-duplicate lines collapse to one; first occurrence order is kept.
fn collect_visits(contents: &str, report: &mut AggregationReport) -> Vec<VisitRecord> {
    let mut seen = HashSet::new();
    let mut visits = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        report.lines_read += 1;
        if !seen.insert(line) {
            continue;
        }
        report.unique_lines += 1;

        match parse_line(line) {
            Ok(visit) => visits.push(visit),
            Err(err) => {
                report.malformed_lines += 1;
                log_warn!("Skipping malformed visit log line '{line}': {err:#}");
            }
        }
    }

    visits
}
