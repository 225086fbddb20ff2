use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        conversion_error, format_date, format_datetime, parse_date, parse_datetime, split_ids,
    },
    models::{ReaderEvent, ReaderEventKind, ReaderRecord, ReaderSummary},
};

/// Inserts the reader with `created_at = today`, or bumps `updated_at` when it
/// already exists. Runs on the caller's connection so the aggregator can batch
/// it into one transaction.
pub(crate) fn upsert_reader(conn: &Connection, reader_id: &str, today: NaiveDate) -> Result<()> {
    let today = format_date(&today);
    conn.execute(
        "INSERT INTO readers (reader_id, created_at, updated_at)
         VALUES (?1, ?2, ?2)
         ON CONFLICT(reader_id) DO UPDATE SET updated_at = excluded.updated_at",
        params![reader_id, today],
    )
    .with_context(|| format!("failed to upsert reader {reader_id}"))?;
    Ok(())
}

/// Creates the reader row if missing without touching `updated_at`, which
/// tracks visits only.
fn ensure_reader(conn: &Connection, reader_id: &str, today: NaiveDate) -> Result<()> {
    let today = format_date(&today);
    conn.execute(
        "INSERT OR IGNORE INTO readers (reader_id, created_at, updated_at)
         VALUES (?1, ?2, ?2)",
        params![reader_id, today],
    )
    .with_context(|| format!("failed to create reader {reader_id}"))?;
    Ok(())
}

fn row_to_event(row: &Row) -> Result<ReaderEvent, rusqlite::Error> {
    let kind: String = row.get("kind")?;
    let occurred_at: String = row.get("occurred_at")?;

    Ok(ReaderEvent {
        kind: ReaderEventKind::parse(&kind)
            .ok_or_else(|| conversion_error(anyhow!("unknown reader event kind {kind}")))?,
        amount: row.get("amount")?,
        occurred_at: parse_datetime(&occurred_at, "occurred_at").map_err(conversion_error)?,
    })
}

fn load_reader(conn: &Connection, reader_id: &str) -> Result<Option<ReaderRecord>> {
    let header = conn
        .query_row(
            "SELECT reader_id, created_at, updated_at, bound_user_id
             FROM readers
             WHERE reader_id = ?1",
            params![reader_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((reader_id, created_at, updated_at, bound_user_id)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT kind, amount, occurred_at
         FROM reader_events
         WHERE reader_id = ?1
         ORDER BY occurred_at ASC, id ASC",
    )?;
    let events = stmt
        .query_map(params![reader_id], row_to_event)?
        .collect::<Result<Vec<_>, _>>()?;

    let (donation_events, subscription_events) = events
        .into_iter()
        .partition(|event| event.kind == ReaderEventKind::Donation);

    Ok(Some(ReaderRecord {
        created_at: parse_date(&created_at, "created_at")?,
        updated_at: parse_date(&updated_at, "updated_at")?,
        reader_id,
        bound_user_id,
        donation_events,
        subscription_events,
    }))
}

impl Database {
    pub async fn get_reader(&self, reader_id: &str) -> Result<Option<ReaderRecord>> {
        let reader_id = reader_id.to_string();
        self.execute(move |conn| load_reader(conn, &reader_id)).await
    }

    pub async fn reader_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM readers", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    /// Binds the reader to an authenticated user. Only the first binding is
    /// kept; returns `false` when the reader was already bound or is unknown.
    pub async fn bind_user(&self, reader_id: &str, user_id: &str) -> Result<bool> {
        let reader_id = reader_id.to_string();
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE readers
                 SET bound_user_id = ?1
                 WHERE reader_id = ?2 AND bound_user_id IS NULL",
                params![user_id, reader_id],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn record_donation(
        &self,
        reader_id: &str,
        amount: Option<f64>,
        occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        self.record_event(reader_id, ReaderEventKind::Donation, amount, occurred_at)
            .await
    }

    pub async fn record_subscription(
        &self,
        reader_id: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        self.record_event(reader_id, ReaderEventKind::Subscription, None, occurred_at)
            .await
    }

    async fn record_event(
        &self,
        reader_id: &str,
        kind: ReaderEventKind,
        amount: Option<f64>,
        occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        let reader_id = reader_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            ensure_reader(&tx, &reader_id, occurred_at.date_naive())?;
            tx.execute(
                "INSERT INTO reader_events (reader_id, kind, amount, occurred_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![reader_id, kind.as_str(), amount, format_datetime(&occurred_at)],
            )
            .with_context(|| format!("failed to record {} event", kind.as_str()))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Builds the counters the attribute store is seeded with. `recent_days`
    /// bounds the `articles_read_recently` window (inclusive lower bound).
    pub async fn reader_summary(
        &self,
        reader_id: &str,
        now: DateTime<Utc>,
        recent_days: i64,
    ) -> Result<ReaderSummary> {
        let reader_id = reader_id.to_string();
        let since = format_datetime(&(now - Duration::days(recent_days)));
        self.execute(move |conn| {
            let record = load_reader(conn, &reader_id)?;

            let mut stmt = conn.prepare(
                "SELECT category_ids, occurred_at
                 FROM reader_visits
                 WHERE reader_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![reader_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut articles_read_recently = 0;
            let mut category_counts: HashMap<i64, u64> = HashMap::new();
            for (category_ids, occurred_at) in &rows {
                if occurred_at.as_str() >= since.as_str() {
                    articles_read_recently += 1;
                }
                for category in split_ids(category_ids)? {
                    *category_counts.entry(category).or_insert(0) += 1;
                }
            }

            let mut ranked: Vec<(i64, u64)> = category_counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            Ok(ReaderSummary {
                articles_read: rows.len() as u64,
                articles_read_recently,
                favorite_categories: ranked.into_iter().map(|(id, _)| id).collect(),
                is_donor: record.as_ref().map(ReaderRecord::is_donor).unwrap_or(false),
                is_subscriber: record
                    .as_ref()
                    .map(ReaderRecord::is_subscriber)
                    .unwrap_or(false),
                bound_user_id: record.and_then(|r| r.bound_user_id),
                reader_id,
            })
        })
        .await
    }
}
