use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, format_datetime, join_ids, parse_datetime, split_ids},
    models::VisitRecord,
};

/// Stores the visit unless the reader already has a row for this article.
/// Returns whether a row was inserted.
pub(crate) fn insert_visit_if_absent(conn: &Connection, visit: &VisitRecord) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO reader_visits (reader_id, article_id, category_ids, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                visit.reader_id,
                visit.article_id,
                join_ids(&visit.category_ids),
                format_datetime(&visit.occurred_at),
            ],
        )
        .with_context(|| {
            format!(
                "failed to store visit of article {} by {}",
                visit.article_id, visit.reader_id
            )
        })?;
    Ok(inserted > 0)
}

fn row_to_visit(row: &Row) -> Result<VisitRecord, rusqlite::Error> {
    let category_ids: String = row.get("category_ids")?;
    let occurred_at: String = row.get("occurred_at")?;

    Ok(VisitRecord {
        reader_id: row.get("reader_id")?,
        article_id: row.get("article_id")?,
        category_ids: split_ids(&category_ids).map_err(conversion_error)?,
        occurred_at: parse_datetime(&occurred_at, "occurred_at").map_err(conversion_error)?,
    })
}

impl Database {
    /// All stored visits of a reader, oldest first.
    pub async fn visits_for_reader(&self, reader_id: &str) -> Result<Vec<VisitRecord>> {
        let reader_id = reader_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT reader_id, article_id, category_ids, occurred_at
                 FROM reader_visits
                 WHERE reader_id = ?1
                 ORDER BY occurred_at ASC, id ASC",
            )?;

            let visits = stmt
                .query_map(params![reader_id], row_to_visit)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(visits)
        })
        .await
    }

    /// Read timestamps of a reader, used by the tier classifier.
    pub async fn read_history(&self, reader_id: &str) -> Result<Vec<DateTime<Utc>>> {
        Ok(self
            .visits_for_reader(reader_id)
            .await?
            .into_iter()
            .map(|visit| visit.occurred_at)
            .collect())
    }

    pub async fn visit_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM reader_visits", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    /// Number of distinct readers who have read the article.
    pub async fn article_reader_count(&self, article_id: i64) -> Result<u64> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reader_visits WHERE article_id = ?1",
                params![article_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
