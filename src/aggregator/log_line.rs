use anyhow::{anyhow, bail, Context, Result};

use crate::db::{
    helpers::{format_datetime, join_ids, parse_datetime, split_ids},
    VisitRecord,
};

const FIELD_SEPARATOR: char = ';';

/// Parses one `reader_id;occurred_at;article_id;category_ids` line.
pub fn parse_line(line: &str) -> Result<VisitRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != 4 {
        bail!("expected 4 fields, found {}", fields.len());
    }

    let reader_id = fields[0].trim();
    if reader_id.is_empty() {
        bail!("empty reader id");
    }

    let occurred_at = parse_datetime(fields[1], "occurred_at")?;
    let article_id = fields[2]
        .trim()
        .parse::<i64>()
        .map_err(|_| anyhow!("article id '{}' is not numeric", fields[2]))?;
    let category_ids = split_ids(fields[3]).context("invalid category ids")?;

    Ok(VisitRecord {
        reader_id: reader_id.to_string(),
        article_id,
        category_ids,
        occurred_at,
    })
}

/// Renders a visit as a newline-terminated log line.
pub fn format_line(visit: &VisitRecord) -> Result<String> {
    if visit.reader_id.is_empty() || visit.reader_id.contains([FIELD_SEPARATOR, '\n', '\r']) {
        bail!("reader id '{}' cannot be written to the visit log", visit.reader_id);
    }

    Ok(format!(
        "{}{sep}{}{sep}{}{sep}{}\n",
        visit.reader_id,
        format_datetime(&visit.occurred_at),
        visit.article_id,
        join_ids(&visit.category_ids),
        sep = FIELD_SEPARATOR,
    ))
}
