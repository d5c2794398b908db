use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::models::{EtlError, Result, SourceRecord};

/// Bounded, ordered range query over the source. Implemented by the
/// Postgres extractor; faked in tests.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches records with modification time strictly greater than `since`
    /// (ISO-8601), ascending by modification time. `limit` is a soft bound:
    /// rows tied on modification time are never split across a watermark
    /// advance, so a batch may exceed it by the size of one tie group.
    async fn fetch_modified(&self, since: &str, limit: i64) -> Result<Vec<SourceRecord>>;
}

const SELECT_COLUMNS: &str = r#"
    SELECT fw.id::text AS id,
        fw.title,
        fw.description,
        fw.rating::text AS rating,
        fw.modified,
        COALESCE(array_agg(DISTINCT g.name) FILTER (WHERE g.name IS NOT NULL), '{}') AS genres,
        COALESCE(json_agg(DISTINCT jsonb_build_object('id', p.id, 'name', p.full_name))
            FILTER (WHERE pfw.role = 'actor'), '[]'::json) AS actors,
        COALESCE(json_agg(DISTINCT jsonb_build_object('id', p.id, 'name', p.full_name))
            FILTER (WHERE pfw.role = 'writer'), '[]'::json) AS writers,
        COALESCE(json_agg(DISTINCT jsonb_build_object('id', p.id, 'name', p.full_name))
            FILTER (WHERE pfw.role = 'director'), '[]'::json) AS directors
    FROM content.film_work fw
    LEFT JOIN content.genre_film_work gfw ON fw.id = gfw.film_work_id
    LEFT JOIN content.genre g ON g.id = gfw.genre_id
    LEFT JOIN content.person_film_work pfw ON fw.id = pfw.film_work_id
    LEFT JOIN content.person p ON p.id = pfw.person_id
"#;

/// One row per film work; associations collapse into per-entity collections,
/// deduplicated by (role, person) through DISTINCT and coalesced so entities
/// with zero associations yield empty collections, never SQL nulls. Rating
/// stays text; parseability is decided during normalization.
fn range_query() -> String {
    format!(
        "{SELECT_COLUMNS} WHERE fw.modified > $1 GROUP BY fw.id ORDER BY fw.modified LIMIT $2"
    )
}

/// Fetches one complete tie group: every row sharing an exact modification
/// timestamp. Unbounded on purpose, see `fetch_modified`.
fn tie_group_query() -> String {
    format!("{SELECT_COLUMNS} WHERE fw.modified = $1 GROUP BY fw.id ORDER BY fw.id")
}

/// Decides how a full batch may end without splitting a group of rows that
/// share one modification timestamp. Returns the rows safe to process now
/// plus, when the entire batch is a single tie group, the timestamp whose
/// complete group must be fetched instead.
fn defer_trailing_ties(
    mut records: Vec<SourceRecord>,
    limit: usize,
) -> (Vec<SourceRecord>, Option<NaiveDateTime>) {
    if records.len() < limit {
        return (records, None);
    }
    let Some(last_ts) = records.last().map(|r| r.modified) else {
        return (records, None);
    };
    if records.first().map(|r| r.modified) == Some(last_ts) {
        // The batch may be a truncated view of the group; it has to be
        // re-fetched whole so the watermark never lands inside it.
        return (Vec::new(), Some(last_ts));
    }
    records.retain(|r| r.modified < last_ts);
    (records, None)
}

/// Read-only extractor over the relational source. No side effects beyond
/// the query; never touches the watermark.
#[derive(Clone)]
pub struct FilmworkExtractor {
    pool: PgPool,
}

impl FilmworkExtractor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_watermark(since: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(since, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| EtlError::Watermark(format!("Unparseable watermark {:?}: {}", since, e)))
    }

    fn map_row(row: &PgRow) -> Result<SourceRecord> {
        let actors: serde_json::Value = row.try_get("actors")?;
        let writers: serde_json::Value = row.try_get("writers")?;
        let directors: serde_json::Value = row.try_get("directors")?;
        Ok(SourceRecord {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            rating: row.try_get("rating")?,
            modified: row.try_get("modified")?,
            genres: row.try_get("genres")?,
            actors: serde_json::from_value(actors)?,
            writers: serde_json::from_value(writers)?,
            directors: serde_json::from_value(directors)?,
        })
    }
}

#[async_trait]
impl RecordSource for FilmworkExtractor {
    async fn fetch_modified(&self, since: &str, limit: i64) -> Result<Vec<SourceRecord>> {
        let since_ts = Self::parse_watermark(since)?;

        let rows = sqlx::query(&range_query())
            .bind(since_ts)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(Self::map_row(row)?);
        }

        // A full batch may end mid-way through a group of rows sharing one
        // modification timestamp. Advancing the watermark there would skip
        // the unfetched remainder of the group.
        let (mut records, refetch_ts) = defer_trailing_ties(records, limit as usize);
        if let Some(tie_ts) = refetch_ts {
            let rows = sqlx::query(&tie_group_query())
                .bind(tie_ts)
                .fetch_all(&self.pool)
                .await?;
            records = Vec::with_capacity(rows.len());
            for row in &rows {
                records.push(Self::map_row(row)?);
            }
        }

        tracing::debug!(since = since, count = records.len(), "Extracted modified film works");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watermark_without_fraction() {
        let ts = FilmworkExtractor::parse_watermark("2024-01-01T00:00:00").unwrap();
        assert_eq!(ts.format("%Y-%m-%dT%H:%M:%S").to_string(), "2024-01-01T00:00:00");
    }

    #[test]
    fn parses_watermark_with_microseconds() {
        FilmworkExtractor::parse_watermark("2024-01-01T12:30:00.123456").unwrap();
    }

    #[test]
    fn rejects_garbage_watermark() {
        let err = FilmworkExtractor::parse_watermark("not-a-timestamp").unwrap_err();
        assert!(err.to_string().contains("Unparseable watermark"));
    }

    #[test]
    fn queries_bind_watermark_and_limit() {
        assert!(range_query().contains("fw.modified > $1"));
        assert!(range_query().contains("LIMIT $2"));
        assert!(tie_group_query().contains("fw.modified = $1"));
    }

    fn record(id: &str, modified: &str) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            title: Some(format!("title {}", id)),
            description: None,
            rating: None,
            modified: NaiveDateTime::parse_from_str(modified, "%Y-%m-%dT%H:%M:%S").unwrap(),
            genres: vec![],
            actors: vec![],
            writers: vec![],
            directors: vec![],
        }
    }

    #[test]
    fn under_full_batch_keeps_every_row() {
        let batch = vec![
            record("1", "2024-01-01T00:00:00"),
            record("2", "2024-01-01T00:00:00"),
        ];
        let (kept, refetch) = defer_trailing_ties(batch, 3);
        assert_eq!(kept.len(), 2);
        assert!(refetch.is_none());
    }

    #[test]
    fn full_batch_defers_the_trailing_tie_group() {
        let batch = vec![
            record("1", "2024-01-01T00:00:00"),
            record("2", "2024-01-02T00:00:00"),
            record("3", "2024-01-02T00:00:00"),
        ];
        let (kept, refetch) = defer_trailing_ties(batch, 3);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "1");
        assert!(refetch.is_none());
    }

    #[test]
    fn full_batch_of_one_tie_group_requests_an_exact_refetch() {
        let batch = vec![
            record("1", "2024-01-01T00:00:00"),
            record("2", "2024-01-01T00:00:00"),
        ];
        let tie_ts = batch[0].modified;
        let (kept, refetch) = defer_trailing_ties(batch, 2);
        assert!(kept.is_empty());
        assert_eq!(refetch, Some(tie_ts));
    }
}
