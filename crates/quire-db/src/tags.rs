//! Tag store implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use quire_core::{Error, OwnerId, Result, TagStore, TagSummary};

/// PostgreSQL implementation of [`TagStore`].
///
/// Identity is the unique index on `(owner_id, lower(name))`, so lookups and
/// inserts compare case-insensitively even for rows written outside quire.
#[derive(Clone)]
pub struct PgTagStore {
    pool: Pool<Postgres>,
}

impl PgTagStore {
    /// Create a new PgTagStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagStore for PgTagStore {
    async fn find_tag_id(&self, owner: OwnerId, normalized: &str) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM tag WHERE owner_id = $1 AND lower(name) = lower($2)",
        )
        .bind(owner.as_uuid())
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        trace!(
            subsystem = "db",
            component = "tags",
            op = "find",
            owner_id = %owner,
            hit = id.is_some(),
            "Tag lookup"
        );
        Ok(id)
    }

    async fn insert_tag(
        &self,
        owner: OwnerId,
        normalized: &str,
        color: &str,
    ) -> Result<Option<Uuid>> {
        // ON CONFLICT DO NOTHING keeps a lost race from aborting an enclosing
        // transaction; the caller re-queries on None.
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO tag (id, owner_id, name, color, created_at_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(owner.as_uuid())
        .bind(normalized)
        .bind(color)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "tags",
            op = "insert",
            owner_id = %owner,
            inserted = id.is_some(),
            "Tag insert"
        );
        Ok(id)
    }

    async fn list_tags(&self, owner: OwnerId) -> Result<Vec<TagSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.id,
                t.name,
                t.color,
                (SELECT COUNT(*) FROM note_tag nt WHERE nt.tag_id = t.id)
                  + (SELECT COUNT(*) FROM bookmark_tag bt WHERE bt.tag_id = t.id)
                  + (SELECT COUNT(*) FROM task_tag kt WHERE kt.tag_id = t.id) AS usage_count
            FROM tag t
            WHERE t.owner_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let tags = rows
            .into_iter()
            .map(|row| TagSummary {
                id: row.get("id"),
                name: row.get("name"),
                color: row.get("color"),
                usage_count: row.get("usage_count"),
            })
            .collect();

        Ok(tags)
    }
}
