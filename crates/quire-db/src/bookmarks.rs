//! Bookmark store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use quire_core::{
    BookmarkRecord, CreateBookmarkRequest, EntityStore, Error, OwnerId, Result,
    UpdateBookmarkRequest,
};

const BOOKMARK_COLUMNS: &str =
    "id, owner_id, title, url, description, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of `EntityStore<BookmarkRecord>`.
#[derive(Clone)]
pub struct PgBookmarkStore {
    pool: Pool<Postgres>,
}

impl PgBookmarkStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row_to_bookmark(row: PgRow) -> BookmarkRecord {
    BookmarkRecord {
        id: row.get("id"),
        owner_id: OwnerId::new(row.get("owner_id")),
        title: row.get("title"),
        url: row.get("url"),
        description: row.get("description"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl EntityStore<BookmarkRecord> for PgBookmarkStore {
    async fn insert(
        &self,
        owner: OwnerId,
        req: &CreateBookmarkRequest,
        now: DateTime<Utc>,
    ) -> Result<BookmarkRecord> {
        let query = format!(
            "INSERT INTO bookmark (id, owner_id, title, url, description, created_at_utc, updated_at_utc) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {}",
            BOOKMARK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(owner.as_uuid())
            .bind(&req.title)
            .bind(&req.url)
            .bind(&req.description)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(map_row_to_bookmark(row))
    }

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<BookmarkRecord>> {
        let query = format!(
            "SELECT {} FROM bookmark WHERE id = $1 AND owner_id = $2",
            BOOKMARK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(map_row_to_bookmark))
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<BookmarkRecord>> {
        let query = format!(
            "SELECT {} FROM bookmark WHERE owner_id = $1 ORDER BY updated_at_utc DESC, id DESC",
            BOOKMARK_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_row_to_bookmark).collect())
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &UpdateBookmarkRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<BookmarkRecord>> {
        let mut updates: Vec<String> =
            vec!["updated_at_utc = GREATEST(updated_at_utc, $1)".to_string()];
        let mut param_idx = 4;

        if req.title.is_some() {
            updates.push(format!("title = ${}", param_idx));
            param_idx += 1;
        }
        if req.url.is_some() {
            updates.push(format!("url = ${}", param_idx));
            param_idx += 1;
        }
        // Some(None) clears the description.
        if req.description.is_some() {
            updates.push(format!("description = ${}", param_idx));
        }

        let query = format!(
            "UPDATE bookmark SET {} WHERE id = $2 AND owner_id = $3 RETURNING {}",
            updates.join(", "),
            BOOKMARK_COLUMNS
        );

        let mut q = sqlx::query(&query).bind(now).bind(id).bind(owner.as_uuid());
        if let Some(title) = &req.title {
            q = q.bind(title);
        }
        if let Some(url) = &req.url {
            q = q.bind(url);
        }
        if let Some(description) = &req.description {
            q = q.bind(description);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(map_row_to_bookmark))
    }

    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookmark WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
