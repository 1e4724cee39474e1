//! Note store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use quire_core::{
    CreateNoteRequest, EntityStore, Error, NoteRecord, OwnerId, Result, UpdateNoteRequest,
};

const NOTE_COLUMNS: &str =
    "id, owner_id, title, content, is_pinned, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of `EntityStore<NoteRecord>`.
#[derive(Clone)]
pub struct PgNoteStore {
    pool: Pool<Postgres>,
}

impl PgNoteStore {
    /// Create a new PgNoteStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row_to_note(row: PgRow) -> NoteRecord {
    NoteRecord {
        id: row.get("id"),
        owner_id: OwnerId::new(row.get("owner_id")),
        title: row.get("title"),
        content: row.get("content"),
        is_pinned: row.get("is_pinned"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl EntityStore<NoteRecord> for PgNoteStore {
    async fn insert(
        &self,
        owner: OwnerId,
        req: &CreateNoteRequest,
        now: DateTime<Utc>,
    ) -> Result<NoteRecord> {
        let query = format!(
            "INSERT INTO note (id, owner_id, title, content, is_pinned, created_at_utc, updated_at_utc) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {}",
            NOTE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(owner.as_uuid())
            .bind(&req.title)
            .bind(&req.content)
            .bind(req.is_pinned)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(map_row_to_note(row))
    }

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<NoteRecord>> {
        let query = format!(
            "SELECT {} FROM note WHERE id = $1 AND owner_id = $2",
            NOTE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(map_row_to_note))
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<NoteRecord>> {
        let query = format!(
            "SELECT {} FROM note WHERE owner_id = $1 \
             ORDER BY is_pinned DESC, updated_at_utc DESC, created_at_utc DESC, id DESC",
            NOTE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_row_to_note).collect())
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &UpdateNoteRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<NoteRecord>> {
        let mut updates: Vec<String> =
            vec!["updated_at_utc = GREATEST(updated_at_utc, $1)".to_string()];
        // $1 = now, $2 = id, $3 = owner, then dynamic params start at $4
        let mut param_idx = 4;

        if req.title.is_some() {
            updates.push(format!("title = ${}", param_idx));
            param_idx += 1;
        }
        if req.content.is_some() {
            updates.push(format!("content = ${}", param_idx));
            param_idx += 1;
        }
        if req.is_pinned.is_some() {
            updates.push(format!("is_pinned = ${}", param_idx));
        }

        let query = format!(
            "UPDATE note SET {} WHERE id = $2 AND owner_id = $3 RETURNING {}",
            updates.join(", "),
            NOTE_COLUMNS
        );

        let mut q = sqlx::query(&query).bind(now).bind(id).bind(owner.as_uuid());
        if let Some(title) = &req.title {
            q = q.bind(title);
        }
        if let Some(content) = &req.content {
            q = q.bind(content);
        }
        if let Some(is_pinned) = req.is_pinned {
            q = q.bind(is_pinned);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(map_row_to_note))
    }

    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM note WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
