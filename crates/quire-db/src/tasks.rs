//! Task store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use quire_core::{
    CreateTaskRequest, EntityStore, Error, OwnerId, Result, TaskPriority, TaskRecord,
    UpdateTaskRequest,
};

const TASK_COLUMNS: &str = "id, owner_id, title, description, is_completed, priority, due_date, \
                            created_at_utc, updated_at_utc";

/// PostgreSQL implementation of `EntityStore<TaskRecord>`.
///
/// `priority` is stored as text (`low`, `medium`, `high`).
#[derive(Clone)]
pub struct PgTaskStore {
    pool: Pool<Postgres>,
}

impl PgTaskStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row_to_task(row: PgRow) -> Result<TaskRecord> {
    let priority: String = row.get("priority");
    let priority: TaskPriority = priority
        .parse()
        .map_err(|_| Error::Persistence(format!("unknown task priority '{}'", priority)))?;

    Ok(TaskRecord {
        id: row.get("id"),
        owner_id: OwnerId::new(row.get("owner_id")),
        title: row.get("title"),
        description: row.get("description"),
        is_completed: row.get("is_completed"),
        priority,
        due_date: row.get("due_date"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    })
}

#[async_trait]
impl EntityStore<TaskRecord> for PgTaskStore {
    async fn insert(
        &self,
        owner: OwnerId,
        req: &CreateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<TaskRecord> {
        let query = format!(
            "INSERT INTO task (id, owner_id, title, description, is_completed, priority, due_date, \
             created_at_utc, updated_at_utc) \
             VALUES ($1, $2, $3, $4, false, $5, $6, $7, $7) RETURNING {}",
            TASK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(owner.as_uuid())
            .bind(&req.title)
            .bind(&req.description)
            .bind(req.priority.as_str())
            .bind(req.due_date)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        map_row_to_task(row)
    }

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<TaskRecord>> {
        let query = format!(
            "SELECT {} FROM task WHERE id = $1 AND owner_id = $2",
            TASK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(map_row_to_task).transpose()
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<TaskRecord>> {
        let query = format!(
            "SELECT {} FROM task WHERE owner_id = $1 \
             ORDER BY is_completed, updated_at_utc DESC, id DESC",
            TASK_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(map_row_to_task).collect()
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &UpdateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>> {
        let mut updates: Vec<String> =
            vec!["updated_at_utc = GREATEST(updated_at_utc, $1)".to_string()];
        let mut param_idx = 4;

        for (column, present) in [
            ("title", req.title.is_some()),
            ("description", req.description.is_some()),
            ("is_completed", req.is_completed.is_some()),
            ("priority", req.priority.is_some()),
            ("due_date", req.due_date.is_some()),
        ] {
            if present {
                updates.push(format!("{} = ${}", column, param_idx));
                param_idx += 1;
            }
        }

        let query = format!(
            "UPDATE task SET {} WHERE id = $2 AND owner_id = $3 RETURNING {}",
            updates.join(", "),
            TASK_COLUMNS
        );

        // Binds must follow the column order above.
        let mut q = sqlx::query(&query).bind(now).bind(id).bind(owner.as_uuid());
        if let Some(title) = &req.title {
            q = q.bind(title);
        }
        if let Some(description) = &req.description {
            q = q.bind(description);
        }
        if let Some(is_completed) = req.is_completed {
            q = q.bind(is_completed);
        }
        if let Some(priority) = req.priority {
            q = q.bind(priority.as_str());
        }
        if let Some(due_date) = req.due_date {
            q = q.bind(due_date);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(map_row_to_task).transpose()
    }

    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM task WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
