//! Entity-tag association store.
//!
//! Each entity kind has its own association table (`note_tag`,
//! `bookmark_tag`, `task_tag`) keyed by `(<entity>_id, tag_id)`. Every
//! statement joins through `tag` so one owner can never read or write
//! another owner's links. Diffs that name a foreign entity or tag are
//! rejected with `NotFound` before anything is written.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use quire_core::{EntityKind, Error, LinkStore, OwnerId, ReconcileOutcome, Result};

/// Table layout for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkTable {
    pub entity_table: &'static str,
    pub link_table: &'static str,
    pub entity_column: &'static str,
}

impl LinkTable {
    pub(crate) fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Note => Self {
                entity_table: "note",
                link_table: "note_tag",
                entity_column: "note_id",
            },
            EntityKind::Bookmark => Self {
                entity_table: "bookmark",
                link_table: "bookmark_tag",
                entity_column: "bookmark_id",
            },
            EntityKind::Task => Self {
                entity_table: "task",
                link_table: "task_tag",
                entity_column: "task_id",
            },
        }
    }
}

/// PostgreSQL implementation of [`LinkStore`].
#[derive(Clone)]
pub struct PgLinkStore {
    pool: Pool<Postgres>,
}

impl PgLinkStore {
    /// Create a new PgLinkStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn linked_tag_ids(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<HashSet<Uuid>> {
        let t = LinkTable::of(kind);
        let sql = format!(
            "SELECT l.tag_id FROM {link} l JOIN tag t ON t.id = l.tag_id \
             WHERE l.{col} = $1 AND t.owner_id = $2",
            link = t.link_table,
            col = t.entity_column,
        );

        let ids: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(entity_id)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(ids.into_iter().collect())
    }

    async fn clear_links(&self, owner: OwnerId, kind: EntityKind, entity_id: Uuid) -> Result<u64> {
        let t = LinkTable::of(kind);
        let sql = format!(
            "DELETE FROM {link} l USING tag t \
             WHERE l.tag_id = t.id AND l.{col} = $1 AND t.owner_id = $2",
            link = t.link_table,
            col = t.entity_column,
        );

        let result = sqlx::query(&sql)
            .bind(entity_id)
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn apply_link_diff(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
        remove: &[Uuid],
        add: &[Uuid],
    ) -> Result<ReconcileOutcome> {
        let t = LinkTable::of(kind);
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the entity and the tags so neither can be deleted before commit.
        let sql = format!(
            "SELECT id FROM {entity} WHERE id = $1 AND owner_id = $2 FOR KEY SHARE",
            entity = t.entity_table,
        );
        let entity: Option<Uuid> = sqlx::query_scalar(&sql)
            .bind(entity_id)
            .bind(owner.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if entity.is_none() {
            return Err(Error::NotFound(format!("{} {}", kind, entity_id)));
        }

        if !add.is_empty() {
            let owned: Vec<Uuid> = sqlx::query_scalar(
                "SELECT id FROM tag WHERE id = ANY($1) AND owner_id = $2 FOR KEY SHARE",
            )
            .bind(add)
            .bind(owner.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::Database)?;
            let owned: HashSet<Uuid> = owned.into_iter().collect();
            if let Some(foreign) = add.iter().find(|id| !owned.contains(id)) {
                return Err(Error::NotFound(format!("tag {}", foreign)));
            }
        }

        let mut removed = 0;
        if !remove.is_empty() {
            let sql = format!(
                "DELETE FROM {link} l USING tag t \
                 WHERE l.tag_id = t.id AND l.{col} = $1 AND l.tag_id = ANY($2) \
                   AND t.owner_id = $3",
                link = t.link_table,
                col = t.entity_column,
            );
            removed = sqlx::query(&sql)
                .bind(entity_id)
                .bind(remove)
                .bind(owner.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
        }

        let mut added = 0;
        if !add.is_empty() {
            // Links a concurrent writer already inserted are left alone.
            let sql = format!(
                "INSERT INTO {link} ({col}, tag_id) SELECT $1::uuid, unnest($2::uuid[]) \
                 ON CONFLICT DO NOTHING",
                link = t.link_table,
                col = t.entity_column,
            );
            added = sqlx::query(&sql)
                .bind(entity_id)
                .bind(add)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "links",
            op = "apply_diff",
            entity_kind = kind.as_str(),
            entity_id = %entity_id,
            links_added = added,
            links_removed = removed,
            "Link diff committed"
        );
        Ok(ReconcileOutcome {
            added: added as usize,
            removed: removed as usize,
        })
    }

    async fn tag_names(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>> {
        if entity_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let t = LinkTable::of(kind);
        let sql = format!(
            "SELECT l.{col} AS entity_id, t.name FROM {link} l JOIN tag t ON t.id = l.tag_id \
             WHERE l.{col} = ANY($1) AND t.owner_id = $2 \
             ORDER BY t.name",
            link = t.link_table,
            col = t.entity_column,
        );

        let rows = sqlx::query(&sql)
            .bind(entity_ids)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut names: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in rows {
            names
                .entry(row.get("entity_id"))
                .or_default()
                .push(row.get("name"));
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_tables_per_kind() {
        for kind in EntityKind::ALL {
            let t = LinkTable::of(kind);
            assert_eq!(t.entity_table, kind.as_str());
            assert_eq!(t.link_table, format!("{}_tag", kind.as_str()));
            assert_eq!(t.entity_column, format!("{}_id", kind.as_str()));
        }
    }
}
