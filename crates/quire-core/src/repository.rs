//! Tagged entity repositories.
//!
//! [`EntityRepository`] composes an [`EntityStore`] with the tag resolver and
//! reconciler to produce the "record with tags" view. The note, bookmark and
//! task repositories are instantiations of it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::tags::{normalize_tag_names, AssociationReconciler, ReconcileOutcome, TagResolver};
use crate::traits::{EntityStore, LinkStore};

/// Repository for notes.
pub type NoteRepository = EntityRepository<NoteRecord>;

/// Repository for bookmarks.
pub type BookmarkRepository = EntityRepository<BookmarkRecord>;

/// Repository for tasks.
pub type TaskRepository = EntityRepository<TaskRecord>;

/// CRUD plus tag reconciliation for one tagged record type.
pub struct EntityRepository<R: TaggedRecord> {
    store: Arc<dyn EntityStore<R>>,
    links: Arc<dyn LinkStore>,
    resolver: TagResolver,
    reconciler: AssociationReconciler,
}

impl<R: TaggedRecord> Clone for EntityRepository<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            links: self.links.clone(),
            resolver: self.resolver.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}

impl<R: TaggedRecord> EntityRepository<R> {
    pub fn new(
        store: Arc<dyn EntityStore<R>>,
        links: Arc<dyn LinkStore>,
        resolver: TagResolver,
    ) -> Self {
        let reconciler = AssociationReconciler::new(links.clone());
        Self {
            store,
            links,
            resolver,
            reconciler,
        }
    }

    /// All of the owner's records in listing order, tags loaded in one batch.
    pub async fn list(&self, owner: OwnerId) -> Result<Vec<Tagged<R>>> {
        let start = Instant::now();
        let mut records = self.store.list(owner).await?;
        records.sort_by(R::listing_cmp);

        let ids: Vec<Uuid> = records.iter().map(R::id).collect();
        let mut names = self.links.tag_names(owner, R::KIND, &ids).await?;

        let tagged: Vec<Tagged<R>> = records
            .into_iter()
            .map(|record| {
                let tags = names.remove(&record.id()).unwrap_or_default();
                Tagged { record, tags }
            })
            .collect();

        debug!(
            subsystem = "core",
            component = R::KIND.as_str(),
            op = "list",
            owner_id = %owner,
            result_count = tagged.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed records"
        );
        Ok(tagged)
    }

    /// One record with its tags.
    pub async fn get(&self, owner: OwnerId, id: Uuid) -> Result<Tagged<R>> {
        let record = self
            .store
            .fetch(owner, id)
            .await?
            .ok_or_else(|| not_found::<R>(id))?;
        self.with_tags(owner, record).await
    }

    /// Insert a record; when the request carries tags (even none), resolve and
    /// reconcile them. Omitted tags skip reconciliation entirely.
    pub async fn create(&self, owner: OwnerId, mut req: R::Create) -> Result<Tagged<R>> {
        req.prepare()?;
        let names = Self::prepare_tags(req.take_tags())?;

        let record = self.store.insert(owner, &req, Utc::now()).await?;
        info!(
            subsystem = "core",
            component = R::KIND.as_str(),
            op = "create",
            owner_id = %owner,
            entity_id = %record.id(),
            "Created record"
        );

        match names {
            Some(names) => {
                self.apply_tags(owner, record.id(), &names).await?;
                self.with_tags(owner, record).await
            }
            None => Ok(Tagged {
                record,
                tags: Vec::new(),
            }),
        }
    }

    /// Apply present fields, bump `updated_at_utc`, and reconcile tags when
    /// the request carries them.
    pub async fn update(&self, owner: OwnerId, id: Uuid, mut req: R::Update) -> Result<Tagged<R>> {
        req.prepare()?;
        let names = Self::prepare_tags(req.take_tags())?;

        let record = self
            .store
            .update(owner, id, &req, Utc::now())
            .await?
            .ok_or_else(|| not_found::<R>(id))?;

        if let Some(names) = names {
            self.apply_tags(owner, id, &names).await?;
        }
        debug!(
            subsystem = "core",
            component = R::KIND.as_str(),
            op = "update",
            owner_id = %owner,
            entity_id = %id,
            "Updated record"
        );
        self.with_tags(owner, record).await
    }

    /// Delete a record. Its associations cascade in the store.
    pub async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<()> {
        if !self.store.delete(owner, id).await? {
            return Err(not_found::<R>(id));
        }
        info!(
            subsystem = "core",
            component = R::KIND.as_str(),
            op = "delete",
            owner_id = %owner,
            entity_id = %id,
            "Deleted record"
        );
        Ok(())
    }

    /// Validate names up front so a bad tag rejects the call before any write.
    fn prepare_tags(intent: TagIntent) -> Result<Option<BTreeSet<String>>> {
        match intent {
            TagIntent::Keep => Ok(None),
            TagIntent::Replace(names) => normalize_tag_names(names.as_slice()).map(Some),
        }
    }

    async fn apply_tags(
        &self,
        owner: OwnerId,
        id: Uuid,
        names: &BTreeSet<String>,
    ) -> Result<ReconcileOutcome> {
        let desired = self.resolver.resolve_all(owner, names).await?;
        self.reconciler
            .reconcile(owner, R::KIND, id, &desired)
            .await
    }

    async fn with_tags(&self, owner: OwnerId, record: R) -> Result<Tagged<R>> {
        let id = record.id();
        let tags = self
            .links
            .tag_names(owner, R::KIND, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(Tagged { record, tags })
    }
}

fn not_found<R: TaggedRecord>(id: Uuid) -> Error {
    Error::NotFound(format!("{} {}", R::KIND, id))
}
