//! Core traits for quire abstractions.
//!
//! These traits describe the relational store the repositories run against.
//! `quire-db` implements them on PostgreSQL; [`crate::memory::MemoryStore`]
//! implements them in memory for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::tags::ReconcileOutcome;

// =============================================================================
// TAG STORE
// =============================================================================

/// Owner-scoped tag rows, unique on `(owner_id, lower(name))`.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Look up a tag by its normalised name.
    async fn find_tag_id(&self, owner: OwnerId, normalized: &str) -> Result<Option<Uuid>>;

    /// Insert a tag row.
    ///
    /// When another caller already holds the name the store reports it either
    /// as `Ok(None)` (insert-or-nothing) or as a conflict error
    /// (see [`crate::Error::is_conflict`]). Both mean "lost the race".
    async fn insert_tag(&self, owner: OwnerId, normalized: &str, color: &str)
        -> Result<Option<Uuid>>;

    /// All tags of the owner ordered by name, with usage counts.
    async fn list_tags(&self, owner: OwnerId) -> Result<Vec<TagSummary>>;
}

// =============================================================================
// LINK STORE
// =============================================================================

/// Entity-tag association rows, unique on `(entity_id, tag_id)`.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Tag ids currently attached to an entity.
    async fn linked_tag_ids(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<HashSet<Uuid>>;

    /// Remove every association of an entity. Returns rows deleted.
    async fn clear_links(&self, owner: OwnerId, kind: EntityKind, entity_id: Uuid) -> Result<u64>;

    /// Delete `remove` then insert `add` for one entity and report the rows
    /// actually written.
    ///
    /// Fails with [`crate::Error::NotFound`] and writes nothing when the
    /// entity or any tag in `add` does not belong to `owner`. Stores with
    /// transactions apply both in one transaction.
    async fn apply_link_diff(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
        remove: &[Uuid],
        add: &[Uuid],
    ) -> Result<ReconcileOutcome>;

    /// Tag names for many entities in one round trip, each list sorted.
    /// Entities without tags may be absent from the map.
    async fn tag_names(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>>;
}

// =============================================================================
// ENTITY STORES
// =============================================================================

/// Row-level CRUD for one tagged record type. Every call is owner scoped.
#[async_trait]
pub trait EntityStore<R: TaggedRecord>: Send + Sync {
    async fn insert(&self, owner: OwnerId, req: &R::Create, now: DateTime<Utc>) -> Result<R>;

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<R>>;

    async fn list(&self, owner: OwnerId) -> Result<Vec<R>>;

    /// Apply the present fields and bump `updated_at_utc` to
    /// `max(updated_at_utc, now)`. `None` when the row is absent.
    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &R::Update,
        now: DateTime<Utc>,
    ) -> Result<Option<R>>;

    /// Delete the row; associations cascade. `false` when the row is absent.
    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool>;
}
