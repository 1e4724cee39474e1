//! Tag identity resolution and association reconciliation.
//!
//! ## Resolution
//!
//! [`TagResolver::resolve`] maps a raw name to the owner's tag id:
//! 1. Trim, validate, lower-case
//! 2. Indexed lookup on `(owner_id, lower(name))`
//! 3. Insert with the default colour if absent
//! 4. On a lost insert race, re-query once and return the winner
//!
//! ## Reconciliation
//!
//! [`AssociationReconciler::reconcile`] makes an entity's association set
//! equal a desired set of tag ids by deleting `current - desired` and
//! inserting `desired - current`. Links in the intersection are never
//! touched.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::defaults::TAG_COLOR;
use crate::error::{Error, Result};
use crate::models::{EntityKind, OwnerId};
use crate::traits::{LinkStore, TagStore};
use crate::validation::{normalize_tag_name, validate_color};

/// Normalise and dedupe a list of raw tag names.
///
/// Validates every name before returning, so callers can reject a request
/// before any write.
pub fn normalize_tag_names<S: AsRef<str>>(names: &[S]) -> Result<BTreeSet<String>> {
    names
        .iter()
        .map(|name| normalize_tag_name(name.as_ref()))
        .collect()
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves tag names to durable, owner-scoped tag ids.
#[derive(Clone)]
pub struct TagResolver {
    store: Arc<dyn TagStore>,
    default_color: String,
}

impl TagResolver {
    /// Create a resolver that assigns [`TAG_COLOR`] to new tags.
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self {
            store,
            default_color: TAG_COLOR.to_string(),
        }
    }

    /// Use a different colour for lazily created tags.
    pub fn with_default_color(mut self, color: impl Into<String>) -> Result<Self> {
        let color = color.into();
        validate_color(&color)?;
        self.default_color = color;
        Ok(self)
    }

    pub fn default_color(&self) -> &str {
        &self.default_color
    }

    /// Resolve one raw name, creating the tag on first use.
    pub async fn resolve(&self, owner: OwnerId, raw_name: &str) -> Result<Uuid> {
        let name = normalize_tag_name(raw_name)?;
        self.resolve_normalized(owner, &name).await
    }

    /// Resolve names that already went through [`normalize_tag_names`].
    pub async fn resolve_all(
        &self,
        owner: OwnerId,
        names: &BTreeSet<String>,
    ) -> Result<HashSet<Uuid>> {
        let mut ids = HashSet::with_capacity(names.len());
        for name in names {
            ids.insert(self.resolve_normalized(owner, name).await?);
        }
        Ok(ids)
    }

    async fn resolve_normalized(&self, owner: OwnerId, name: &str) -> Result<Uuid> {
        if let Some(id) = self.store.find_tag_id(owner, name).await? {
            debug!(
                subsystem = "core",
                component = "tag_resolver",
                op = "resolve",
                owner_id = %owner,
                tag_id = %id,
                "Resolved existing tag"
            );
            return Ok(id);
        }

        match self
            .store
            .insert_tag(owner, name, &self.default_color)
            .await
        {
            Ok(Some(id)) => {
                info!(
                    subsystem = "core",
                    component = "tag_resolver",
                    op = "create",
                    owner_id = %owner,
                    tag_id = %id,
                    "Created tag"
                );
                Ok(id)
            }
            Ok(None) => self.recover_lost_race(owner, name).await,
            Err(e) if e.is_conflict() => self.recover_lost_race(owner, name).await,
            Err(e) => Err(e),
        }
    }

    /// Another caller inserted the same normalised name first; fetch theirs.
    async fn recover_lost_race(&self, owner: OwnerId, name: &str) -> Result<Uuid> {
        warn!(
            subsystem = "core",
            component = "tag_resolver",
            op = "race_recovery",
            owner_id = %owner,
            "Tag insert lost a uniqueness race, re-querying"
        );
        match self.store.find_tag_id(owner, name).await {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(Error::Persistence(format!(
                "tag '{}' conflicted on insert but could not be re-read",
                name
            ))),
            Err(e) if e.is_conflict() => Err(Error::Persistence(e.to_string())),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

/// Minimal diff between current and desired association sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDiff {
    pub to_add: Vec<Uuid>,
    pub to_remove: Vec<Uuid>,
}

impl LinkDiff {
    /// Compute `desired - current` and `current - desired`, sorted.
    pub fn between(current: &HashSet<Uuid>, desired: &HashSet<Uuid>) -> Self {
        let mut to_add: Vec<Uuid> = desired.difference(current).copied().collect();
        let mut to_remove: Vec<Uuid> = current.difference(desired).copied().collect();
        to_add.sort();
        to_remove.sort();
        Self { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Rows written by one reconcile call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub removed: usize,
}

/// Applies set-reconciliation of entity-tag links.
#[derive(Clone)]
pub struct AssociationReconciler {
    store: Arc<dyn LinkStore>,
}

impl AssociationReconciler {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }

    /// Make the entity's tag set equal `desired`.
    ///
    /// An empty `desired` clears all links. Tags or an entity outside the
    /// owner's scope fail with [`Error::NotFound`] before any write. Safe to
    /// retry after a failure: the postcondition depends only on `desired`.
    pub async fn reconcile(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
        desired: &HashSet<Uuid>,
    ) -> Result<ReconcileOutcome> {
        let start = Instant::now();

        if desired.is_empty() {
            let removed = self.store.clear_links(owner, kind, entity_id).await?;
            debug!(
                subsystem = "core",
                component = "reconciler",
                op = "clear",
                owner_id = %owner,
                entity_kind = %kind,
                entity_id = %entity_id,
                links_removed = removed,
                "Cleared all tag links"
            );
            return Ok(ReconcileOutcome {
                added: 0,
                removed: removed as usize,
            });
        }

        let current = self.store.linked_tag_ids(owner, kind, entity_id).await?;
        let diff = LinkDiff::between(&current, desired);

        let outcome = if diff.is_empty() {
            ReconcileOutcome::default()
        } else {
            self.store
                .apply_link_diff(owner, kind, entity_id, &diff.to_remove, &diff.to_add)
                .await?
        };

        debug!(
            subsystem = "core",
            component = "reconciler",
            op = "reconcile",
            owner_id = %owner,
            entity_kind = %kind,
            entity_id = %entity_id,
            links_added = outcome.added,
            links_removed = outcome.removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reconciled tag links"
        );

        Ok(outcome)
    }
}
