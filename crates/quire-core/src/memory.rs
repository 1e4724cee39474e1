//! In-memory implementation of every store trait.
//!
//! Used by unit tests here and by downstream crates that want the
//! repositories without a database. It enforces the same uniqueness rules as
//! the PostgreSQL schema, counts the operations the repositories issue, and
//! can be told to lose a tag race or fail a link write.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::tags::ReconcileOutcome;
use crate::traits::{EntityStore, LinkStore, TagStore};

/// How [`MemoryStore::insert_tag`] reports a duplicate name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictMode {
    /// `Err(Error::Conflict)`, like a plain INSERT hitting a unique index.
    #[default]
    Error,
    /// `Ok(None)`, like `INSERT ... ON CONFLICT DO NOTHING RETURNING id`.
    Nothing,
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub tag_lookups: usize,
    pub tag_inserts: usize,
    /// Calls to `linked_tag_ids` or `clear_links`; every reconcile starts
    /// with exactly one of them.
    pub reconcile_calls: usize,
    /// Non-empty diffs handed to `apply_link_diff`.
    pub link_diffs_applied: usize,
    pub links_inserted: usize,
    pub links_deleted: usize,
}

type LinkKey = (EntityKind, Uuid, Uuid);

#[derive(Default)]
struct State {
    tags: Vec<Tag>,
    links: HashSet<LinkKey>,
    notes: HashMap<Uuid, NoteRecord>,
    bookmarks: HashMap<Uuid, BookmarkRecord>,
    tasks: HashMap<Uuid, TaskRecord>,
    stats: MemoryStats,
    touched: HashSet<LinkKey>,
    pending_race: Option<(OwnerId, String, Uuid)>,
    phantom_conflict: bool,
    fail_link_write: bool,
}

impl State {
    fn find_tag(&self, owner: OwnerId, normalized: &str) -> Option<&Tag> {
        self.tags
            .iter()
            .find(|t| t.owner_id == owner && t.name.to_lowercase() == normalized)
    }

    fn push_tag(&mut self, id: Uuid, owner: OwnerId, name: &str, color: &str) {
        self.tags.push(Tag {
            id,
            owner_id: owner,
            name: name.to_string(),
            color: color.to_string(),
            created_at_utc: Utc::now(),
        });
    }

    fn tag_owner(&self, id: Uuid) -> Option<OwnerId> {
        self.tags.iter().find(|t| t.id == id).map(|t| t.owner_id)
    }

    fn entity_owner(&self, kind: EntityKind, id: Uuid) -> Option<OwnerId> {
        match kind {
            EntityKind::Note => self.notes.get(&id).map(|n| n.owner_id),
            EntityKind::Bookmark => self.bookmarks.get(&id).map(|b| b.owner_id),
            EntityKind::Task => self.tasks.get(&id).map(|t| t.owner_id),
        }
    }

    fn drop_links_of(&mut self, kind: EntityKind, entity_id: Uuid) {
        self.links
            .retain(|(k, e, _)| !(*k == kind && *e == entity_id));
    }
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    conflict_mode: ConflictMode,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conflict_mode(conflict_mode: ConflictMode) -> Self {
        Self {
            state: Mutex::default(),
            conflict_mode,
        }
    }

    pub async fn stats(&self) -> MemoryStats {
        self.state.lock().await.stats
    }

    pub async fn tag_count(&self, owner: OwnerId) -> usize {
        let state = self.state.lock().await;
        state.tags.iter().filter(|t| t.owner_id == owner).count()
    }

    /// Owner's tag rows ordered by name.
    pub async fn tags_of(&self, owner: OwnerId) -> Vec<Tag> {
        let state = self.state.lock().await;
        let mut tags: Vec<Tag> = state
            .tags
            .iter()
            .filter(|t| t.owner_id == owner)
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    /// Insert a tag row directly, bypassing counters.
    pub async fn seed_tag(&self, owner: OwnerId, name: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.state
            .lock()
            .await
            .push_tag(id, owner, &name.to_lowercase(), crate::defaults::TAG_COLOR);
        id
    }

    /// Insert a bare entity row of `kind` with a fixed id, bypassing counters.
    pub async fn seed_entity(&self, kind: EntityKind, owner: OwnerId, id: Uuid) {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        match kind {
            EntityKind::Note => {
                state.notes.insert(
                    id,
                    NoteRecord {
                        id,
                        owner_id: owner,
                        title: "seeded".to_string(),
                        content: String::new(),
                        is_pinned: false,
                        created_at_utc: now,
                        updated_at_utc: now,
                    },
                );
            }
            EntityKind::Bookmark => {
                state.bookmarks.insert(
                    id,
                    BookmarkRecord {
                        id,
                        owner_id: owner,
                        title: "seeded".to_string(),
                        url: "https://example.com/".to_string(),
                        description: None,
                        created_at_utc: now,
                        updated_at_utc: now,
                    },
                );
            }
            EntityKind::Task => {
                state.tasks.insert(
                    id,
                    TaskRecord {
                        id,
                        owner_id: owner,
                        title: "seeded".to_string(),
                        description: None,
                        is_completed: false,
                        priority: TaskPriority::default(),
                        due_date: None,
                        created_at_utc: now,
                        updated_at_utc: now,
                    },
                );
            }
        }
    }

    /// Insert link rows directly, bypassing counters.
    pub async fn seed_links(&self, kind: EntityKind, entity_id: Uuid, tag_ids: &[Uuid]) {
        let mut state = self.state.lock().await;
        for tag_id in tag_ids {
            state.links.insert((kind, entity_id, *tag_id));
        }
    }

    pub async fn links_of(&self, kind: EntityKind, entity_id: Uuid) -> HashSet<Uuid> {
        let state = self.state.lock().await;
        state
            .links
            .iter()
            .filter(|(k, e, _)| *k == kind && *e == entity_id)
            .map(|(_, _, t)| *t)
            .collect()
    }

    /// Every link row inserted or deleted through `apply_link_diff`/`clear_links`.
    pub async fn touched_links(&self) -> HashSet<(EntityKind, Uuid, Uuid)> {
        self.state.lock().await.touched.clone()
    }

    /// Make the next insert of `(owner, name)` lose to a concurrent caller.
    ///
    /// The winning row appears at the moment of that insert. Returns the
    /// winner's id.
    pub async fn lose_next_tag_race(&self, owner: OwnerId, name: &str) -> Uuid {
        let winner = Uuid::now_v7();
        self.state.lock().await.pending_race = Some((owner, name.to_lowercase(), winner));
        winner
    }

    /// Make the next tag insert report a conflict although no row exists.
    pub async fn phantom_next_tag_conflict(&self) {
        self.state.lock().await.phantom_conflict = true;
    }

    /// Make the next link write fail with a persistence error.
    pub async fn fail_next_link_write(&self) {
        self.state.lock().await.fail_link_write = true;
    }

    fn conflict(&self, name: &str) -> Result<Option<Uuid>> {
        match self.conflict_mode {
            ConflictMode::Error => Err(Error::Conflict(format!(
                "duplicate key value violates unique constraint on tag '{}'",
                name
            ))),
            ConflictMode::Nothing => Ok(None),
        }
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn find_tag_id(&self, owner: OwnerId, normalized: &str) -> Result<Option<Uuid>> {
        let mut state = self.state.lock().await;
        state.stats.tag_lookups += 1;
        Ok(state.find_tag(owner, normalized).map(|t| t.id))
    }

    async fn insert_tag(
        &self,
        owner: OwnerId,
        normalized: &str,
        color: &str,
    ) -> Result<Option<Uuid>> {
        let mut state = self.state.lock().await;
        state.stats.tag_inserts += 1;

        if std::mem::take(&mut state.phantom_conflict) {
            return self.conflict(normalized);
        }

        let lost_race = matches!(
            &state.pending_race,
            Some((o, n, _)) if *o == owner && n == normalized
        );
        if lost_race {
            if let Some((_, _, winner)) = state.pending_race.take() {
                state.push_tag(winner, owner, normalized, color);
            }
        }

        if state.find_tag(owner, normalized).is_some() {
            return self.conflict(normalized);
        }

        let id = Uuid::now_v7();
        state.push_tag(id, owner, normalized, color);
        Ok(Some(id))
    }

    async fn list_tags(&self, owner: OwnerId) -> Result<Vec<TagSummary>> {
        let state = self.state.lock().await;
        let mut tags: Vec<TagSummary> = state
            .tags
            .iter()
            .filter(|t| t.owner_id == owner)
            .map(|t| TagSummary {
                id: t.id,
                name: t.name.clone(),
                color: t.color.clone(),
                usage_count: state.links.iter().filter(|(_, _, id)| *id == t.id).count() as i64,
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn linked_tag_ids(
        &self,
        _owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<HashSet<Uuid>> {
        let mut state = self.state.lock().await;
        state.stats.reconcile_calls += 1;
        Ok(state
            .links
            .iter()
            .filter(|(k, e, _)| *k == kind && *e == entity_id)
            .map(|(_, _, t)| *t)
            .collect())
    }

    async fn clear_links(&self, _owner: OwnerId, kind: EntityKind, entity_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.stats.reconcile_calls += 1;
        if std::mem::take(&mut state.fail_link_write) {
            return Err(Error::Persistence("injected link write failure".to_string()));
        }

        let doomed: Vec<LinkKey> = state
            .links
            .iter()
            .filter(|(k, e, _)| *k == kind && *e == entity_id)
            .copied()
            .collect();
        for key in &doomed {
            state.links.remove(key);
            state.touched.insert(*key);
        }
        state.stats.links_deleted += doomed.len();
        Ok(doomed.len() as u64)
    }

    async fn apply_link_diff(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
        remove: &[Uuid],
        add: &[Uuid],
    ) -> Result<ReconcileOutcome> {
        let mut state = self.state.lock().await;
        if std::mem::take(&mut state.fail_link_write) {
            return Err(Error::Persistence("injected link write failure".to_string()));
        }

        if state.entity_owner(kind, entity_id) != Some(owner) {
            return Err(Error::NotFound(format!("{} {}", kind, entity_id)));
        }
        if let Some(foreign) = add.iter().find(|id| state.tag_owner(**id) != Some(owner)) {
            return Err(Error::NotFound(format!("tag {}", foreign)));
        }
        state.stats.link_diffs_applied += 1;

        let mut outcome = ReconcileOutcome::default();
        for tag_id in remove {
            let key = (kind, entity_id, *tag_id);
            if state.links.remove(&key) {
                state.stats.links_deleted += 1;
                state.touched.insert(key);
                outcome.removed += 1;
            }
        }
        for tag_id in add {
            let key = (kind, entity_id, *tag_id);
            if state.links.insert(key) {
                state.stats.links_inserted += 1;
                state.touched.insert(key);
                outcome.added += 1;
            }
        }
        Ok(outcome)
    }

    async fn tag_names(
        &self,
        owner: OwnerId,
        kind: EntityKind,
        entity_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>> {
        let state = self.state.lock().await;
        let wanted: HashSet<&Uuid> = entity_ids.iter().collect();
        let mut names: HashMap<Uuid, Vec<String>> = HashMap::new();

        for (k, entity_id, tag_id) in &state.links {
            if *k != kind || !wanted.contains(entity_id) {
                continue;
            }
            if let Some(tag) = state
                .tags
                .iter()
                .find(|t| t.id == *tag_id && t.owner_id == owner)
            {
                names.entry(*entity_id).or_default().push(tag.name.clone());
            }
        }
        for list in names.values_mut() {
            list.sort();
        }
        Ok(names)
    }
}

fn bump(updated_at: &mut DateTime<Utc>, now: DateTime<Utc>) {
    if now > *updated_at {
        *updated_at = now;
    }
}

#[async_trait]
impl EntityStore<NoteRecord> for MemoryStore {
    async fn insert(
        &self,
        owner: OwnerId,
        req: &CreateNoteRequest,
        now: DateTime<Utc>,
    ) -> Result<NoteRecord> {
        let record = NoteRecord {
            id: Uuid::now_v7(),
            owner_id: owner,
            title: req.title.clone(),
            content: req.content.clone(),
            is_pinned: req.is_pinned,
            created_at_utc: now,
            updated_at_utc: now,
        };
        self.state
            .lock()
            .await
            .notes
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<NoteRecord>> {
        let state = self.state.lock().await;
        Ok(state.notes.get(&id).filter(|n| n.owner_id == owner).cloned())
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<NoteRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .notes
            .values()
            .filter(|n| n.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &UpdateNoteRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<NoteRecord>> {
        let mut state = self.state.lock().await;
        let Some(note) = state.notes.get_mut(&id).filter(|n| n.owner_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = &req.title {
            note.title = title.clone();
        }
        if let Some(content) = &req.content {
            note.content = content.clone();
        }
        if let Some(is_pinned) = req.is_pinned {
            note.is_pinned = is_pinned;
        }
        bump(&mut note.updated_at_utc, now);
        Ok(Some(note.clone()))
    }

    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.notes.get(&id).is_some_and(|n| n.owner_id == owner) {
            return Ok(false);
        }
        state.notes.remove(&id);
        state.drop_links_of(EntityKind::Note, id);
        Ok(true)
    }
}

#[async_trait]
impl EntityStore<BookmarkRecord> for MemoryStore {
    async fn insert(
        &self,
        owner: OwnerId,
        req: &CreateBookmarkRequest,
        now: DateTime<Utc>,
    ) -> Result<BookmarkRecord> {
        let record = BookmarkRecord {
            id: Uuid::now_v7(),
            owner_id: owner,
            title: req.title.clone(),
            url: req.url.clone(),
            description: req.description.clone(),
            created_at_utc: now,
            updated_at_utc: now,
        };
        self.state
            .lock()
            .await
            .bookmarks
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<BookmarkRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .bookmarks
            .get(&id)
            .filter(|b| b.owner_id == owner)
            .cloned())
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<BookmarkRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .bookmarks
            .values()
            .filter(|b| b.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &UpdateBookmarkRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<BookmarkRecord>> {
        let mut state = self.state.lock().await;
        let Some(bookmark) = state.bookmarks.get_mut(&id).filter(|b| b.owner_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = &req.title {
            bookmark.title = title.clone();
        }
        if let Some(url) = &req.url {
            bookmark.url = url.clone();
        }
        if let Some(description) = &req.description {
            bookmark.description = description.clone();
        }
        bump(&mut bookmark.updated_at_utc, now);
        Ok(Some(bookmark.clone()))
    }

    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.bookmarks.get(&id).is_some_and(|b| b.owner_id == owner) {
            return Ok(false);
        }
        state.bookmarks.remove(&id);
        state.drop_links_of(EntityKind::Bookmark, id);
        Ok(true)
    }
}

#[async_trait]
impl EntityStore<TaskRecord> for MemoryStore {
    async fn insert(
        &self,
        owner: OwnerId,
        req: &CreateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<TaskRecord> {
        let record = TaskRecord {
            id: Uuid::now_v7(),
            owner_id: owner,
            title: req.title.clone(),
            description: req.description.clone(),
            is_completed: false,
            priority: req.priority,
            due_date: req.due_date,
            created_at_utc: now,
            updated_at_utc: now,
        };
        self.state
            .lock()
            .await
            .tasks
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, owner: OwnerId, id: Uuid) -> Result<Option<TaskRecord>> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).filter(|t| t.owner_id == owner).cloned())
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<TaskRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        req: &UpdateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&id).filter(|t| t.owner_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = &req.title {
            task.title = title.clone();
        }
        if let Some(description) = &req.description {
            task.description = description.clone();
        }
        if let Some(is_completed) = req.is_completed {
            task.is_completed = is_completed;
        }
        if let Some(priority) = req.priority {
            task.priority = priority;
        }
        if let Some(due_date) = req.due_date {
            task.due_date = due_date;
        }
        bump(&mut task.updated_at_utc, now);
        Ok(Some(task.clone()))
    }

    async fn delete(&self, owner: OwnerId, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.tasks.get(&id).is_some_and(|t| t.owner_id == owner) {
            return Ok(false);
        }
        state.tasks.remove(&id);
        state.drop_links_of(EntityKind::Task, id);
        Ok(true)
    }
}
