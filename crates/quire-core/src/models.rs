//! Core data models for quire.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::validation::{validate_content, validate_description, validate_title, validate_url};

// =============================================================================
// OWNER SCOPE
// =============================================================================

/// Identifier of the authenticated user that owns a row.
///
/// Only constructed from a trusted session (see [`crate::session`]) or from
/// rows the store already scoped; never parsed from request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// Kinds of owned entities that carry tags.
///
/// Each kind has its own association table keyed by `(entity_id, tag_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Note,
    Bookmark,
    Task,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Note, EntityKind::Bookmark, EntityKind::Task];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Note => "note",
            EntityKind::Bookmark => "bookmark",
            EntityKind::Task => "task",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// An owner-scoped tag row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: OwnerId,
    /// Canonical lower-case name; unique per owner.
    pub name: String,
    /// Display hint, `#rrggbb`.
    pub color: String,
    pub created_at_utc: DateTime<Utc>,
}

/// Tag with its usage across all entity kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    /// Number of notes, bookmarks and tasks carrying the tag (computed)
    #[serde(default)]
    pub usage_count: i64,
}

/// What a create/update call wants done with an entity's tags.
///
/// `Keep` leaves associations untouched (and on create, skips reconciliation
/// entirely). `Replace(vec![])` detaches every tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Option<Vec<String>>")]
pub enum TagIntent {
    #[default]
    Keep,
    Replace(Vec<String>),
}

impl TagIntent {
    pub fn is_keep(&self) -> bool {
        matches!(self, TagIntent::Keep)
    }
}

impl From<Option<Vec<String>>> for TagIntent {
    fn from(tags: Option<Vec<String>>) -> Self {
        match tags {
            Some(names) => TagIntent::Replace(names),
            None => TagIntent::Keep,
        }
    }
}

impl From<TagIntent> for Option<Vec<String>> {
    fn from(intent: TagIntent) -> Self {
        match intent {
            TagIntent::Keep => None,
            TagIntent::Replace(names) => Some(names),
        }
    }
}

// =============================================================================
// TAGGED AGGREGATE
// =============================================================================

/// A stored entity row that can carry tags.
pub trait TaggedRecord: Clone + Send + Sync + 'static {
    /// Association table family for this record.
    const KIND: EntityKind;

    /// Create payload handed to the store.
    type Create: EntityInput;

    /// Partial update payload handed to the store.
    type Update: EntityInput;

    fn id(&self) -> Uuid;

    /// Order in which `list` returns records.
    fn listing_cmp(&self, other: &Self) -> Ordering;
}

/// Create/update payloads: validated before any write, tag intent split off.
pub trait EntityInput: Send + Sync {
    /// Validate and canonicalise fields in place.
    fn prepare(&mut self) -> Result<()>;

    /// Detach the tag intent, leaving `Keep` behind.
    fn take_tags(&mut self) -> TagIntent;
}

/// A record plus the tag names currently associated with it.
///
/// `tags` is never stored on the record row; it is recomputed from the
/// association table on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagged<R> {
    #[serde(flatten)]
    pub record: R,
    pub tags: Vec<String>,
}

impl<R> Deref for Tagged<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

// =============================================================================
// NOTES
// =============================================================================

/// Stored note row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub title: String,
    pub content: String,
    pub is_pinned: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Note with its tags.
pub type Note = Tagged<NoteRecord>;

/// Request for creating a new note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub tags: TagIntent,
}

/// Request for updating a note; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
    #[serde(default)]
    pub tags: TagIntent,
}

impl TaggedRecord for NoteRecord {
    const KIND: EntityKind = EntityKind::Note;
    type Create = CreateNoteRequest;
    type Update = UpdateNoteRequest;

    fn id(&self) -> Uuid {
        self.id
    }

    /// Pinned first, then most recently updated.
    fn listing_cmp(&self, other: &Self) -> Ordering {
        other
            .is_pinned
            .cmp(&self.is_pinned)
            .then_with(|| other.updated_at_utc.cmp(&self.updated_at_utc))
            .then_with(|| other.created_at_utc.cmp(&self.created_at_utc))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl EntityInput for CreateNoteRequest {
    fn prepare(&mut self) -> Result<()> {
        self.title = validate_title(&self.title)?;
        validate_content(&self.content)?;
        Ok(())
    }

    fn take_tags(&mut self) -> TagIntent {
        std::mem::take(&mut self.tags)
    }
}

impl EntityInput for UpdateNoteRequest {
    fn prepare(&mut self) -> Result<()> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        Ok(())
    }

    fn take_tags(&mut self) -> TagIntent {
        std::mem::take(&mut self.tags)
    }
}

// =============================================================================
// BOOKMARKS
// =============================================================================

/// Stored bookmark row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Bookmark with its tags.
pub type Bookmark = Tagged<BookmarkRecord>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBookmarkRequest {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: TagIntent,
}

/// `description: Some(None)` (JSON `null`) clears the description; an absent
/// field leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBookmarkRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub tags: TagIntent,
}

impl TaggedRecord for BookmarkRecord {
    const KIND: EntityKind = EntityKind::Bookmark;
    type Create = CreateBookmarkRequest;
    type Update = UpdateBookmarkRequest;

    fn id(&self) -> Uuid {
        self.id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        other
            .updated_at_utc
            .cmp(&self.updated_at_utc)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl EntityInput for CreateBookmarkRequest {
    fn prepare(&mut self) -> Result<()> {
        self.title = validate_title(&self.title)?;
        self.url = validate_url(&self.url)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    fn take_tags(&mut self) -> TagIntent {
        std::mem::take(&mut self.tags)
    }
}

impl EntityInput for UpdateBookmarkRequest {
    fn prepare(&mut self) -> Result<()> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Some(url) = &self.url {
            self.url = Some(validate_url(url)?);
        }
        if let Some(Some(description)) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    fn take_tags(&mut self) -> TagIntent {
        std::mem::take(&mut self.tags)
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(Error::Validation(format!(
                "unknown task priority '{}', expected low, medium or high",
                other
            ))),
        }
    }
}

/// Stored task row. `due_date` is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Task with its tags.
pub type Task = Tagged<TaskRecord>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: TagIntent,
}

/// `description` and `due_date` follow the same absent/`null` rule as
/// [`UpdateBookmarkRequest::description`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub is_completed: Option<bool>,
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub tags: TagIntent,
}

impl TaggedRecord for TaskRecord {
    const KIND: EntityKind = EntityKind::Task;
    type Create = CreateTaskRequest;
    type Update = UpdateTaskRequest;

    fn id(&self) -> Uuid {
        self.id
    }

    /// Open tasks first, then most recently updated.
    fn listing_cmp(&self, other: &Self) -> Ordering {
        self.is_completed
            .cmp(&other.is_completed)
            .then_with(|| other.updated_at_utc.cmp(&self.updated_at_utc))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl EntityInput for CreateTaskRequest {
    fn prepare(&mut self) -> Result<()> {
        self.title = validate_title(&self.title)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    fn take_tags(&mut self) -> TagIntent {
        std::mem::take(&mut self.tags)
    }
}

impl EntityInput for UpdateTaskRequest {
    fn prepare(&mut self) -> Result<()> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Some(Some(description)) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    fn take_tags(&mut self) -> TagIntent {
        std::mem::take(&mut self.tags)
    }
}

/// Present field (including `null`) => `Some(_)`. Paired with
/// `#[serde(default)]` so an absent field stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn note(pinned: bool, updated: DateTime<Utc>) -> NoteRecord {
        NoteRecord {
            id: Uuid::now_v7(),
            owner_id: OwnerId::new(Uuid::nil()),
            title: "t".to_string(),
            content: String::new(),
            is_pinned: pinned,
            created_at_utc: updated,
            updated_at_utc: updated,
        }
    }

    #[test]
    fn test_note_listing_pins_before_recency() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(10);
        let t3 = t1 + Duration::seconds(20);
        let a = note(true, t1);
        let b = note(false, t3);
        let c = note(true, t2);

        let mut notes = vec![a.clone(), b.clone(), c.clone()];
        notes.sort_by(NoteRecord::listing_cmp);

        let ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
    }

    #[test]
    fn test_tag_intent_from_option() {
        assert_eq!(TagIntent::from(None), TagIntent::Keep);
        assert_eq!(
            TagIntent::from(Some(vec![])),
            TagIntent::Replace(Vec::new())
        );
    }

    #[test]
    fn test_tag_intent_serde_distinguishes_absent_and_empty() {
        let absent: UpdateNoteRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(absent.tags.is_keep());

        let empty: UpdateNoteRequest = serde_json::from_str(r#"{"tags":[]}"#).unwrap();
        assert_eq!(empty.tags, TagIntent::Replace(Vec::new()));

        let null: UpdateNoteRequest = serde_json::from_str(r#"{"tags":null}"#).unwrap();
        assert!(null.tags.is_keep());
    }

    #[test]
    fn test_null_clears_and_absent_keeps_optional_fields() {
        let absent: UpdateBookmarkRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.description, None);

        let null: UpdateBookmarkRequest =
            serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(null.description, Some(None));

        let set: UpdateBookmarkRequest =
            serde_json::from_str(r#"{"description":"docs"}"#).unwrap();
        assert_eq!(set.description, Some(Some("docs".to_string())));

        let task: UpdateTaskRequest =
            serde_json::from_str(r#"{"due_date":null,"description":"later"}"#).unwrap();
        assert_eq!(task.due_date, Some(None));
        assert_eq!(task.description, Some(Some("later".to_string())));

        let untouched: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.due_date, None);
        assert_eq!(untouched.description, None);
    }

    #[test]
    fn test_clear_survives_serialization() {
        let req = UpdateTaskRequest {
            due_date: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""due_date":null"#));
        assert!(!json.contains("description"));

        let back: UpdateTaskRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.due_date, Some(None));
        assert_eq!(back.description, None);
    }

    #[test]
    fn test_take_tags_leaves_keep() {
        let mut req = CreateNoteRequest {
            title: "Groceries".to_string(),
            tags: TagIntent::Replace(vec!["home".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            req.take_tags(),
            TagIntent::Replace(vec!["home".to_string()])
        );
        assert!(req.tags.is_keep());
    }

    #[test]
    fn test_prepare_trims_title() {
        let mut req = CreateNoteRequest {
            title: "  Weekly review  ".to_string(),
            ..Default::default()
        };
        req.prepare().unwrap();
        assert_eq!(req.title, "Weekly review");
    }

    #[test]
    fn test_prepare_rejects_blank_title() {
        let mut req = UpdateNoteRequest {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(req.prepare(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_task_listing_open_first() {
        let now = Utc::now();
        let base = TaskRecord {
            id: Uuid::now_v7(),
            owner_id: OwnerId::new(Uuid::nil()),
            title: "a".to_string(),
            description: None,
            is_completed: true,
            priority: TaskPriority::High,
            due_date: None,
            created_at_utc: now,
            updated_at_utc: now + Duration::seconds(5),
        };
        let open = TaskRecord {
            id: Uuid::now_v7(),
            is_completed: false,
            updated_at_utc: now,
            ..base.clone()
        };
        assert_eq!(open.listing_cmp(&base), Ordering::Less);
    }

    #[test]
    fn test_task_priority_parse() {
        assert_eq!("HIGH".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_tagged_serializes_flat() {
        let record = note(false, Utc::now());
        let tagged = Tagged {
            record,
            tags: vec!["work".to_string()],
        };
        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["is_pinned"], false);
        assert_eq!(json["tags"][0], "work");
    }
}
