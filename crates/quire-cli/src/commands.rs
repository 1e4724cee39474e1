//! Subcommand definitions and their mapping onto repository calls.

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use quire_core::{
    CreateBookmarkRequest, CreateNoteRequest, CreateTaskRequest, Scoped, TagIntent, TaggedRecord,
    TaskPriority, UpdateBookmarkRequest, UpdateNoteRequest, UpdateTaskRequest,
};

/// Tag arguments shared by every create/update command.
#[derive(Args, Debug, Clone, Default)]
pub struct TagArgs {
    /// Tag to attach (repeatable); replaces the current set
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Remove every tag
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
}

impl TagArgs {
    /// No tag flags leaves the current set untouched.
    pub fn intent(self) -> TagIntent {
        if self.clear_tags {
            TagIntent::Replace(Vec::new())
        } else if self.tags.is_empty() {
            TagIntent::Keep
        } else {
            TagIntent::Replace(self.tags)
        }
    }
}

/// One repository call.
pub enum Action<C, U> {
    List,
    Get(Uuid),
    Create(C),
    Update(Uuid, U),
    Delete(Uuid),
}

// =============================================================================
// NOTES
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// List notes, pinned first
    List,
    /// Show one note
    Get { id: Uuid },
    /// Create a note
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        pinned: bool,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Update a note; omitted fields are unchanged
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        pinned: Option<bool>,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Delete a note
    Delete { id: Uuid },
}

impl From<NoteCommand> for Action<CreateNoteRequest, UpdateNoteRequest> {
    fn from(cmd: NoteCommand) -> Self {
        match cmd {
            NoteCommand::List => Action::List,
            NoteCommand::Get { id } => Action::Get(id),
            NoteCommand::Create {
                title,
                content,
                pinned,
                tags,
            } => Action::Create(CreateNoteRequest {
                title,
                content,
                is_pinned: pinned,
                tags: tags.intent(),
            }),
            NoteCommand::Update {
                id,
                title,
                content,
                pinned,
                tags,
            } => Action::Update(
                id,
                UpdateNoteRequest {
                    title,
                    content,
                    is_pinned: pinned,
                    tags: tags.intent(),
                },
            ),
            NoteCommand::Delete { id } => Action::Delete(id),
        }
    }
}

// =============================================================================
// BOOKMARKS
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum BookmarkCommand {
    /// List bookmarks, most recently updated first
    List,
    /// Show one bookmark
    Get { id: Uuid },
    /// Create a bookmark
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Update a bookmark; omitted fields are unchanged
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Delete a bookmark
    Delete { id: Uuid },
}

impl From<BookmarkCommand> for Action<CreateBookmarkRequest, UpdateBookmarkRequest> {
    fn from(cmd: BookmarkCommand) -> Self {
        match cmd {
            BookmarkCommand::List => Action::List,
            BookmarkCommand::Get { id } => Action::Get(id),
            BookmarkCommand::Create {
                title,
                url,
                description,
                tags,
            } => Action::Create(CreateBookmarkRequest {
                title,
                url,
                description,
                tags: tags.intent(),
            }),
            BookmarkCommand::Update {
                id,
                title,
                url,
                description,
                clear_description,
                tags,
            } => Action::Update(
                id,
                UpdateBookmarkRequest {
                    title,
                    url,
                    description: nullable(description, clear_description),
                    tags: tags.intent(),
                },
            ),
            BookmarkCommand::Delete { id } => Action::Delete(id),
        }
    }
}

// =============================================================================
// TASKS
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List tasks, open ones first
    List,
    /// Show one task
    Get { id: Uuid },
    /// Create a task
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// low, medium or high
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Update a task; omitted fields are unchanged
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        #[arg(long)]
        clear_due: bool,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Delete a task
    Delete { id: Uuid },
}

impl From<TaskCommand> for Action<CreateTaskRequest, UpdateTaskRequest> {
    fn from(cmd: TaskCommand) -> Self {
        match cmd {
            TaskCommand::List => Action::List,
            TaskCommand::Get { id } => Action::Get(id),
            TaskCommand::Create {
                title,
                description,
                priority,
                due,
                tags,
            } => Action::Create(CreateTaskRequest {
                title,
                description,
                priority,
                due_date: due,
                tags: tags.intent(),
            }),
            TaskCommand::Update {
                id,
                title,
                description,
                clear_description,
                completed,
                priority,
                due,
                clear_due,
                tags,
            } => Action::Update(
                id,
                UpdateTaskRequest {
                    title,
                    description: nullable(description, clear_description),
                    is_completed: completed,
                    priority,
                    due_date: nullable(due, clear_due),
                    tags: tags.intent(),
                },
            ),
            TaskCommand::Delete { id } => Action::Delete(id),
        }
    }
}

/// `--x value` sets, `--clear-x` nulls, neither leaves unchanged.
fn nullable<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// Run one action and render its result as pretty JSON.
pub async fn run<R>(
    scoped: Scoped<'_, R>,
    action: Action<R::Create, R::Update>,
) -> anyhow::Result<String>
where
    R: TaggedRecord + Serialize,
{
    let output = match action {
        Action::List => serde_json::to_string_pretty(&scoped.list().await?)?,
        Action::Get(id) => serde_json::to_string_pretty(&scoped.get(id).await?)?,
        Action::Create(req) => serde_json::to_string_pretty(&scoped.create(req).await?)?,
        Action::Update(id, req) => serde_json::to_string_pretty(&scoped.update(id, req).await?)?,
        Action::Delete(id) => {
            scoped.delete(id).await?;
            serde_json::to_string_pretty(&serde_json::json!({ "deleted": id }))?
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_intent_from_flags() {
        assert_eq!(TagArgs::default().intent(), TagIntent::Keep);
        assert_eq!(
            TagArgs {
                tags: Vec::new(),
                clear_tags: true,
            }
            .intent(),
            TagIntent::Replace(Vec::new())
        );
        assert_eq!(
            TagArgs {
                tags: vec!["a".to_string()],
                clear_tags: false,
            }
            .intent(),
            TagIntent::Replace(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_nullable() {
        assert_eq!(nullable(Some(1), false), Some(Some(1)));
        assert_eq!(nullable::<i32>(None, true), Some(None));
        assert_eq!(nullable::<i32>(None, false), None);
    }
}
