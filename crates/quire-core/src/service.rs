//! Session-scoped entry point.
//!
//! [`Quire`] binds the repositories to a [`SessionProvider`] so the owner
//! scope always comes from the session, never from the caller, and applies
//! the optional write rate limit.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::QuireConfig;
use crate::error::Result;
use crate::models::*;
use crate::rate_limit::FixedWindowLimiter;
use crate::repository::{BookmarkRepository, EntityRepository, NoteRepository, TaskRepository};
use crate::session::SessionProvider;
use crate::tags::TagResolver;
use crate::traits::{EntityStore, LinkStore, TagStore};

/// The store implementations a [`Quire`] runs against.
#[derive(Clone)]
pub struct Stores {
    pub tags: Arc<dyn TagStore>,
    pub links: Arc<dyn LinkStore>,
    pub notes: Arc<dyn EntityStore<NoteRecord>>,
    pub bookmarks: Arc<dyn EntityStore<BookmarkRecord>>,
    pub tasks: Arc<dyn EntityStore<TaskRecord>>,
}

impl Stores {
    /// Use one value for every store trait.
    pub fn uniform<S>(store: Arc<S>) -> Self
    where
        S: TagStore
            + LinkStore
            + EntityStore<NoteRecord>
            + EntityStore<BookmarkRecord>
            + EntityStore<TaskRecord>
            + 'static,
    {
        Self {
            tags: store.clone(),
            links: store.clone(),
            notes: store.clone(),
            bookmarks: store.clone(),
            tasks: store,
        }
    }
}

/// Repositories bound to the current session.
#[derive(Clone)]
pub struct Quire {
    session: Arc<dyn SessionProvider>,
    limiter: Option<Arc<FixedWindowLimiter>>,
    tags: Arc<dyn TagStore>,
    notes: NoteRepository,
    bookmarks: BookmarkRepository,
    tasks: TaskRepository,
}

impl Quire {
    pub fn new(
        stores: Stores,
        session: Arc<dyn SessionProvider>,
        config: &QuireConfig,
    ) -> Result<Self> {
        let resolver = TagResolver::new(stores.tags.clone())
            .with_default_color(config.default_tag_color.clone())?;
        let limiter = config.rate_limit.enabled.then(|| {
            Arc::new(FixedWindowLimiter::new(
                config.rate_limit.requests,
                config.rate_limit.window,
            ))
        });

        Ok(Self {
            session,
            limiter,
            tags: stores.tags,
            notes: NoteRepository::new(stores.notes, stores.links.clone(), resolver.clone()),
            bookmarks: BookmarkRepository::new(
                stores.bookmarks,
                stores.links.clone(),
                resolver.clone(),
            ),
            tasks: TaskRepository::new(stores.tasks, stores.links, resolver),
        })
    }

    /// Replace the write limiter, e.g. to share one across instances.
    pub fn with_limiter(mut self, limiter: Option<Arc<FixedWindowLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn notes(&self) -> Result<Scoped<'_, NoteRecord>> {
        self.scoped(&self.notes)
    }

    pub fn bookmarks(&self) -> Result<Scoped<'_, BookmarkRecord>> {
        self.scoped(&self.bookmarks)
    }

    pub fn tasks(&self) -> Result<Scoped<'_, TaskRecord>> {
        self.scoped(&self.tasks)
    }

    /// The owner's tag vocabulary with usage counts.
    pub async fn list_tags(&self) -> Result<Vec<TagSummary>> {
        let owner = self.session.require_owner()?;
        self.tags.list_tags(owner).await
    }

    fn scoped<'a, R: TaggedRecord>(
        &'a self,
        repo: &'a EntityRepository<R>,
    ) -> Result<Scoped<'a, R>> {
        Ok(Scoped {
            owner: self.session.require_owner()?,
            repo,
            limiter: self.limiter.as_deref(),
        })
    }
}

/// A repository bound to one authenticated owner.
pub struct Scoped<'a, R: TaggedRecord> {
    owner: OwnerId,
    repo: &'a EntityRepository<R>,
    limiter: Option<&'a FixedWindowLimiter>,
}

impl<R: TaggedRecord> Scoped<'_, R> {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub async fn list(&self) -> Result<Vec<Tagged<R>>> {
        self.repo.list(self.owner).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Tagged<R>> {
        self.repo.get(self.owner, id).await
    }

    pub async fn create(&self, req: R::Create) -> Result<Tagged<R>> {
        self.admit_write()?;
        self.repo.create(self.owner, req).await
    }

    pub async fn update(&self, id: Uuid, req: R::Update) -> Result<Tagged<R>> {
        self.admit_write()?;
        self.repo.update(self.owner, id, req).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.admit_write()?;
        self.repo.delete(self.owner, id).await
    }

    fn admit_write(&self) -> Result<()> {
        match self.limiter {
            Some(limiter) => limiter.check(&self.owner),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::error::Error;
    use crate::memory::MemoryStore;
    use crate::session::StaticSession;
    use std::time::Duration;

    fn quire(store: Arc<MemoryStore>, session: StaticSession, config: QuireConfig) -> Quire {
        Quire::new(Stores::uniform(store), Arc::new(session), &config).unwrap()
    }

    fn authenticated() -> StaticSession {
        StaticSession::authenticated(OwnerId::new(Uuid::now_v7()))
    }

    #[tokio::test]
    async fn test_anonymous_fails_before_store() {
        let store = Arc::new(MemoryStore::new());
        let q = quire(store.clone(), StaticSession::anonymous(), QuireConfig::default());

        assert!(matches!(q.notes().err(), Some(Error::NotAuthenticated)));
        assert!(matches!(q.list_tags().await, Err(Error::NotAuthenticated)));
        assert_eq!(store.stats().await, Default::default());
    }

    #[tokio::test]
    async fn test_session_scopes_reads() {
        let store = Arc::new(MemoryStore::new());
        let alice = quire(store.clone(), authenticated(), QuireConfig::default());
        let bob = quire(store.clone(), authenticated(), QuireConfig::default());

        alice
            .notes()
            .unwrap()
            .create(CreateNoteRequest {
                title: "Private".to_string(),
                tags: TagIntent::Replace(vec!["secret".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(alice.notes().unwrap().list().await.unwrap().len(), 1);
        assert!(bob.notes().unwrap().list().await.unwrap().is_empty());
        assert!(bob.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_tags_counts_usage() {
        let store = Arc::new(MemoryStore::new());
        let q = quire(store, authenticated(), QuireConfig::default());

        q.notes()
            .unwrap()
            .create(CreateNoteRequest {
                title: "One".to_string(),
                tags: TagIntent::Replace(vec!["shared".to_string(), "solo".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();
        q.tasks()
            .unwrap()
            .create(CreateTaskRequest {
                title: "Two".to_string(),
                tags: TagIntent::Replace(vec!["Shared".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();

        let tags = q.list_tags().await.unwrap();
        let counts: Vec<(&str, i64)> = tags
            .iter()
            .map(|t| (t.name.as_str(), t.usage_count))
            .collect();
        assert_eq!(counts, vec![("shared", 2), ("solo", 1)]);
    }

    #[tokio::test]
    async fn test_writes_are_rate_limited() {
        let store = Arc::new(MemoryStore::new());
        let config = QuireConfig {
            rate_limit: RateLimitConfig {
                enabled: true,
                requests: 2,
                window: Duration::from_secs(60),
            },
            ..Default::default()
        };
        let q = quire(store, authenticated(), config);
        let notes = q.notes().unwrap();

        for title in ["a", "b"] {
            notes
                .create(CreateNoteRequest {
                    title: title.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let err = notes
            .create(CreateNoteRequest {
                title: "c".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));

        // Reads are not budgeted.
        assert_eq!(notes.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_disabled() {
        let store = Arc::new(MemoryStore::new());
        let config = QuireConfig {
            rate_limit: RateLimitConfig {
                enabled: false,
                requests: 1,
                window: Duration::from_secs(60),
            },
            ..Default::default()
        };
        let q = quire(store, authenticated(), config);
        let notes = q.notes().unwrap();

        for title in ["a", "b", "c"] {
            notes
                .create(CreateNoteRequest {
                    title: title.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_config_tag_color_applies() {
        let store = Arc::new(MemoryStore::new());
        let config = QuireConfig {
            default_tag_color: "#00ff00".to_string(),
            ..Default::default()
        };
        let session = authenticated();
        let owner = session.require_owner().unwrap();
        let q = quire(store.clone(), session, config);

        q.bookmarks()
            .unwrap()
            .create(CreateBookmarkRequest {
                title: "Rust".to_string(),
                url: "https://www.rust-lang.org".to_string(),
                description: None,
                tags: TagIntent::Replace(vec!["lang".to_string()]),
            })
            .await
            .unwrap();

        assert_eq!(store.tags_of(owner).await[0].color, "#00ff00");
    }
}
