//! # quire-db
//!
//! PostgreSQL store layer for quire.
//!
//! This crate provides:
//! - Connection pool management
//! - [`TagStore`], [`LinkStore`] and [`EntityStore`] implementations
//! - Embedded migrations (feature `migrations`, on by default)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quire_db::{CreateNoteRequest, Database, QuireConfig, StaticSession, TagIntent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/quire").await?;
//!     db.migrate().await?;
//!
//!     let session = Arc::new(StaticSession::from_env_value(Some("0191..."))?);
//!     let quire = db.quire(session, &QuireConfig::from_env()?)?;
//!
//!     let note = quire.notes()?.create(CreateNoteRequest {
//!         title: "Hello".to_string(),
//!         tags: TagIntent::Replace(vec!["Greeting".to_string()]),
//!         ..Default::default()
//!     }).await?;
//!
//!     assert_eq!(note.tags, vec!["greeting"]);
//!     Ok(())
//! }
//! ```
pub mod bookmarks;
pub mod links;
pub mod notes;
pub mod pool;
pub mod tags;
pub mod tasks;

pub mod test_fixtures;

use std::sync::Arc;

pub use quire_core::*;

pub use bookmarks::PgBookmarkStore;
pub use links::PgLinkStore;
pub use notes::PgNoteStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tags::PgTagStore;
pub use tasks::PgTaskStore;

/// Combined database access.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub tags: PgTagStore,
    pub links: PgLinkStore,
    pub notes: PgNoteStore,
    pub bookmarks: PgBookmarkStore,
    pub tasks: PgTaskStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            tags: PgTagStore::new(pool.clone()),
            links: PgLinkStore::new(pool.clone()),
            notes: PgNoteStore::new(pool.clone()),
            bookmarks: PgBookmarkStore::new(pool.clone()),
            tasks: PgTaskStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        tracing::info!(subsystem = "db", op = "migrate", "Migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// The PostgreSQL stores as trait objects.
    pub fn stores(&self) -> Stores {
        Stores {
            tags: Arc::new(self.tags.clone()),
            links: Arc::new(self.links.clone()),
            notes: Arc::new(self.notes.clone()),
            bookmarks: Arc::new(self.bookmarks.clone()),
            tasks: Arc::new(self.tasks.clone()),
        }
    }

    /// Session-scoped repositories backed by this database.
    pub fn quire(&self, session: Arc<dyn SessionProvider>, config: &QuireConfig) -> Result<Quire> {
        Quire::new(self.stores(), session, config)
    }
}
