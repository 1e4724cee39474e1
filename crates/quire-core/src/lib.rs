//! # quire-core
//!
//! Core types, traits, and tag reconciliation for quire.
//!
//! This crate is store-agnostic. It provides:
//! - The owner-scoped data model (notes, bookmarks, tasks, tags)
//! - Store traits implemented by `quire-db` (PostgreSQL) and [`memory`]
//! - [`TagResolver`]: race-tolerant, case-insensitive tag identity
//! - [`AssociationReconciler`]: minimal-diff entity/tag link reconciliation
//! - [`EntityRepository`]: CRUD that keeps the derived tag view consistent
//! - [`Quire`]: session-scoped, rate-limited facade

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod memory;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod service;
pub mod session;
pub mod tags;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use config::{QuireConfig, RateLimitConfig};
pub use error::{Error, Result};
pub use models::*;
pub use rate_limit::FixedWindowLimiter;
pub use repository::{BookmarkRepository, EntityRepository, NoteRepository, TaskRepository};
pub use service::{Quire, Scoped, Stores};
pub use session::{SessionProvider, StaticSession};
pub use tags::{
    normalize_tag_names, AssociationReconciler, LinkDiff, ReconcileOutcome, TagResolver,
};
pub use traits::*;
pub use validation::normalize_tag_name;
