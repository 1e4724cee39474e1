//! Structured logging schema and field name constants for quire.
//!
//! Every crate emits `tracing` events using these field names so log
//! aggregation can query them uniformly.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (lost tag race) |
//! | INFO  | Lifecycle events (pool, migrations), entity create/delete |
//! | DEBUG | Decision points (reconcile diff sizes, resolver hits) |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "core", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "tag_resolver", "reconciler", "notes", "pool", "rate_limit"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "resolve", "reconcile", "create", "update", "list"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner scope of the call.
pub const OWNER_ID: &str = "owner_id";

/// Note, bookmark or task UUID being operated on.
pub const ENTITY_ID: &str = "entity_id";

/// Entity kind ("note", "bookmark", "task").
pub const ENTITY_KIND: &str = "entity_kind";

/// Tag UUID being operated on.
pub const TAG_ID: &str = "tag_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a list query.
pub const RESULT_COUNT: &str = "result_count";

/// Association rows inserted by a reconcile call.
pub const LINKS_ADDED: &str = "links_added";

/// Association rows deleted by a reconcile call.
pub const LINKS_REMOVED: &str = "links_removed";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
