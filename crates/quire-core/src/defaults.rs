//! Centralized default constants for quire.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Environment overrides are read by [`crate::config`] (rate limits)
//! and `quire_db::pool::PoolConfig::from_env` (pool settings).

// =============================================================================
// TAGS
// =============================================================================

/// Colour assigned to tags created lazily by the resolver.
pub const TAG_COLOR: &str = "#6b7280";

/// Maximum length of a tag name after trimming.
pub const TAG_NAME_MAX_LEN: usize = 64;

// =============================================================================
// ENTITIES
// =============================================================================

/// Maximum length of a note, bookmark or task title.
pub const TITLE_MAX_LEN: usize = 255;

/// Maximum length of note content.
pub const CONTENT_MAX_LEN: usize = 100_000;

/// Maximum length of a bookmark URL.
pub const URL_MAX_LEN: usize = 2048;

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Writes allowed per owner per window.
pub const RATE_LIMIT_REQUESTS: u32 = 60;

/// Fixed window length in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_color_is_hex() {
        assert_eq!(TAG_COLOR.len(), 7);
        assert!(TAG_COLOR.starts_with('#'));
        assert!(TAG_COLOR[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_rate_limit_defaults_nonzero() {
        assert!(RATE_LIMIT_REQUESTS > 0);
        assert!(RATE_LIMIT_WINDOW_SECS > 0);
    }
}
