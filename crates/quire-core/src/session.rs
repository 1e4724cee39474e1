//! Owner scope supplied by the authenticated session.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::OwnerId;

/// Source of the current caller's owner id.
///
/// Repository facades obtain the scope only through this trait; a caller
/// supplied owner id is never trusted.
pub trait SessionProvider: Send + Sync {
    fn current_owner(&self) -> Option<OwnerId>;

    /// The current owner, or `NotAuthenticated`.
    fn require_owner(&self) -> Result<OwnerId> {
        self.current_owner().ok_or(Error::NotAuthenticated)
    }
}

/// A session fixed at construction, e.g. from a verified token or the CLI
/// environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSession {
    owner: Option<OwnerId>,
}

impl StaticSession {
    pub fn authenticated(owner: OwnerId) -> Self {
        Self { owner: Some(owner) }
    }

    pub fn anonymous() -> Self {
        Self { owner: None }
    }

    /// Build from an environment value; empty or missing means anonymous.
    pub fn from_env_value(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(Self::anonymous()),
            Some(raw) => Uuid::parse_str(raw)
                .map(|id| Self::authenticated(OwnerId::new(id)))
                .map_err(|e| Error::Config(format!("invalid owner id '{}': {}", raw, e))),
        }
    }
}

impl SessionProvider for StaticSession {
    fn current_owner(&self) -> Option<OwnerId> {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_requires_fails() {
        let err = StaticSession::anonymous().require_owner().unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[test]
    fn test_from_env_value() {
        let id = Uuid::now_v7();
        let session = StaticSession::from_env_value(Some(&id.to_string())).unwrap();
        assert_eq!(session.require_owner().unwrap().as_uuid(), id);

        assert!(StaticSession::from_env_value(None)
            .unwrap()
            .current_owner()
            .is_none());
        assert!(StaticSession::from_env_value(Some("  "))
            .unwrap()
            .current_owner()
            .is_none());
        assert!(matches!(
            StaticSession::from_env_value(Some("not-a-uuid")),
            Err(Error::Config(_))
        ));
    }
}
