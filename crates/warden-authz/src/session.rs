//! Session resolution.

use crate::principal::{Principal, Session};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};
use warden_common_config::SessionSettings;
use warden_common_core::{PrincipalId, SessionId, Timestamp};

/// Per-invocation execution context supplied by the transport.
///
/// The session id travels here, never inside the request body and never in
/// shared state, so concurrent calls cannot observe each other's sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub session_id: Option<SessionId>,
    /// Transport-level correlation id, attached to log output.
    pub request_id: Option<String>,
}

impl CallContext {
    /// A call with no session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A call carrying `session_id`.
    pub fn with_session(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            request_id: None,
        }
    }

    /// Attach a correlation id.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Errors raised by an authentication backend.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("unknown principal: {0}")]
    UnknownPrincipal(PrincipalId),

    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),

    #[error("session lifetime {0:?} is out of range")]
    TtlOutOfRange(Duration),
}

/// Resolves a session id to the principal that owns it.
#[async_trait]
pub trait AuthenticationService: Send + Sync {
    /// `Ok(None)` when the session is unknown or expired.
    async fn validate_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Principal>, AuthenticationError>;
}

/// In-memory sessions and principals.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    principals: RwLock<HashMap<PrincipalId, Principal>>,
    ttl: Duration,
}

impl MemorySessionStore {
    /// Create a store issuing sessions that live for `ttl`.
    ///
    /// A lifetime that cannot be added to the current time makes
    /// [`create_session`](Self::create_session) fail.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            principals: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Lifetime of newly created sessions.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a store from configuration.
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs))
    }

    /// Insert or replace a principal.
    pub fn upsert_principal(&self, principal: Principal) {
        self.principals.write().insert(principal.id, principal);
    }

    /// Remove a principal; its sessions stop resolving.
    pub fn remove_principal(&self, id: PrincipalId) -> Option<Principal> {
        self.principals.write().remove(&id)
    }

    /// Open a session for a known principal.
    pub fn create_session(&self, principal_id: PrincipalId) -> Result<Session, AuthenticationError> {
        if !self.principals.read().contains_key(&principal_id) {
            return Err(AuthenticationError::UnknownPrincipal(principal_id));
        }

        let now = Timestamp::now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_plus(ttl))
            .ok_or_else(|| {
                error!(ttl = ?self.ttl, "Session lifetime out of range");
                AuthenticationError::TtlOutOfRange(self.ttl)
            })?;
        let session = Session {
            id: SessionId::generate(),
            principal_id,
            created_at: now,
            expires_at,
        };
        self.sessions.write().insert(session.id.clone(), session.clone());
        debug!(principal_id = %principal_id, "Session created");
        Ok(session)
    }

    /// Insert a session with caller-chosen timestamps.
    pub fn insert_session(&self, session: Session) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    /// Revoke a session. Returns whether it existed.
    pub fn revoke(&self, session_id: &SessionId) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Timestamp::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }

    /// Number of stored sessions, expired or not.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

#[async_trait]
impl AuthenticationService for MemorySessionStore {
    async fn validate_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Principal>, AuthenticationError> {
        let principal_id = {
            let sessions = self.sessions.read();
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(session) if session.is_expired() => None,
                Some(session) => Some(session.principal_id),
            }
        };

        let Some(principal_id) = principal_id else {
            self.sessions.write().remove(session_id);
            debug!("Expired session removed on lookup");
            return Ok(None);
        };

        Ok(self.principals.read().get(&principal_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(principal: Principal) -> MemorySessionStore {
        let store = MemorySessionStore::new(Duration::from_secs(3600));
        store.upsert_principal(principal);
        store
    }

    #[tokio::test]
    async fn test_valid_session_resolves_principal() {
        let store = store_with(Principal::user(1));
        let session = store.create_session(PrincipalId::new(1)).unwrap();

        let principal = store.validate_session(&session.id).await.unwrap();
        assert_eq!(principal, Some(Principal::user(1)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_none() {
        let store = store_with(Principal::user(1));
        let principal = store
            .validate_session(&SessionId::from("ses_missing"))
            .await
            .unwrap();
        assert!(principal.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_none_and_removed() {
        let store = store_with(Principal::user(1));
        let now = Timestamp::now();
        let session = Session {
            id: SessionId::generate(),
            principal_id: PrincipalId::new(1),
            created_at: now.minus(chrono::Duration::hours(2)),
            expires_at: now.minus(chrono::Duration::seconds(1)),
        };
        store.insert_session(session.clone());

        assert!(store.validate_session(&session.id).await.unwrap().is_none());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_revoked_session_is_none() {
        let store = store_with(Principal::admin(9));
        let session = store.create_session(PrincipalId::new(9)).unwrap();
        assert!(store.revoke(&session.id));
        assert!(!store.revoke(&session.id));
        assert!(store.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removed_principal_stops_resolving() {
        let store = store_with(Principal::user(3));
        let session = store.create_session(PrincipalId::new(3)).unwrap();
        store.remove_principal(PrincipalId::new(3));
        assert!(store.validate_session(&session.id).await.unwrap().is_none());
    }

    #[test]
    fn test_create_session_requires_known_principal() {
        let store = MemorySessionStore::default();
        assert!(matches!(
            store.create_session(PrincipalId::new(42)),
            Err(AuthenticationError::UnknownPrincipal(_))
        ));
    }

    #[test]
    fn test_out_of_range_ttl_fails_session_creation() {
        let store = MemorySessionStore::from_settings(&SessionSettings {
            ttl_secs: 1_000_000_000_000_000,
        });
        store.upsert_principal(Principal::user(1));

        match store.create_session(PrincipalId::new(1)) {
            Err(AuthenticationError::TtlOutOfRange(ttl)) => {
                assert_eq!(ttl, Duration::from_secs(1_000_000_000_000_000));
            }
            other => panic!("Expected TtlOutOfRange, got {:?}", other),
        }
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_session_expiry_follows_ttl() {
        let store = MemorySessionStore::new(Duration::from_secs(600));
        store.upsert_principal(Principal::user(1));
        let session = store.create_session(PrincipalId::new(1)).unwrap();

        assert_eq!(store.ttl(), Duration::from_secs(600));
        assert_eq!(
            session.expires_at,
            session.created_at.plus(chrono::Duration::seconds(600))
        );
    }

    #[test]
    fn test_purge_expired() {
        let store = store_with(Principal::user(1));
        let live = store.create_session(PrincipalId::new(1)).unwrap();
        let now = Timestamp::now();
        store.insert_session(Session {
            id: SessionId::generate(),
            principal_id: PrincipalId::new(1),
            created_at: now.minus(chrono::Duration::hours(2)),
            expires_at: now.minus(chrono::Duration::hours(1)),
        });

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.session_count(), 1);
        assert!(!live.is_expired());
    }

    #[test]
    fn test_call_context_builders() {
        let ctx = CallContext::with_session("ses_abc").request_id("req-1");
        assert_eq!(ctx.session_id, Some(SessionId::from("ses_abc")));
        assert_eq!(ctx.request_id.as_deref(), Some("req-1"));
        assert!(CallContext::anonymous().session_id.is_none());
    }
}
