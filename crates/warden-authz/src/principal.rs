//! Principal, session and caller context types.

use serde::{Deserialize, Serialize};
use warden_common_core::{PrincipalId, SessionId, Timestamp};

/// Role held by a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// An authenticated actor, as resolved by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
    pub active: bool,
}

impl Principal {
    /// An active principal with the user role.
    pub fn user(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            active: true,
        }
    }

    /// An active principal with the admin role.
    pub fn admin(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            active: true,
        }
    }

    /// Same principal with the active flag cleared.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check if principal has the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub principal_id: PrincipalId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    /// Whether the session is expired at `now`. Expiry is inclusive.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_at_or_before(&now)
    }

    /// Whether the session is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }
}

/// What a handler learns about its caller.
///
/// For PUBLIC operations every field is `None`, whether or not the caller
/// presented a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub principal: Option<Principal>,
    pub session_id: Option<SessionId>,
    pub principal_id: Option<PrincipalId>,
}

impl AuthorizationContext {
    /// The context handed to PUBLIC handlers.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for an authenticated caller.
    pub fn authenticated(principal: Principal, session_id: SessionId) -> Self {
        Self {
            principal_id: Some(principal.id),
            principal: Some(principal),
            session_id: Some(session_id),
        }
    }

    /// Whether a principal is attached.
    pub fn is_anonymous(&self) -> bool {
        self.principal.is_none()
    }
}
