//! Account, ownership and role predicates.

use crate::error::AuthzError;
use crate::principal::Principal;
use crate::resource::{OwnerRegistry, ResourceKind};
use tracing::{debug, warn};
use warden_common_core::{PrincipalId, ResourceId};

/// Predicates the wrapper runs before a handler.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationMiddleware {
    owners: OwnerRegistry,
}

impl AuthorizationMiddleware {
    pub fn new(owners: OwnerRegistry) -> Self {
        Self { owners }
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    /// Fails with `AccountInactive` when the principal is deactivated.
    pub fn verify_active(&self, principal: &Principal) -> Result<(), AuthzError> {
        if principal.active {
            Ok(())
        } else {
            debug!(principal_id = %principal.id, "Inactive account");
            Err(AuthzError::AccountInactive)
        }
    }

    /// Fails with `AccessDenied` unless `principal_id` owns the resource.
    ///
    /// A missing resource, a foreign owner, an unregistered kind and a failed
    /// lookup all produce the same error so callers cannot probe existence.
    pub async fn verify_ownership(
        &self,
        kind: &ResourceKind,
        resource_id: &ResourceId,
        principal_id: PrincipalId,
    ) -> Result<(), AuthzError> {
        let Some(lookup) = self.owners.get(kind) else {
            warn!(resource_kind = %kind, "No ownership lookup registered");
            return Err(AuthzError::AccessDenied);
        };

        match lookup.owner_of(resource_id).await {
            Ok(Some(owner)) if owner == principal_id => Ok(()),
            Ok(Some(_)) => {
                debug!(resource_kind = %kind, resource_id = %resource_id, "Not the owner");
                Err(AuthzError::AccessDenied)
            }
            Ok(None) => {
                debug!(resource_kind = %kind, resource_id = %resource_id, "Resource not found");
                Err(AuthzError::AccessDenied)
            }
            Err(e) => {
                warn!(resource_kind = %kind, error = %e, "Ownership lookup failed");
                Err(AuthzError::AccessDenied)
            }
        }
    }

    /// Fails with `AdminRequired` unless the principal has the admin role.
    pub fn verify_admin_role(&self, principal: &Principal) -> Result<(), AuthzError> {
        if principal.is_admin() {
            Ok(())
        } else {
            Err(AuthzError::AdminRequired)
        }
    }
}
