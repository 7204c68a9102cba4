//! Audit event types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of authorization decision recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum AuditEventType {
    /// The call passed every check.
    #[serde(rename = "authorization.granted")]
    #[strum(serialize = "authorization.granted")]
    AuthorizationGranted,
    /// The call was denied before reaching its handler.
    #[serde(rename = "authorization.denied")]
    #[strum(serialize = "authorization.denied")]
    AuthorizationDenied,
}

impl AuditEventType {
    /// Whether this event records a grant.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::AuthorizationGranted)
    }
}
