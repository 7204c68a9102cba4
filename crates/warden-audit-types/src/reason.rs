//! Closed enumeration of decision reasons.

use crate::{AuditEventType, AuditSeverity};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Why a decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    /// Every check passed.
    Granted,
    /// No session was presented.
    AuthRequired,
    /// The session was unknown or expired.
    SessionInvalid,
    /// The principal's account is disabled.
    AccountInactive,
    /// The principal does not own the resource, or it does not exist.
    AccessDenied,
    /// The operation requires the admin role.
    AdminRequired,
    /// The per-operation request window is exhausted.
    RateLimited,
    /// The policy's additional predicate rejected the call.
    CustomCheckFailed,
}

impl DecisionReason {
    /// All reasons, in declaration order.
    pub fn all() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }

    /// The event type this reason belongs to.
    pub fn event_type(&self) -> AuditEventType {
        match self {
            Self::Granted => AuditEventType::AuthorizationGranted,
            Self::AuthRequired
            | Self::SessionInvalid
            | Self::AccountInactive
            | Self::AccessDenied
            | Self::AdminRequired
            | Self::RateLimited
            | Self::CustomCheckFailed => AuditEventType::AuthorizationDenied,
        }
    }

    /// Get the default severity for this reason.
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            Self::Granted => AuditSeverity::Info,
            Self::AuthRequired | Self::SessionInvalid => AuditSeverity::Low,
            Self::AccountInactive | Self::RateLimited => AuditSeverity::Medium,
            Self::AccessDenied | Self::AdminRequired | Self::CustomCheckFailed => {
                AuditSeverity::High
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_only_granted_maps_to_grant_event() {
        for reason in DecisionReason::all() {
            assert_eq!(
                reason.event_type().is_granted(),
                reason == DecisionReason::Granted,
                "{reason}"
            );
        }
    }

    #[test]
    fn test_reason_string_forms() {
        assert_eq!(DecisionReason::AccessDenied.to_string(), "ACCESS_DENIED");
        assert_eq!(
            DecisionReason::from_str("CUSTOM_CHECK_FAILED").unwrap(),
            DecisionReason::CustomCheckFailed
        );
        assert_eq!(
            serde_json::to_string(&DecisionReason::RateLimited).unwrap(),
            "\"RATE_LIMITED\""
        );
    }

    #[test]
    fn test_denials_are_never_info() {
        for reason in DecisionReason::all().filter(|r| *r != DecisionReason::Granted) {
            assert!(reason.default_severity().meets_threshold(AuditSeverity::Low));
        }
    }
}
