//! Authorization error taxonomy.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;
use warden_audit_types::DecisionReason;

/// Message used when a policy's additional check fails without a custom message.
pub const DEFAULT_CUSTOM_CHECK_MESSAGE: &str =
    "Access denied: additional authorization check failed";

/// Machine-readable code for every way a guarded call can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthRequired,
    SessionInvalid,
    AccountInactive,
    AccessDenied,
    AdminRequired,
    RateLimited,
    CustomCheckFailed,
    Internal,
}

impl ErrorCode {
    /// Audit reason for this code. `Internal` is a handler failure, not an
    /// authorization decision, and has none.
    pub fn audit_reason(&self) -> Option<DecisionReason> {
        match self {
            Self::AuthRequired => Some(DecisionReason::AuthRequired),
            Self::SessionInvalid => Some(DecisionReason::SessionInvalid),
            Self::AccountInactive => Some(DecisionReason::AccountInactive),
            Self::AccessDenied => Some(DecisionReason::AccessDenied),
            Self::AdminRequired => Some(DecisionReason::AdminRequired),
            Self::RateLimited => Some(DecisionReason::RateLimited),
            Self::CustomCheckFailed => Some(DecisionReason::CustomCheckFailed),
            Self::Internal => None,
        }
    }
}

/// A denied or failed guarded call. `Display` is the caller-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Session expired or invalid. Please sign in again.")]
    SessionInvalid,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Access denied: you do not have permission to access this resource")]
    AccessDenied,

    #[error("Administrator privileges required")]
    AdminRequired,

    #[error("Too many requests. Please try again in {}.", format_retry_after(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error("{message}")]
    CustomCheckFailed { message: String },

    #[error("An internal error occurred. Please try again later.")]
    Internal,
}

impl AuthzError {
    /// Get error code for client handling.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthRequired => ErrorCode::AuthRequired,
            Self::SessionInvalid => ErrorCode::SessionInvalid,
            Self::AccountInactive => ErrorCode::AccountInactive,
            Self::AccessDenied => ErrorCode::AccessDenied,
            Self::AdminRequired => ErrorCode::AdminRequired,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::CustomCheckFailed { .. } => ErrorCode::CustomCheckFailed,
            Self::Internal => ErrorCode::Internal,
        }
    }

    /// A custom-check failure with the policy's message or the default.
    pub fn custom_check_failed(message: Option<&str>) -> Self {
        Self::CustomCheckFailed {
            message: message.unwrap_or(DEFAULT_CUSTOM_CHECK_MESSAGE).to_string(),
        }
    }
}

/// Remaining window time rounded up to whole minutes, at least one.
pub fn format_retry_after(remaining: &Duration) -> String {
    let millis = remaining.as_millis();
    let minutes = millis.div_ceil(60_000).max(1);
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}
