//! Audit event severity levels.

use serde::{Deserialize, Serialize};

/// Severity level for audit records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    /// Normal operations.
    #[default]
    Info,
    /// Expected denials (missing or stale credentials).
    Low,
    /// Denials that may warrant review.
    Medium,
    /// Denials against a concrete resource or privilege.
    High,
}

impl AuditSeverity {
    /// Check if this severity meets a minimum threshold.
    pub fn meets_threshold(&self, threshold: Self) -> bool {
        *self >= threshold
    }
}
