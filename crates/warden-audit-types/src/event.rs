//! The authorization decision record.

use crate::{AuditEventId, AuditEventType, AuditSeverity, DecisionReason};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_common_core::{OperationId, PrincipalId, ResourceId, Timestamp};

/// One authorization decision.
///
/// Built through [`DecisionRecord::builder`]; fields are private so a
/// written record cannot be altered afterwards. Records read back from a
/// store are rejected when `eventType` or `success` disagree with `reason`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredRecord")]
pub struct DecisionRecord {
    id: AuditEventId,
    event_type: AuditEventType,
    principal_id: Option<PrincipalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<ResourceId>,
    action: OperationId,
    success: bool,
    reason: DecisionReason,
    severity: AuditSeverity,
    timestamp: Timestamp,
}

impl DecisionRecord {
    /// Start a record for `action` decided for `reason`.
    pub fn builder(action: impl Into<OperationId>, reason: DecisionReason) -> DecisionRecordBuilder {
        DecisionRecordBuilder::new(action.into(), reason)
    }

    /// Unique record id.
    pub fn id(&self) -> AuditEventId {
        self.id
    }

    /// `authorization.granted` or `authorization.denied`.
    pub fn event_type(&self) -> AuditEventType {
        self.event_type
    }

    /// Principal the decision was made for, when one had been resolved.
    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.principal_id
    }

    /// Kind of the targeted resource, for resource-scoped decisions.
    pub fn resource_kind(&self) -> Option<&str> {
        self.resource_kind.as_deref()
    }

    /// Targeted resource, always in string form.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        self.resource_id.as_ref()
    }

    /// Operation the caller attempted.
    pub fn action(&self) -> &OperationId {
        &self.action
    }

    /// Mirrors the decision: `true` only for grants.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Reason for the decision.
    pub fn reason(&self) -> DecisionReason {
        self.reason
    }

    /// Severity of the record.
    pub fn severity(&self) -> AuditSeverity {
        self.severity
    }

    /// When the decision was made.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Serialize as a single JSON line for append-only stores.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A decoded record whose derived fields contradict its reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {id} is inconsistent: reason {reason} implies {expected}")]
pub struct InconsistentRecord {
    pub id: AuditEventId,
    pub reason: DecisionReason,
    pub expected: AuditEventType,
}

/// Wire form of [`DecisionRecord`], checked before it is accepted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: AuditEventId,
    event_type: AuditEventType,
    principal_id: Option<PrincipalId>,
    #[serde(default)]
    resource_kind: Option<String>,
    #[serde(default)]
    resource_id: Option<ResourceId>,
    action: OperationId,
    success: bool,
    reason: DecisionReason,
    severity: AuditSeverity,
    timestamp: Timestamp,
}

impl TryFrom<StoredRecord> for DecisionRecord {
    type Error = InconsistentRecord;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let expected = stored.reason.event_type();
        if stored.event_type != expected || stored.success != expected.is_granted() {
            return Err(InconsistentRecord {
                id: stored.id,
                reason: stored.reason,
                expected,
            });
        }

        Ok(Self {
            id: stored.id,
            event_type: stored.event_type,
            principal_id: stored.principal_id,
            resource_kind: stored.resource_kind,
            resource_id: stored.resource_id,
            action: stored.action,
            success: stored.success,
            reason: stored.reason,
            severity: stored.severity,
            timestamp: stored.timestamp,
        })
    }
}

/// Builder for decision records.
#[derive(Debug)]
pub struct DecisionRecordBuilder {
    action: OperationId,
    reason: DecisionReason,
    severity: Option<AuditSeverity>,
    principal_id: Option<PrincipalId>,
    resource_kind: Option<String>,
    resource_id: Option<ResourceId>,
}

impl DecisionRecordBuilder {
    fn new(action: OperationId, reason: DecisionReason) -> Self {
        Self {
            action,
            reason,
            severity: None,
            principal_id: None,
            resource_kind: None,
            resource_id: None,
        }
    }

    /// Set the principal.
    pub fn principal(mut self, principal_id: PrincipalId) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    /// Set the principal if known.
    pub fn maybe_principal(mut self, principal_id: Option<PrincipalId>) -> Self {
        self.principal_id = principal_id;
        self
    }

    /// Set the targeted resource kind.
    pub fn resource_kind(mut self, kind: impl Into<String>) -> Self {
        self.resource_kind = Some(kind.into());
        self
    }

    /// Set the targeted resource id (normalized to a string).
    pub fn resource_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Set the severity (defaults to the reason's default severity).
    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Build the record.
    pub fn build(self) -> DecisionRecord {
        let event_type = self.reason.event_type();
        DecisionRecord {
            id: AuditEventId::new(),
            event_type,
            principal_id: self.principal_id,
            resource_kind: self.resource_kind,
            resource_id: self.resource_id,
            action: self.action,
            success: event_type.is_granted(),
            reason: self.reason,
            severity: self.severity.unwrap_or_else(|| self.reason.default_severity()),
            timestamp: Timestamp::now(),
        }
    }
}
