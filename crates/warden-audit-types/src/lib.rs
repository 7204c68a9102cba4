//! Authorization decision record types for Warden.
//!
//! A [`DecisionRecord`] is the audit entry written for every denial and every
//! ownership-checked grant. Records are immutable once built: fields are only
//! readable, and `success` and the event type are derived from the reason so
//! they can never disagree with the decision. Decoding enforces the same rule.

mod event;
mod event_type;
mod id;
mod reason;
mod severity;

pub use event::{DecisionRecord, DecisionRecordBuilder, InconsistentRecord};
pub use event_type::AuditEventType;
pub use id::AuditEventId;
pub use reason::DecisionReason;
pub use severity::AuditSeverity;
