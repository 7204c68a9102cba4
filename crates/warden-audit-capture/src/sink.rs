//! Audit sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use warden_audit_types::DecisionRecord;

/// Errors raised while persisting an audit record.
#[derive(Debug, Error)]
pub enum AuditSinkError {
    /// The capture buffer is full.
    #[error("audit buffer full")]
    BufferFull,

    /// The downstream consumer is gone.
    #[error("audit channel closed")]
    Closed,

    /// Backend-specific persistence failure.
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for decision records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record.
    async fn append(&self, record: &DecisionRecord) -> Result<(), AuditSinkError>;
}

/// Emits every record as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn append(&self, record: &DecisionRecord) -> Result<(), AuditSinkError> {
        let resource_id = record.resource_id().map(|id| id.as_str());
        if record.success() {
            info!(
                target: "warden::audit",
                event = %record.event_type(),
                record_id = %record.id(),
                principal_id = ?record.principal_id(),
                action = %record.action(),
                resource_kind = ?record.resource_kind(),
                resource_id = ?resource_id,
                "Authorization granted"
            );
        } else {
            warn!(
                target: "warden::audit",
                event = %record.event_type(),
                record_id = %record.id(),
                principal_id = ?record.principal_id(),
                action = %record.action(),
                resource_kind = ?record.resource_kind(),
                resource_id = ?resource_id,
                reason = %record.reason(),
                severity = ?record.severity(),
                "Authorization denied"
            );
        }
        Ok(())
    }
}

/// In-memory append-only trail.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<DecisionRecord>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().clone()
    }

    /// Number of records appended.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn append(&self, record: &DecisionRecord) -> Result<(), AuditSinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit_types::DecisionReason;

    #[tokio::test]
    async fn test_memory_sink_appends_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        let first = DecisionRecord::builder("a", DecisionReason::AuthRequired).build();
        let second = DecisionRecord::builder("b", DecisionReason::Granted).build();
        sink.append(&first).await.unwrap();
        sink.append(&second).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
        assert_eq!(records[1], second);
    }

    #[tokio::test]
    async fn test_memory_sink_clones_share_trail() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        clone
            .append(&DecisionRecord::builder("a", DecisionReason::RateLimited).build())
            .await
            .unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let sink = TracingSink;
        let record = DecisionRecord::builder("a", DecisionReason::AdminRequired).build();
        assert!(sink.append(&record).await.is_ok());
    }
}
