//! Best-effort audit logging.

use crate::sink::{AuditSink, TracingSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;
use warden_audit_types::DecisionRecord;

/// Records authorization decisions into an [`AuditSink`].
///
/// Logging never fails from the caller's point of view: the decision it
/// describes has already been made. A sink failure is reported at error level
/// and counted in [`failure_count`](Self::failure_count).
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    failures: Arc<AtomicU64>,
}

impl AuditLogger {
    /// Create a logger writing to `sink`.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append a record.
    pub async fn log(&self, record: DecisionRecord) {
        if let Err(e) = self.sink.append(&record).await {
            let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
            error!(
                target: "warden::audit",
                error = %e,
                record_id = %record.id(),
                event = %record.event_type(),
                action = %record.action(),
                principal_id = ?record.principal_id(),
                reason = %record.reason(),
                failures = total,
                "Failed to persist audit record"
            );
        }
    }

    /// Number of records that could not be persisted.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("failures", &self.failure_count())
            .finish_non_exhaustive()
    }
}
