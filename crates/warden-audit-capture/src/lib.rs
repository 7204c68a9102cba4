//! Audit trail capture for Warden.
//!
//! This crate provides:
//!
//! - [`AuditLogger`], the best-effort front door used by the authorization
//!   wrapper. Sink failures are logged and counted, never propagated.
//! - [`AuditSink`] implementations: structured tracing output, an in-memory
//!   trail, and a bounded non-blocking channel.
//! - Batch collection for persisting channel output in bulk.

mod batch;
mod capture;
mod logger;
mod sink;

pub use batch::{batch_processing_loop, BatchCollector, BatchConfig, EventBatch};
pub use capture::{CaptureConfig, CapturedEvent, ChannelSink};
pub use logger::AuditLogger;
pub use sink::{AuditSink, AuditSinkError, MemorySink, TracingSink};

pub use warden_audit_types::{AuditEventType, DecisionReason, DecisionRecord};
