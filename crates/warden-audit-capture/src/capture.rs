//! Non-blocking audit capture over a bounded channel.

use crate::sink::{AuditSink, AuditSinkError};
use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;
use warden_audit_types::DecisionRecord;
use warden_common_config::AuditSettings;

/// Configuration for audit capture.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum records to buffer before submissions start failing.
    pub buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&AuditSettings::default())
    }
}

impl From<&AuditSettings> for CaptureConfig {
    fn from(settings: &AuditSettings) -> Self {
        Self {
            buffer_size: settings.buffer_size,
        }
    }
}

/// A record waiting in the capture channel.
#[derive(Debug)]
pub struct CapturedEvent {
    pub record: DecisionRecord,
    pub captured_at: Instant,
}

/// Sink that hands records to a background consumer without waiting on it.
///
/// A full or closed channel is reported as a sink failure, which the
/// [`AuditLogger`](crate::AuditLogger) surfaces to monitoring.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<CapturedEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its records arrive on.
    pub fn new(config: CaptureConfig) -> (Self, mpsc::Receiver<CapturedEvent>) {
        let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));
        (Self { sender }, receiver)
    }

    /// Check if the capture channel is healthy.
    pub fn is_healthy(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Get approximate buffer usage (0.0 - 1.0).
    pub fn buffer_usage(&self) -> f64 {
        let capacity = self.sender.capacity();
        let max_capacity = self.sender.max_capacity();
        1.0 - (capacity as f64 / max_capacity as f64)
    }
}

#[async_trait]
impl AuditSink for ChannelSink {
    async fn append(&self, record: &DecisionRecord) -> Result<(), AuditSinkError> {
        let captured = CapturedEvent {
            record: record.clone(),
            captured_at: Instant::now(),
        };

        match self.sender.try_send(captured) {
            Ok(()) => {
                debug!("Audit record captured");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(AuditSinkError::BufferFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AuditSinkError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit_types::DecisionReason;

    fn record() -> DecisionRecord {
        DecisionRecord::builder("cases:get", DecisionReason::AccessDenied).build()
    }

    #[tokio::test]
    async fn test_records_arrive_on_receiver() {
        let (sink, mut receiver) = ChannelSink::new(CaptureConfig { buffer_size: 4 });
        let sent = record();
        sink.append(&sent).await.unwrap();

        let captured = receiver.recv().await.unwrap();
        assert_eq!(captured.record, sent);
    }

    #[tokio::test]
    async fn test_full_buffer_is_an_error() {
        let (sink, _receiver) = ChannelSink::new(CaptureConfig { buffer_size: 1 });
        sink.append(&record()).await.unwrap();
        assert!(matches!(
            sink.append(&record()).await,
            Err(AuditSinkError::BufferFull)
        ));
        assert!(sink.buffer_usage() > 0.99);
    }

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (sink, receiver) = ChannelSink::new(CaptureConfig::default());
        drop(receiver);
        assert!(!sink.is_healthy());
        assert!(matches!(
            sink.append(&record()).await,
            Err(AuditSinkError::Closed)
        ));
    }

    #[test]
    fn test_config_from_settings() {
        let settings = AuditSettings {
            buffer_size: 12,
            ..AuditSettings::default()
        };
        assert_eq!(CaptureConfig::from(&settings).buffer_size, 12);
    }
}
