//! Batch collection for efficient persistence.

use crate::CapturedEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use warden_common_config::AuditSettings;

/// Configuration for batch collection.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum records per batch.
    pub max_batch_size: usize,
    /// Maximum time to wait before flushing.
    pub max_batch_age: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from(&AuditSettings::default())
    }
}

impl From<&AuditSettings> for BatchConfig {
    fn from(settings: &AuditSettings) -> Self {
        Self {
            max_batch_size: settings.batch_size.max(1),
            max_batch_age: Duration::from_millis(settings.batch_age_ms.max(1)),
        }
    }
}

/// Collected batch of records.
#[derive(Debug)]
pub struct EventBatch {
    pub events: Vec<CapturedEvent>,
    pub collected_at: Instant,
}

impl EventBatch {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            collected_at: Instant::now(),
        }
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Batch collector that aggregates records.
pub struct BatchCollector {
    config: BatchConfig,
    current_batch: EventBatch,
}

impl BatchCollector {
    /// Create a new collector.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            current_batch: EventBatch::new(),
        }
    }

    /// Add a record to the current batch.
    /// Returns Some(batch) if the batch is ready to flush.
    pub fn add(&mut self, event: CapturedEvent) -> Option<EventBatch> {
        if self.current_batch.is_empty() {
            self.current_batch.collected_at = Instant::now();
        }
        self.current_batch.events.push(event);

        if self.should_flush() {
            Some(self.take_batch())
        } else {
            None
        }
    }

    /// Check if current batch should be flushed.
    pub fn should_flush(&self) -> bool {
        self.current_batch.len() >= self.config.max_batch_size || self.is_due()
    }

    /// Check if batch is due based on age alone.
    pub fn is_due(&self) -> bool {
        !self.current_batch.is_empty()
            && self.current_batch.collected_at.elapsed() >= self.config.max_batch_age
    }

    /// Take the current batch and reset.
    pub fn take_batch(&mut self) -> EventBatch {
        std::mem::replace(&mut self.current_batch, EventBatch::new())
    }

    /// Check if there are pending records.
    pub fn has_pending(&self) -> bool {
        !self.current_batch.is_empty()
    }
}

/// Drain captured records into batches until the capture channel closes.
pub async fn batch_processing_loop(
    mut receiver: mpsc::Receiver<CapturedEvent>,
    batch_sender: mpsc::Sender<EventBatch>,
    config: BatchConfig,
) {
    let mut collector = BatchCollector::new(config.clone());
    let mut interval = tokio::time::interval((config.max_batch_age / 2).max(Duration::from_millis(1)));

    loop {
        tokio::select! {
            maybe_event = receiver.recv() => {
                let Some(event) = maybe_event else { break };
                if let Some(batch) = collector.add(event) {
                    debug!("Flushing batch of {} audit records (size limit)", batch.len());
                    if batch_sender.send(batch).await.is_err() {
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                if collector.is_due() {
                    let batch = collector.take_batch();
                    debug!("Flushing batch of {} audit records (time limit)", batch.len());
                    if batch_sender.send(batch).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    if collector.has_pending() {
        let batch = collector.take_batch();
        let _ = batch_sender.send(batch).await;
    }
}
