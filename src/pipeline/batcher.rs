//! Batching and throttling pipeline
//!
//! Drains a `MediaSource` into fixed-size batches inside an optional batch
//! window, delivers them one at a time with a cooldown in between, and keeps
//! the chat informed with bracketing and progress messages.

use super::source::{MediaItem, MediaSource};
use crate::error::{UploadError, UploadResult};
use crate::utils::truncate_str;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Delivery Seam
// ============================================================================

/// Outbound side of the pipeline
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Send a plain text notification
    async fn send_text(&self, text: &str) -> UploadResult<()>;

    /// Send one batch as a media group
    async fn send_media_group(&self, batch: &Batch) -> UploadResult<()>;
}

// ============================================================================
// Batch
// ============================================================================

/// A group of items delivered together, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch in the whole source
    pub index: u64,
    pub items: Vec<MediaItem>,
}

impl Batch {
    fn new(index: u64, capacity: usize) -> Self {
        Self {
            index,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Batching and throttling settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items per batch
    pub group_size: usize,
    /// First batch index to send (resumes a partial run)
    pub start_index: u64,
    /// Last batch index to send; 0 means no upper bound
    pub end_index: u64,
    /// Pause after every full batch
    pub cooldown: Duration,
    /// Send a progress message after every this many batches (0 disables)
    pub progress_every: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: 4,
            start_index: 0,
            end_index: 0,
            cooldown: Duration::from_secs(3),
            progress_every: 10,
        }
    }
}

impl BatchConfig {
    /// Whether the item at filtered ordinal `idx` falls inside the batch window
    ///
    /// A window bound too large to express as an item ordinal is unreachable:
    /// an overflowing start admits nothing, an overflowing end caps nothing.
    pub fn in_window(&self, idx: usize) -> bool {
        let idx = idx as u64;
        let after_start = match self.first_item() {
            Some(first) => idx >= first,
            None => false,
        };
        let before_end = match self.last_item() {
            Some(last) => idx <= last,
            None => true,
        };
        after_start && before_end
    }

    /// Whether no item at or after `idx` can fall inside the window
    fn past_window(&self, idx: usize) -> bool {
        self.first_item().is_none() || self.last_item().is_some_and(|last| idx as u64 > last)
    }

    /// Ordinal of the first windowed item; `None` if it overflows
    fn first_item(&self) -> Option<u64> {
        self.start_index.checked_mul(self.group_size as u64)
    }

    /// Ordinal of the last windowed item; `None` for an open or overflowing end
    fn last_item(&self) -> Option<u64> {
        if self.end_index == 0 {
            return None;
        }
        self.end_index.checked_mul(self.group_size as u64)
    }

    /// Number of batches needed for `total` items
    pub fn estimated_batches(&self, total: usize) -> u64 {
        if self.group_size == 0 {
            return 0;
        }
        total.div_ceil(self.group_size) as u64
    }
}

// ============================================================================
// Pipeline Report
// ============================================================================

/// Summary of a completed pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub source: String,
    /// Image entries in the source
    pub total_items: usize,
    /// Entries inside the batch window
    pub window_items: usize,
    pub items_sent: usize,
    pub batches_sent: u64,
}

// ============================================================================
// Batcher
// ============================================================================

/// Drives one source through a `Deliver` implementation
pub struct Batcher<'a, D: Deliver + ?Sized> {
    deliver: &'a D,
    config: BatchConfig,
}

impl<'a, D: Deliver + ?Sized> Batcher<'a, D> {
    pub fn new(deliver: &'a D, config: BatchConfig) -> Self {
        Self { deliver, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Send every windowed item of `source`, batch by batch
    ///
    /// A batch that still fails after retries stops the pipeline; the failure
    /// is announced in the chat (best effort) and returned.
    pub async fn run<S: MediaSource + ?Sized>(&self, source: &mut S) -> UploadResult<PipelineReport> {
        let label = source.label().to_string();
        let total = source.len();
        let window_items = (0..total).filter(|&idx| self.config.in_window(idx)).count();
        let estimated = self.config.estimated_batches(total);

        tracing::info!(
            source = %label,
            total,
            window_items,
            estimated_batches = estimated,
            "Starting upload"
        );

        let mut report = PipelineReport {
            source: label.clone(),
            total_items: total,
            window_items,
            items_sent: 0,
            batches_sent: 0,
        };

        self.notify(&format!(
            "Starting upload from {}: {} images total, {} in this run",
            label, total, window_items
        ))
        .await?;

        let mut batch = Batch::new(self.config.start_index, self.config.group_size);

        for idx in 0..total {
            if !self.config.in_window(idx) {
                if self.config.past_window(idx) {
                    break;
                }
                continue;
            }

            let item = match source.load(idx) {
                Ok(item) => item,
                Err(e) => return Err(self.abort(&label, batch.index, e.into()).await),
            };
            batch.items.push(item);

            if batch.len() >= self.config.group_size {
                self.dispatch(&mut batch, &mut report, estimated, &label).await?;
                sleep(self.config.cooldown).await;
            }
        }

        if !batch.is_empty() {
            self.dispatch(&mut batch, &mut report, estimated, &label).await?;
        }

        self.notify(&format!(
            "Finished upload from {}: {} images in {} batches",
            label, report.items_sent, report.batches_sent
        ))
        .await?;

        tracing::info!(
            source = %label,
            items_sent = report.items_sent,
            batches_sent = report.batches_sent,
            "Upload completed"
        );
        Ok(report)
    }

    /// Deliver the current batch and start the next one
    async fn dispatch(
        &self,
        batch: &mut Batch,
        report: &mut PipelineReport,
        estimated: u64,
        label: &str,
    ) -> UploadResult<()> {
        if let Err(e) = self.deliver.send_media_group(batch).await {
            return Err(self.abort(label, batch.index, e).await);
        }

        report.items_sent += batch.len();
        report.batches_sent += 1;

        let completed = batch.index + 1;
        *batch = Batch::new(completed, self.config.group_size);

        if self.config.progress_every > 0 && completed % self.config.progress_every == 0 {
            tracing::info!(source = %label, batch = completed, estimated, "Upload progress");
            self.notify(&format!(
                "Progress for {}: batch {} / {}",
                label, completed, estimated
            ))
            .await?;
        }
        Ok(())
    }

    /// Send a notification; only pool exhaustion is treated as fatal
    async fn notify(&self, text: &str) -> UploadResult<()> {
        match self.deliver.send_text(text).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_pool_exhausted() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send notification");
                Ok(())
            }
        }
    }

    /// Announce a terminal failure and hand the error back
    async fn abort(&self, label: &str, batch_index: u64, err: UploadError) -> UploadError {
        tracing::error!(source = %label, batch = batch_index, error = %err, "Upload aborted");

        let text = format!(
            "Upload from {} stopped at batch {}: {}",
            label,
            batch_index,
            truncate_str(&err.to_string(), 300)
        );
        if let Err(e) = self.deliver.send_text(&text).await {
            tracing::warn!(error = %e, "Failed to report upload failure");
        }
        err
    }
}

// ============================================================================
// Tests
// ============================================================================
