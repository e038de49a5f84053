//! Update sources.
//!
//! An [`UpdateSource`] is a pull source: each call returns the batch of updates
//! that is currently available, possibly empty. The kernel preserves whatever
//! order the source yields. Long polling and webhook servers are transport
//! concerns and live outside this workspace; the two sources here cover
//! in-process feeding and a single already-received webhook body.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::trace;

use crate::error::{SourceError, SourceResult};
use crate::update::Update;

/// A pull source of updates.
#[async_trait]
pub trait UpdateSource: Send + Sync + 'static {
    /// Returns every update currently available.
    async fn get_updates(&self) -> SourceResult<Vec<Update>>;
}

// =============================================================================
// QueueUpdateSource
// =============================================================================

/// Sending half paired with a [`QueueUpdateSource`].
pub type UpdateSender = mpsc::UnboundedSender<Update>;

/// An in-process source fed through a channel.
///
/// Each pull drains whatever has been queued since the previous pull. Once
/// every sender is dropped and the queue is empty, pulls fail with
/// [`SourceError::Closed`].
pub struct QueueUpdateSource {
    rx: Mutex<mpsc::UnboundedReceiver<Update>>,
}

impl QueueUpdateSource {
    pub fn new() -> (Self, UpdateSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx: Mutex::new(rx) }, tx)
    }
}

#[async_trait]
impl UpdateSource for QueueUpdateSource {
    async fn get_updates(&self) -> SourceResult<Vec<Update>> {
        let mut rx = self.rx.lock();
        let mut batch = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(update) => batch.push(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) if batch.is_empty() => {
                    return Err(SourceError::Closed);
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }
        trace!(count = batch.len(), "Drained update queue");
        Ok(batch)
    }
}

// =============================================================================
// WebhookUpdateSource
// =============================================================================

/// A source wrapping one webhook request body.
///
/// The body is parsed eagerly; the first pull yields the update and every
/// later pull yields nothing.
pub struct WebhookUpdateSource {
    pending: Mutex<Option<Update>>,
}

impl WebhookUpdateSource {
    /// Parses a webhook body.
    pub fn from_body(body: &str) -> SourceResult<Self> {
        let update = Update::from_json(body)?;
        Ok(Self::from_update(update))
    }

    pub fn from_update(update: Update) -> Self {
        Self {
            pending: Mutex::new(Some(update)),
        }
    }
}

#[async_trait]
impl UpdateSource for WebhookUpdateSource {
    async fn get_updates(&self) -> SourceResult<Vec<Update>> {
        Ok(self.pending.lock().take().into_iter().collect())
    }
}
