//! Per-request activity feed.

use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::request::RequestId;

/// Progress of one capture as seen by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureActivityEvent {
    /// The sensor is about to be exposed (drive the shutter flash)
    WillBegin,
    /// The capture's result has been committed
    Completed,
}

/// Why [`ActivityChannel::try_recv`] returned nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActivityRecvError {
    #[error("no activity event available yet")]
    Empty,
    #[error("activity channel closed")]
    Closed,
}

/// Receiving end of a request's activity feed.
///
/// Bounded; when the consumer falls behind, the oldest events are dropped so
/// the hardware callback thread never blocks. The channel closes once the
/// request's result has been committed.
pub struct ActivityChannel {
    id: RequestId,
    rx: broadcast::Receiver<CaptureActivityEvent>,
}

impl std::fmt::Debug for ActivityChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityChannel")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ActivityChannel {
    pub(crate) fn new(id: RequestId, rx: broadcast::Receiver<CaptureActivityEvent>) -> Self {
        Self { id, rx }
    }

    /// Request this feed belongs to.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the next event. `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<CaptureActivityEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.log_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take an event without waiting.
    pub fn try_recv(&mut self) -> Result<CaptureActivityEvent, ActivityRecvError> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Ok(event),
                Err(TryRecvError::Lagged(skipped)) => self.log_lag(skipped),
                Err(TryRecvError::Empty) => return Err(ActivityRecvError::Empty),
                Err(TryRecvError::Closed) => return Err(ActivityRecvError::Closed),
            }
        }
    }

    /// Drain every remaining event until the channel closes.
    pub async fn collect(mut self) -> Vec<CaptureActivityEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }

    /// Adapt the feed into a [`Stream`] that ends when the channel closes.
    pub fn into_stream(self) -> impl Stream<Item = CaptureActivityEvent> {
        stream::unfold(self, |mut channel| async move {
            channel.recv().await.map(|event| (event, channel))
        })
    }

    fn log_lag(&self, skipped: u64) {
        log::warn!(
            "Activity consumer for {} fell behind, dropped {} event(s)",
            self.id,
            skipped
        );
    }
}
