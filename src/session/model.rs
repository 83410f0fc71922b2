//! Camera session model: the UI-facing caller of the bridge.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tokio::sync::broadcast;

use super::sink::{PhotoSink, SinkError};
use crate::bridge::{
    ActivityChannel, BridgeError, CaptureActivityEvent, CaptureBridge, CaptureFailure, RequestId,
};
use crate::camera::{CaptureOptions, CapturedPhoto};

/// Session events buffered for slow subscribers.
const EVENT_CAPACITY: usize = 64;

/// Summary of the most recent successful capture (the thumbnail slot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCapture {
    pub request_id: RequestId,
    pub digest: String,
    pub bytes: usize,
    pub is_proxy: bool,
    pub captured_at: SystemTime,
}

impl From<&CapturedPhoto> for LastCapture {
    fn from(photo: &CapturedPhoto) -> Self {
        Self {
            request_id: photo.request_id,
            digest: photo.digest(),
            bytes: photo.len(),
            is_proxy: photo.is_proxy,
            captured_at: photo.captured_at,
        }
    }
}

/// Everything a view layer can observe about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The "capturing" indicator turned on or off
    CapturingChanged(bool),
    /// Activity of one capture; `WillBegin` drives the shutter flash
    Activity {
        request_id: RequestId,
        event: CaptureActivityEvent,
    },
    /// A photo was captured and stored
    PhotoCaptured(LastCapture),
    /// A capture failed
    CaptureFailed {
        request_id: RequestId,
        reason: String,
    },
}

/// Errors from [`CameraSession::capture_photo`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Capture(#[from] CaptureFailure),

    #[error("Failed to store photo: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Default)]
struct SessionState {
    last_capture: Option<LastCapture>,
    in_flight: usize,
}

/// Shared state plus the event publisher.
struct Shared {
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Keeps the capturing indicator on while a capture is in flight, including
/// when the caller abandons the capture future.
struct CapturingGuard {
    shared: Arc<Shared>,
}

impl CapturingGuard {
    fn start(shared: Arc<Shared>) -> Self {
        {
            // Publish under the lock so toggles from racing guards stay ordered.
            let mut state = shared.lock();
            state.in_flight += 1;
            if state.in_flight == 1 {
                shared.publish(SessionEvent::CapturingChanged(true));
            }
        }
        Self { shared }
    }
}

impl Drop for CapturingGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.shared.publish(SessionEvent::CapturingChanged(false));
        }
    }
}

/// Drives captures on behalf of a view layer.
///
/// Submits through the bridge, forwards activity to subscribers, stores
/// successful photos in the sink, and tracks the last captured item.
#[derive(Clone)]
pub struct CameraSession {
    bridge: CaptureBridge,
    sink: Arc<dyn PhotoSink>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("bridge", &self.bridge)
            .field("is_capturing", &self.is_capturing())
            .finish_non_exhaustive()
    }
}

impl CameraSession {
    pub fn new(bridge: CaptureBridge, sink: Arc<dyn PhotoSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            bridge,
            sink,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::default()),
                events,
            }),
        }
    }

    /// Subscribe to session events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn bridge(&self) -> &CaptureBridge {
        &self.bridge
    }

    pub fn last_capture(&self) -> Option<LastCapture> {
        self.shared.lock().last_capture.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.lock().in_flight > 0
    }

    /// Capture one photo.
    ///
    /// Publishes, in order: `CapturingChanged(true)` (if idle before),
    /// `Activity` events as they happen, `Activity(Completed)`, then
    /// `PhotoCaptured` or `CaptureFailed`, and `CapturingChanged(false)` once
    /// nothing is in flight.
    pub async fn capture_photo(
        &self,
        options: CaptureOptions,
    ) -> Result<CapturedPhoto, SessionError> {
        let (pending, activity) = self.bridge.submit(options)?;
        let request_id = pending.id();
        let _capturing = CapturingGuard::start(Arc::clone(&self.shared));

        let forwarder = tokio::spawn(forward_activity(activity, Arc::clone(&self.shared)));
        let result = pending.await;

        // The feed closes right after the result is committed.
        if let Err(e) = forwarder.await {
            log::warn!("Activity forwarder for {} failed: {}", request_id, e);
        }
        self.shared.publish(SessionEvent::Activity {
            request_id,
            event: CaptureActivityEvent::Completed,
        });

        match result {
            Ok(photo) => self.finish_success(photo),
            Err(failure) => {
                log::warn!("Capture {} failed: {}", request_id, failure);
                self.publish_failure(request_id, failure.to_string());
                Err(failure.into())
            }
        }
    }

    fn finish_success(&self, photo: CapturedPhoto) -> Result<CapturedPhoto, SessionError> {
        if let Err(e) = self.sink.store(&photo) {
            log::error!("Failed to store photo from {}: {}", photo.request_id, e);
            self.publish_failure(photo.request_id, e.to_string());
            return Err(e.into());
        }

        let summary = LastCapture::from(&photo);
        self.shared.lock().last_capture = Some(summary.clone());
        self.shared.publish(SessionEvent::PhotoCaptured(summary));
        Ok(photo)
    }

    fn publish_failure(&self, request_id: RequestId, reason: String) {
        self.shared
            .publish(SessionEvent::CaptureFailed { request_id, reason });
    }
}

async fn forward_activity(mut activity: ActivityChannel, shared: Arc<Shared>) {
    let request_id = activity.id();
    while let Some(event) = activity.recv().await {
        shared.publish(SessionEvent::Activity { request_id, event });
    }
}
