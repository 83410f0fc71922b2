//! Awaitable result handle for a submitted capture.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::request::RequestId;
use crate::camera::CapturedPhoto;
use crate::output::HardwareError;

/// Outcome of one capture.
pub type CaptureResult = Result<CapturedPhoto, CaptureFailure>;

/// Why a capture produced no photo.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureFailure {
    /// The hardware reported a failure when the capture finished
    #[error("Capture failed: {0}")]
    Hardware(HardwareError),

    /// The capture finished cleanly but never delivered photo data
    #[error("Capture finished without producing photo data")]
    NoPayload,

    /// The bridge shut down before the hardware finished
    #[error("Capture abandoned: the bridge shut down before the capture finished")]
    Abandoned,
}

/// Not-yet-resolved result of a submitted capture.
///
/// Resolves exactly once. Dropping it is allowed at any time; the bridge
/// still finishes the request when the hardware reports completion.
#[derive(Debug)]
#[must_use = "a pending capture does nothing unless awaited or dropped deliberately"]
pub struct PendingCapture {
    id: RequestId,
    rx: oneshot::Receiver<CaptureResult>,
}

impl PendingCapture {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<CaptureResult>) -> Self {
        Self { id, rx }
    }

    /// Request this handle belongs to.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Await the result.
    pub async fn wait(self) -> CaptureResult {
        self.await
    }

    /// Block the current thread until the result arrives.
    ///
    /// Panics if called from inside an async runtime.
    pub fn blocking_wait(self) -> CaptureResult {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(CaptureFailure::Abandoned))
    }
}

impl Future for PendingCapture {
    type Output = CaptureResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the bridge went away without resolving.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CaptureFailure::Abandoned)))
    }
}
