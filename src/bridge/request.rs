//! Capture request identity and lifecycle.

use std::fmt;
use std::time::{Instant, SystemTime};

use crate::camera::CaptureOptions;

/// Identifier of one in-flight capture, allocated in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One capture handed to the photo output.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub id: RequestId,
    pub options: CaptureOptions,
    /// Monotonic creation time, for latency measurements
    pub created_at: Instant,
    /// Wall-clock creation time
    pub submitted_at: SystemTime,
}

impl CaptureRequest {
    pub fn new(id: RequestId, options: CaptureOptions) -> Self {
        Self {
            id,
            options,
            created_at: Instant::now(),
            submitted_at: SystemTime::now(),
        }
    }
}

/// Lifecycle of a request still held by the bridge.
///
/// `Resolved` has no variant: a resolved request is removed from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Registered, output not yet confirmed the enqueue
    Submitted,
    /// Output accepted the capture; waiting for `on_finished`
    AwaitingCompletion,
}
