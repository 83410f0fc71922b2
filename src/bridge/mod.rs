//! Capture request bridge.
//!
//! Turns one callback-driven photo capture into:
//! - a [`PendingCapture`] that resolves exactly once with a [`CaptureResult`]
//! - an [`ActivityChannel`] of [`CaptureActivityEvent`]s, closed after the
//!   result is committed
//!
//! Use [`CaptureBridge::submit`] to start a capture.

mod activity;
mod capture_bridge;
mod errors;
mod pending;
mod request;

pub use activity::{ActivityChannel, ActivityRecvError, CaptureActivityEvent};
pub use capture_bridge::{
    validate_options, BridgeSettings, CaptureBridge, ConfigurationUpdate,
    DEFAULT_ACTIVITY_CAPACITY,
};
pub use errors::BridgeError;
pub use pending::{CaptureFailure, CaptureResult, PendingCapture};
pub use request::{CaptureRequest, RequestId, RequestState};
