//! Camera session: the view-facing side of photo capture.
//!
//! [`CameraSession`] is what a UI talks to. State changes are published as
//! [`SessionEvent`]s; successful photos go to a [`PhotoSink`].

mod model;
mod sink;

pub use model::{CameraSession, LastCapture, SessionError, SessionEvent};
pub use sink::{MemorySink, PhotoSink, SinkError};
