//! Camera domain types shared by the bridge, the output seam and the session.
//!
//! - Capture configuration via [`CaptureOptions`], [`Dimensions`], [`PhotoFormat`]
//! - Capture results via [`CapturedPhoto`]

mod types;

pub use types::{
    CaptureOptions, CapturedPhoto, Dimensions, FlashMode, PhotoFormat, QualityPrioritization,
};
