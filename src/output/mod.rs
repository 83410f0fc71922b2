//! The platform photo output seam.
//!
//! A [`PhotoOutput`] accepts capture operations and reports their progress
//! through the three-callback [`CaptureDelegate`] contract, on whatever
//! thread the hardware uses for callbacks.

mod simulated;

use std::sync::Arc;

use crate::bridge::{CaptureRequest, RequestId};
use crate::camera::{Dimensions, PhotoFormat, QualityPrioritization};

pub use simulated::{decode_payload, encode_payload, SimulatedOutcome, SimulatedOutput};

/// A failure reported by the capture hardware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HardwareError(pub String);

impl HardwareError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors raised synchronously by an output when enqueueing a capture.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The output is not running (session stopped or device gone)
    #[error("Photo output is not running")]
    NotRunning,

    /// The output refused the operation
    #[error("Photo output rejected the capture: {0}")]
    Rejected(String),
}

/// Receiver of the per-capture callbacks.
///
/// Every capture enqueued on a [`PhotoOutput`] gets at most one
/// `on_will_begin`, any number of `on_intermediate_data`, and exactly one
/// `on_finished`, in that order.
pub trait CaptureDelegate: Send + Sync {
    /// The hardware is about to expose the sensor.
    fn on_will_begin(&self, id: RequestId);

    /// Processed photo data, or the error that prevented producing it.
    fn on_intermediate_data(
        &self,
        id: RequestId,
        payload: Option<Vec<u8>>,
        error: Option<HardwareError>,
    );

    /// The capture is over; `error` is set if it failed.
    fn on_finished(&self, id: RequestId, error: Option<HardwareError>);
}

/// What the device can do at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCapabilities {
    pub supported_formats: Vec<PhotoFormat>,
    pub max_dimensions: Dimensions,
    pub max_quality: QualityPrioritization,
    pub has_flash: bool,
}

impl Default for OutputCapabilities {
    fn default() -> Self {
        Self {
            supported_formats: vec![PhotoFormat::Jpeg, PhotoFormat::Heif],
            max_dimensions: Dimensions::TWELVE_MP,
            max_quality: QualityPrioritization::Quality,
            has_flash: true,
        }
    }
}

/// Mutable configuration of the shared output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfiguration {
    /// Largest photo the output will produce
    pub max_dimensions: Dimensions,
    /// Highest quality prioritization a capture may request
    pub max_quality: QualityPrioritization,
}

impl OutputConfiguration {
    /// The widest configuration the capabilities allow.
    pub fn from_capabilities(capabilities: &OutputCapabilities) -> Self {
        Self {
            max_dimensions: capabilities.max_dimensions,
            max_quality: capabilities.max_quality,
        }
    }
}

/// A process-wide photo output (camera hardware).
pub trait PhotoOutput: Send + Sync {
    /// Static device capabilities.
    fn capabilities(&self) -> OutputCapabilities;

    /// Reconfigure the output. Only called while no capture is in flight.
    fn apply_configuration(&self, configuration: &OutputConfiguration);

    /// Start a capture. Callbacks may arrive on any thread, including
    /// synchronously from inside this call.
    fn enqueue(
        &self,
        request: &CaptureRequest,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Result<(), OutputError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_from_capabilities() {
        let caps = OutputCapabilities::default();
        let config = OutputConfiguration::from_capabilities(&caps);
        assert_eq!(config.max_dimensions, Dimensions::TWELVE_MP);
        assert_eq!(config.max_quality, QualityPrioritization::Quality);
    }

    #[test]
    fn test_output_error_display() {
        assert_eq!(
            format!("{}", OutputError::NotRunning),
            "Photo output is not running"
        );
        assert_eq!(
            format!("{}", OutputError::Rejected("busy".to_string())),
            "Photo output rejected the capture: busy"
        );
        assert_eq!(format!("{}", HardwareError::new("sensor")), "sensor");
    }
}
