//! Error types for bridge operations.
//!
//! Only synchronous caller errors live here. Everything that goes wrong
//! after a capture was accepted is delivered through its result handle as a
//! [`CaptureFailure`](super::CaptureFailure).

use crate::output::OutputError;

/// Errors returned synchronously by the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Capture options the device or current configuration cannot honor
    #[error("Invalid capture options: {0}")]
    InvalidOptions(String),

    /// Output configuration outside the device capabilities
    #[error("Invalid output configuration: {0}")]
    InvalidConfiguration(String),

    /// The photo output refused to start the capture
    #[error(transparent)]
    Output(#[from] OutputError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_options_display() {
        let err = BridgeError::InvalidOptions("format 'raw' is not supported".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid capture options"));
        assert!(msg.contains("raw"));
    }

    #[test]
    fn test_invalid_configuration_display() {
        let err = BridgeError::InvalidConfiguration("too large".to_string());
        assert_eq!(format!("{}", err), "Invalid output configuration: too large");
    }

    #[test]
    fn test_output_error_is_transparent() {
        let err: BridgeError = OutputError::NotRunning.into();
        assert_eq!(format!("{}", err), "Photo output is not running");
    }
}
