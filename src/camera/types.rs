//! Photo capture types and data structures.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::bridge::RequestId;

/// Photo dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// VGA (640x480) - quick previews
    pub const VGA: Dimensions = Dimensions {
        width: 640,
        height: 480,
    };

    /// Full HD (1920x1080)
    pub const FULL_HD: Dimensions = Dimensions {
        width: 1920,
        height: 1080,
    };

    /// 12 megapixel 4:3 sensor (4032x3024)
    pub const TWELVE_MP: Dimensions = Dimensions {
        width: 4032,
        height: 3024,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether both sides fit inside `ceiling`.
    pub fn fits_within(&self, ceiling: Dimensions) -> bool {
        self.width <= ceiling.width && self.height <= ceiling.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::TWELVE_MP
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s.split_once('x').ok_or_else(|| {
            format!(
                "Invalid dimensions '{}'. Use WIDTHxHEIGHT (e.g., 1920x1080)",
                s
            )
        })?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| format!("Invalid width '{}' in dimensions", w))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| format!("Invalid height '{}' in dimensions", h))?;
        if width == 0 || height == 0 {
            return Err(format!("Dimensions must be non-zero, got {}x{}", width, height));
        }
        Ok(Self { width, height })
    }
}

/// Encoded photo format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFormat {
    #[default]
    Jpeg,
    Heif,
    Raw,
}

impl PhotoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoFormat::Jpeg => "jpeg",
            PhotoFormat::Heif => "heif",
            PhotoFormat::Raw => "raw",
        }
    }
}

impl fmt::Display for PhotoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade-off between capture latency and image quality.
///
/// Ordered: `Speed < Balanced < Quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPrioritization {
    Speed,
    #[default]
    Balanced,
    Quality,
}

impl fmt::Display for QualityPrioritization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityPrioritization::Speed => "speed",
            QualityPrioritization::Balanced => "balanced",
            QualityPrioritization::Quality => "quality",
        };
        f.write_str(name)
    }
}

/// Flash behavior for a single capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

/// Options for one photo capture.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Requested encoding
    pub format: PhotoFormat,
    /// Size ceiling; `None` uses the output's configured ceiling
    pub max_dimensions: Option<Dimensions>,
    /// Latency vs quality trade-off
    pub quality: QualityPrioritization,
    /// Flash behavior
    pub flash: FlashMode,
}

impl CaptureOptions {
    pub fn with_format(mut self, format: PhotoFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.max_dimensions = Some(dimensions);
        self
    }

    pub fn with_quality(mut self, quality: QualityPrioritization) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_flash(mut self, flash: FlashMode) -> Self {
        self.flash = flash;
        self
    }
}

/// A successfully captured photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    /// Request that produced this photo
    pub request_id: RequestId,
    /// Encoded photo bytes, opaque to the bridge
    pub data: Vec<u8>,
    /// Lower-fidelity stand-in delivered ahead of the final photo
    pub is_proxy: bool,
    /// Wall-clock time the capture resolved
    pub captured_at: SystemTime,
}

impl CapturedPhoto {
    /// Hex-encoded SHA-256 of the payload.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        hex::encode(hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
