//! CLI enum types for photo format, quality and flash options.

use clap::ValueEnum;

use crate::camera::{FlashMode, PhotoFormat, QualityPrioritization};

/// Photo encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Jpeg,
    Heif,
    Raw,
}

impl From<Format> for PhotoFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Jpeg => PhotoFormat::Jpeg,
            Format::Heif => PhotoFormat::Heif,
            Format::Raw => PhotoFormat::Raw,
        }
    }
}

/// Speed vs quality trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Quality {
    Speed,
    #[default]
    Balanced,
    Quality,
}

impl From<Quality> for QualityPrioritization {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Speed => QualityPrioritization::Speed,
            Quality::Balanced => QualityPrioritization::Balanced,
            Quality::Quality => QualityPrioritization::Quality,
        }
    }
}

/// Flash behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Flash {
    #[default]
    Off,
    On,
    Auto,
}

impl From<Flash> for FlashMode {
    fn from(f: Flash) -> Self {
        match f {
            Flash::Off => FlashMode::Off,
            Flash::On => FlashMode::On,
            Flash::Auto => FlashMode::Auto,
        }
    }
}
