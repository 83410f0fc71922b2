//! CLI argument parsing with clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{Flash, Format, Quality};
use crate::camera::{CaptureOptions, Dimensions};

/// Drive simulated photo captures through the capture request bridge
#[derive(Parser, Debug)]
#[command(name = "shutter-bridge")]
#[command(version, about = "Photo capture request bridge demo", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show what the simulated camera supports
    Capabilities,
    /// Capture photos
    Capture(CaptureArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Number of photos to take
    #[arg(long, short = 'n', default_value = "1")]
    pub count: u32,

    /// Submit all captures at once instead of one after another
    #[arg(long)]
    pub concurrent: bool,

    /// Photo format (default from config)
    #[arg(long, short)]
    pub format: Option<Format>,

    /// Size ceiling as WIDTHxHEIGHT (e.g., 1920x1080)
    #[arg(long)]
    pub max_size: Option<Dimensions>,

    /// Speed vs quality trade-off
    #[arg(long, short)]
    pub quality: Option<Quality>,

    /// Flash mode
    #[arg(long)]
    pub flash: Option<Flash>,

    /// Make every Nth capture fail in the simulated hardware
    #[arg(long, value_name = "N")]
    pub fail_every: Option<u32>,
}

impl CaptureArgs {
    /// Overlay command line choices on the configured defaults.
    pub fn options(&self, defaults: &CaptureOptions) -> CaptureOptions {
        let mut options = defaults.clone();
        if let Some(format) = self.format {
            options.format = format.into();
        }
        if let Some(dimensions) = self.max_size {
            options.max_dimensions = Some(dimensions);
        }
        if let Some(quality) = self.quality {
            options.quality = quality.into();
        }
        if let Some(flash) = self.flash {
            options.flash = flash.into();
        }
        options
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
