//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, CaptureArgs, Command, ConfigAction};
pub use commands::{
    fault_script, handle_config_action, run_captures, show_capabilities, CaptureSummary,
    DEFAULT_CONFIG,
};
pub use enums::{Flash, Format, Quality};
