//! shutter-bridge library crate.
//!
//! Bridges a callback-driven photo output into awaitable captures with a
//! live activity feed. See [`bridge::CaptureBridge`].

pub mod bridge;
pub mod camera;
pub mod cli;
pub mod config;
pub mod output;
pub mod session;
