//! Subcommand handlers for capabilities, capture and config actions.

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::broadcast::error::RecvError;

use super::args::{CaptureArgs, ConfigAction};
use crate::bridge::{CaptureActivityEvent, CaptureBridge};
use crate::config::{default_path, Config};
use crate::output::{SimulatedOutcome, SimulatedOutput};
use crate::session::{CameraSession, MemorySink, SessionError, SessionEvent};

/// Reason given to captures failed on purpose by `--fail-every`.
const INJECTED_FAULT: &str = "simulated sensor fault";

/// Print the simulated camera's capabilities.
pub fn show_capabilities(config: &Config) {
    let caps = config.device.capabilities();
    println!("Simulated camera:");
    let formats: Vec<&str> = caps.supported_formats.iter().map(|f| f.as_str()).collect();
    println!("  Formats: {}", formats.join(", "));
    println!("  Max dimensions: {}", caps.max_dimensions);
    println!("  Max quality: {}", caps.max_quality);
    println!("  Flash: {}", if caps.has_flash { "yes" } else { "no" });
    println!("  Latency: {:?}", config.device.latency());
}

/// Outcome script for `count` captures where every `fail_every`th one fails.
pub fn fault_script(count: u32, fail_every: Option<u32>) -> Vec<SimulatedOutcome> {
    (1..=count)
        .map(|n| match fail_every {
            Some(every) if every > 0 && n % every == 0 => {
                SimulatedOutcome::FailOnFinish(INJECTED_FAULT.to_string())
            }
            _ => SimulatedOutcome::Succeed,
        })
        .collect()
}

/// Totals from a capture run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub succeeded: u32,
    pub failed: u32,
}

/// Run the captures requested on the command line.
///
/// Individual capture failures are reported and counted; only a rejected
/// submission (bad options) aborts the run.
pub async fn run_captures(
    config: &Config,
    args: &CaptureArgs,
) -> Result<CaptureSummary, SessionError> {
    let output = Arc::new(SimulatedOutput::new(
        config.device.capabilities(),
        config.device.latency(),
    ));
    output.script(fault_script(args.count, args.fail_every));

    let bridge = CaptureBridge::new(output, config.bridge.settings());
    let session = CameraSession::new(bridge, Arc::new(MemorySink::new()));
    let printer = tokio::spawn(print_events(session.subscribe()));

    let options = args.options(&config.capture);
    log::debug!("Capture options: {:?}", options);

    let results = if args.concurrent {
        join_all((0..args.count).map(|_| session.capture_photo(options.clone()))).await
    } else {
        let mut results = Vec::with_capacity(args.count as usize);
        for _ in 0..args.count {
            results.push(session.capture_photo(options.clone()).await);
        }
        results
    };

    let mut summary = CaptureSummary::default();
    for result in results {
        match result {
            Ok(_) => summary.succeeded += 1,
            Err(SessionError::Bridge(e)) => {
                drop(session);
                let _ = printer.await;
                return Err(SessionError::Bridge(e));
            }
            Err(_) => summary.failed += 1,
        }
    }

    // Closing the session's publisher ends the printer.
    drop(session);
    let _ = printer.await;

    println!();
    println!(
        "{} captured, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(summary)
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Event printer fell behind, skipped {} event(s)", skipped)
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::CapturingChanged(true) => println!("[capturing]"),
        SessionEvent::CapturingChanged(false) => println!("[idle]"),
        SessionEvent::Activity {
            request_id,
            event: CaptureActivityEvent::WillBegin,
        } => println!("  {} * flash", request_id),
        SessionEvent::Activity {
            request_id,
            event: CaptureActivityEvent::Completed,
        } => println!("  {} completed", request_id),
        SessionEvent::PhotoCaptured(last) => println!(
            "  {} saved {} bytes (sha256 {})",
            last.request_id,
            last.bytes,
            &last.digest[..16]
        ),
        SessionEvent::CaptureFailed { request_id, reason } => {
            println!("  {} failed: {}", request_id, reason)
        }
    }
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, config: &Config, path: Option<&Path>) {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!("  Activity capacity: {}", config.bridge.activity_capacity);
            println!("  Default format: {}", config.capture.format);
            println!("  Default quality: {}", config.capture.quality);
            match config.capture.max_dimensions {
                Some(d) => println!("  Default max size: {}", d),
                None => println!("  Default max size: device maximum"),
            }
            println!();
            show_capabilities(config);
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            if config_path.exists() {
                eprintln!("Config file already exists: {}", config_path.display());
                eprintln!("Use 'shutter-bridge config show' to view current settings.");
                std::process::exit(1);
            }

            if let Some(parent) = config_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("Error creating config directory: {}", e);
                    std::process::exit(1);
                }
            }

            if let Err(e) = std::fs::write(&config_path, DEFAULT_CONFIG) {
                eprintln!("Error writing config file: {}", e);
                std::process::exit(1);
            }

            println!("Created config file: {}", config_path.display());
        }
    }
}

/// Template written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# shutter-bridge configuration

[bridge]
# Activity events buffered per capture before the oldest are dropped
activity_capacity = 16

[capture]
# Format: jpeg, heif, raw
format = "jpeg"
# Quality: speed, balanced, quality
quality = "balanced"
# Flash: off, on, auto
flash = "off"
# Size ceiling (omit to use the device maximum)
# max_dimensions = { width = 1920, height = 1080 }

[device]
# Simulated camera capabilities
formats = ["jpeg", "heif"]
max_dimensions = { width = 4032, height = 3024 }
max_quality = "quality"
flash = true
# Delay before the simulated hardware starts calling back
latency_ms = 50
"#;
