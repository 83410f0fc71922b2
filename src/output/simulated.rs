//! Simulated photo output that drives the delegate from its own threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{
    CaptureDelegate, HardwareError, OutputCapabilities, OutputConfiguration, OutputError,
    PhotoOutput,
};
use crate::bridge::{CaptureRequest, RequestId};
use crate::camera::{Dimensions, PhotoFormat};

/// Magic prefix of every simulated payload.
const PAYLOAD_MAGIC: &[u8; 8] = b"SIMPHOTO";

/// How a simulated capture plays out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SimulatedOutcome {
    /// will-begin, one payload, clean finish
    #[default]
    Succeed,
    /// will-begin, then finish with an error
    FailOnFinish(String),
    /// will-begin, intermediate error, then clean finish (no payload)
    IntermediateError(String),
    /// payload and clean finish without a will-begin
    SkipWillBegin,
}

/// A photo output that pretends to be camera hardware.
///
/// Each capture runs on its own thread, which sleeps for the configured
/// latency and then plays the next scripted [`SimulatedOutcome`] (or the
/// default one) against the delegate.
pub struct SimulatedOutput {
    capabilities: OutputCapabilities,
    configuration: Mutex<OutputConfiguration>,
    latency: Duration,
    script: Mutex<VecDeque<SimulatedOutcome>>,
    default_outcome: SimulatedOutcome,
    running: AtomicBool,
    captures: AtomicU64,
}

impl std::fmt::Debug for SimulatedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedOutput")
            .field("capabilities", &self.capabilities)
            .field("latency", &self.latency)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SimulatedOutput {
    pub fn new(capabilities: OutputCapabilities, latency: Duration) -> Self {
        let configuration = OutputConfiguration::from_capabilities(&capabilities);
        Self {
            capabilities,
            configuration: Mutex::new(configuration),
            latency,
            script: Mutex::new(VecDeque::new()),
            default_outcome: SimulatedOutcome::Succeed,
            running: AtomicBool::new(true),
            captures: AtomicU64::new(0),
        }
    }

    /// Outcome used once the script runs dry.
    pub fn with_default_outcome(mut self, outcome: SimulatedOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Queue outcomes for the next captures, in order.
    pub fn script<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = SimulatedOutcome>,
    {
        lock(&self.script).extend(outcomes);
    }

    /// The configuration most recently applied by the bridge.
    pub fn configuration(&self) -> OutputConfiguration {
        *lock(&self.configuration)
    }

    /// Number of captures accepted so far.
    pub fn capture_count(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }

    /// Stop accepting captures. Captures already running still finish.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> SimulatedOutcome {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.clone())
    }
}

impl PhotoOutput for SimulatedOutput {
    fn capabilities(&self) -> OutputCapabilities {
        self.capabilities.clone()
    }

    fn apply_configuration(&self, configuration: &OutputConfiguration) {
        log::debug!(
            "Simulated output reconfigured: max {} / {}",
            configuration.max_dimensions,
            configuration.max_quality
        );
        *lock(&self.configuration) = *configuration;
    }

    fn enqueue(
        &self,
        request: &CaptureRequest,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Result<(), OutputError> {
        if !self.is_running() {
            return Err(OutputError::NotRunning);
        }

        let configuration = self.configuration();
        let dimensions = request
            .options
            .max_dimensions
            .unwrap_or(configuration.max_dimensions);
        let format = request.options.format;
        let id = request.id;
        let outcome = self.next_outcome();
        let latency = self.latency;
        self.captures.fetch_add(1, Ordering::SeqCst);

        thread::Builder::new()
            .name(format!("sim-capture-{}", id.as_u64()))
            .spawn(move || {
                thread::sleep(latency);
                play_outcome(delegate.as_ref(), id, format, dimensions, outcome);
            })
            .map_err(|e| OutputError::Rejected(e.to_string()))?;

        Ok(())
    }
}

/// Drive one capture's callbacks.
fn play_outcome(
    delegate: &dyn CaptureDelegate,
    id: RequestId,
    format: PhotoFormat,
    dimensions: Dimensions,
    outcome: SimulatedOutcome,
) {
    match outcome {
        SimulatedOutcome::Succeed => {
            delegate.on_will_begin(id);
            delegate.on_intermediate_data(id, Some(encode_payload(format, dimensions)), None);
            delegate.on_finished(id, None);
        }
        SimulatedOutcome::FailOnFinish(reason) => {
            delegate.on_will_begin(id);
            delegate.on_finished(id, Some(HardwareError(reason)));
        }
        SimulatedOutcome::IntermediateError(reason) => {
            delegate.on_will_begin(id);
            delegate.on_intermediate_data(id, None, Some(HardwareError(reason)));
            delegate.on_finished(id, None);
        }
        SimulatedOutcome::SkipWillBegin => {
            delegate.on_intermediate_data(id, Some(encode_payload(format, dimensions)), None);
            delegate.on_finished(id, None);
        }
    }
}

/// Build a synthetic photo: magic, format tag, then width and height (LE).
pub fn encode_payload(format: PhotoFormat, dimensions: Dimensions) -> Vec<u8> {
    let tag = format.as_str().as_bytes();
    let mut data = Vec::with_capacity(PAYLOAD_MAGIC.len() + 1 + tag.len() + 8);
    data.extend_from_slice(PAYLOAD_MAGIC);
    data.push(tag.len() as u8);
    data.extend_from_slice(tag);
    data.extend_from_slice(&dimensions.width.to_le_bytes());
    data.extend_from_slice(&dimensions.height.to_le_bytes());
    data
}

/// Recover format and dimensions from a payload built by [`encode_payload`].
pub fn decode_payload(data: &[u8]) -> Option<(PhotoFormat, Dimensions)> {
    let rest = data.strip_prefix(PAYLOAD_MAGIC.as_slice())?;
    let (&tag_len, rest) = rest.split_first()?;
    let tag_len = tag_len as usize;
    if rest.len() != tag_len + 8 {
        return None;
    }
    let format = match &rest[..tag_len] {
        b"jpeg" => PhotoFormat::Jpeg,
        b"heif" => PhotoFormat::Heif,
        b"raw" => PhotoFormat::Raw,
        _ => return None,
    };
    let width = u32::from_le_bytes(rest[tag_len..tag_len + 4].try_into().ok()?);
    let height = u32::from_le_bytes(rest[tag_len + 4..].try_into().ok()?);
    Some((format, Dimensions::new(width, height)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
