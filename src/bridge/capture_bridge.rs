//! The capture request bridge.
//!
//! Converts the output's callback contract into one awaited result per
//! request plus a live activity feed. Bookkeeping lives in a table keyed by
//! request id behind a mutex, since callbacks arrive on hardware threads.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Instant, SystemTime};

use tokio::sync::{broadcast, oneshot};

use super::activity::{ActivityChannel, CaptureActivityEvent};
use super::errors::BridgeError;
use super::pending::{CaptureFailure, CaptureResult, PendingCapture};
use super::request::{CaptureRequest, RequestId, RequestState};
use crate::camera::{CaptureOptions, CapturedPhoto, FlashMode};
use crate::output::{
    CaptureDelegate, HardwareError, OutputCapabilities, OutputConfiguration, PhotoOutput,
};

/// Default number of activity events buffered per request.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 16;

/// Tunables for a [`CaptureBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Activity events kept for a slow consumer before the oldest are dropped
    pub activity_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
        }
    }
}

/// What happened to a configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationUpdate {
    /// Applied to the output immediately
    Applied,
    /// Queued until the `pending` in-flight captures resolve
    Deferred { pending: usize },
}

/// Bookkeeping for one unresolved request.
struct RequestEntry {
    state: RequestState,
    result_tx: oneshot::Sender<CaptureResult>,
    activity_tx: broadcast::Sender<CaptureActivityEvent>,
    payload: Option<Vec<u8>>,
    intermediate_error: Option<HardwareError>,
    will_begin_seen: bool,
    created_at: Instant,
}

impl RequestEntry {
    /// Commit the outcome, then close the activity feed.
    ///
    /// Consumes the entry, so a request cannot be resolved twice.
    fn resolve(self, id: RequestId, error: Option<HardwareError>) {
        let RequestEntry {
            result_tx,
            activity_tx,
            payload,
            intermediate_error,
            created_at,
            ..
        } = self;

        if let Some(err) = &intermediate_error {
            log::warn!(
                "Capture {} had an intermediate error that is not reported to the caller: {}",
                id,
                err
            );
        }

        let result = match (error, payload) {
            (Some(err), _) => Err(CaptureFailure::Hardware(err)),
            (None, None) => Err(CaptureFailure::NoPayload),
            (None, Some(data)) => Ok(CapturedPhoto {
                request_id: id,
                data,
                is_proxy: false,
                captured_at: SystemTime::now(),
            }),
        };

        match &result {
            Ok(photo) => log::info!(
                "Capture {} succeeded: {} bytes in {:?}",
                id,
                photo.len(),
                created_at.elapsed()
            ),
            Err(failure) => log::info!("Capture {} failed: {}", id, failure),
        }

        if result_tx.send(result).is_err() {
            log::debug!("Capture {} resolved after its caller went away", id);
        }
        drop(activity_tx);
    }

    fn abandon(self, id: RequestId) {
        log::warn!("Capture {} abandoned: bridge shut down", id);
        let _ = self.result_tx.send(Err(CaptureFailure::Abandoned));
    }
}

struct BridgeState {
    requests: HashMap<RequestId, RequestEntry>,
    next_id: u64,
    /// Ids whose enqueue the output refused; they never reach the table again.
    refused: HashSet<RequestId>,
    active_configuration: OutputConfiguration,
    queued_configuration: Option<OutputConfiguration>,
}

/// Why a callback named no pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaleCallback {
    Resolved,
    Refused,
    Unknown,
}

impl std::fmt::Display for StaleCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleCallback::Resolved => write!(f, "already resolved"),
            StaleCallback::Refused => write!(f, "refused"),
            StaleCallback::Unknown => write!(f, "unknown"),
        }
    }
}

impl BridgeState {
    fn allocate_id(&mut self) -> RequestId {
        let id = RequestId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Classify an id that is not in the table.
    fn stale(&self, id: RequestId) -> StaleCallback {
        if self.refused.contains(&id) {
            StaleCallback::Refused
        } else if id.as_u64() < self.next_id {
            StaleCallback::Resolved
        } else {
            StaleCallback::Unknown
        }
    }
}

struct BridgeInner {
    output: Arc<dyn PhotoOutput>,
    capabilities: OutputCapabilities,
    settings: BridgeSettings,
    state: Mutex<BridgeState>,
    protocol_violations: AtomicU64,
}

impl BridgeInner {
    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        // Every mutation is a single insert, remove or field write, so the
        // table is consistent even if a holder panicked.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn protocol_violation(&self, state: &BridgeState, id: RequestId, callback: &str) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            "Protocol violation: {} for {} capture {}, ignoring",
            callback,
            state.stale(id),
            id
        );
    }

    /// Apply a deferred configuration once nothing is in flight.
    fn apply_queued_if_idle(&self, state: &mut BridgeState) {
        if !state.requests.is_empty() {
            return;
        }
        if let Some(configuration) = state.queued_configuration.take() {
            log::info!(
                "Applying deferred output configuration: max {} / {}",
                configuration.max_dimensions,
                configuration.max_quality
            );
            self.output.apply_configuration(&configuration);
            state.active_configuration = configuration;
        }
    }
}

impl CaptureDelegate for BridgeInner {
    fn on_will_begin(&self, id: RequestId) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let entry = match state.requests.get_mut(&id) {
            Some(entry) => entry,
            None => return self.protocol_violation(state, id, "will-begin"),
        };
        if entry.will_begin_seen {
            log::warn!("Duplicate will-begin for capture {}, ignoring", id);
            return;
        }
        entry.will_begin_seen = true;
        if entry.activity_tx.send(CaptureActivityEvent::WillBegin).is_err() {
            log::debug!("Capture {} has no activity consumer", id);
        }
    }

    fn on_intermediate_data(
        &self,
        id: RequestId,
        payload: Option<Vec<u8>>,
        error: Option<HardwareError>,
    ) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let entry = match state.requests.get_mut(&id) {
            Some(entry) => entry,
            None => return self.protocol_violation(state, id, "intermediate data"),
        };
        match (payload, error) {
            (_, Some(err)) => {
                log::warn!("Capture {} reported an intermediate error: {}", id, err);
                entry.intermediate_error = Some(err);
            }
            (Some(data), None) => {
                log::debug!("Capture {} buffered {} bytes", id, data.len());
                entry.payload = Some(data);
            }
            (None, None) => {
                log::warn!("Capture {} delivered neither data nor error", id);
            }
        }
    }

    fn on_finished(&self, id: RequestId, error: Option<HardwareError>) {
        let entry = {
            let mut state = self.lock();
            let Some(entry) = state.requests.remove(&id) else {
                self.protocol_violation(&state, id, "finished");
                return;
            };
            self.apply_queued_if_idle(&mut state);
            entry
        };
        entry.resolve(id, error);
    }
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (id, entry) in state.requests.drain() {
            entry.abandon(id);
        }
    }
}

/// Callback target handed to the output.
///
/// Holds the bridge weakly so outstanding hardware operations do not keep a
/// dropped bridge alive; their late callbacks become no-ops.
struct DelegateHandle {
    inner: Weak<BridgeInner>,
}

impl DelegateHandle {
    fn with_inner(&self, id: RequestId, callback: &str, f: impl FnOnce(&BridgeInner)) {
        match self.inner.upgrade() {
            Some(inner) => f(&*inner),
            None => log::debug!("Dropping {} for capture {}: bridge is gone", callback, id),
        }
    }
}

impl CaptureDelegate for DelegateHandle {
    fn on_will_begin(&self, id: RequestId) {
        self.with_inner(id, "will-begin", |inner| inner.on_will_begin(id));
    }

    fn on_intermediate_data(
        &self,
        id: RequestId,
        payload: Option<Vec<u8>>,
        error: Option<HardwareError>,
    ) {
        self.with_inner(id, "intermediate data", |inner| {
            inner.on_intermediate_data(id, payload, error)
        });
    }

    fn on_finished(&self, id: RequestId, error: Option<HardwareError>) {
        self.with_inner(id, "finished", |inner| inner.on_finished(id, error));
    }
}

/// Request/response bridge over a callback-driven [`PhotoOutput`].
///
/// Cheap to clone; clones share the same request table. When the last clone
/// is dropped, requests still in flight resolve as
/// [`CaptureFailure::Abandoned`].
#[derive(Clone)]
pub struct CaptureBridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for CaptureBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBridge")
            .field("settings", &self.inner.settings)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl CaptureBridge {
    /// Create a bridge over `output`, starting from the widest configuration
    /// the output's capabilities allow.
    pub fn new(output: Arc<dyn PhotoOutput>, settings: BridgeSettings) -> Self {
        let capabilities = output.capabilities();
        let configuration = OutputConfiguration::from_capabilities(&capabilities);
        output.apply_configuration(&configuration);

        let settings = BridgeSettings {
            activity_capacity: settings.activity_capacity.max(1),
        };

        Self {
            inner: Arc::new(BridgeInner {
                output,
                capabilities,
                settings,
                state: Mutex::new(BridgeState {
                    requests: HashMap::new(),
                    next_id: 1,
                    refused: HashSet::new(),
                    active_configuration: configuration,
                    queued_configuration: None,
                }),
                protocol_violations: AtomicU64::new(0),
            }),
        }
    }

    /// Submit a capture.
    ///
    /// Returns immediately with the unresolved result handle and the open
    /// activity feed for the request.
    ///
    /// # Errors
    /// * `BridgeError::InvalidOptions` - options outside what the device or
    ///   the active configuration supports
    /// * `BridgeError::Output` - the output refused the capture
    pub fn submit(
        &self,
        options: CaptureOptions,
    ) -> Result<(PendingCapture, ActivityChannel), BridgeError> {
        let (request, pending, activity) = {
            let mut state = self.inner.lock();
            validate_options(
                &options,
                &self.inner.capabilities,
                &state.active_configuration,
            )?;
            if let Some(queued) = &state.queued_configuration {
                validate_options(&options, &self.inner.capabilities, queued)?;
            }

            let id = state.allocate_id();
            let (result_tx, result_rx) = oneshot::channel();
            let (activity_tx, activity_rx) =
                broadcast::channel(self.inner.settings.activity_capacity);
            let request = CaptureRequest::new(id, options);

            state.requests.insert(
                id,
                RequestEntry {
                    state: RequestState::Submitted,
                    result_tx,
                    activity_tx,
                    payload: None,
                    intermediate_error: None,
                    will_begin_seen: false,
                    created_at: request.created_at,
                },
            );

            (
                request,
                PendingCapture::new(id, result_rx),
                ActivityChannel::new(id, activity_rx),
            )
        };

        // Enqueue without the lock: the output may call back synchronously.
        let delegate: Arc<dyn CaptureDelegate> = Arc::new(DelegateHandle {
            inner: Arc::downgrade(&self.inner),
        });
        if let Err(e) = self.inner.output.enqueue(&request, delegate) {
            log::warn!("Photo output refused capture {}: {}", request.id, e);
            let mut state = self.inner.lock();
            state.requests.remove(&request.id);
            state.refused.insert(request.id);
            self.inner.apply_queued_if_idle(&mut state);
            return Err(e.into());
        }

        if let Some(entry) = self.inner.lock().requests.get_mut(&request.id) {
            entry.state = RequestState::AwaitingCompletion;
        }

        log::debug!(
            "Submitted capture {} ({}, {})",
            request.id,
            request.options.format,
            request.options.quality
        );
        Ok((pending, activity))
    }

    /// Change the shared output configuration.
    ///
    /// Applied at once when nothing is in flight; otherwise queued (latest
    /// wins) and applied when the last pending capture resolves. While a
    /// configuration is queued, new submissions must satisfy both it and the
    /// active one.
    ///
    /// The queued configuration only lands once the table drains, so a caller
    /// that keeps at least one capture in flight at all times delays it
    /// indefinitely. Pause submissions to let it apply.
    pub fn update_configuration(
        &self,
        configuration: OutputConfiguration,
    ) -> Result<ConfigurationUpdate, BridgeError> {
        validate_configuration(&configuration, &self.inner.capabilities)?;

        let mut state = self.inner.lock();
        if state.requests.is_empty() {
            self.inner.output.apply_configuration(&configuration);
            state.active_configuration = configuration;
            state.queued_configuration = None;
            log::info!(
                "Output configuration applied: max {} / {}",
                configuration.max_dimensions,
                configuration.max_quality
            );
            Ok(ConfigurationUpdate::Applied)
        } else {
            let pending = state.requests.len();
            state.queued_configuration = Some(configuration);
            log::info!(
                "Output configuration deferred until {} capture(s) finish",
                pending
            );
            Ok(ConfigurationUpdate::Deferred { pending })
        }
    }

    /// Lifecycle state of a request, `None` once resolved or never issued.
    pub fn request_state(&self, id: RequestId) -> Option<RequestState> {
        self.inner.lock().requests.get(&id).map(|entry| entry.state)
    }

    /// Number of submitted captures not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().requests.len()
    }

    /// Configuration new submissions are validated against.
    pub fn active_configuration(&self) -> OutputConfiguration {
        self.inner.lock().active_configuration
    }

    /// Configuration waiting for in-flight captures to finish.
    pub fn queued_configuration(&self) -> Option<OutputConfiguration> {
        self.inner.lock().queued_configuration
    }

    pub fn capabilities(&self) -> &OutputCapabilities {
        &self.inner.capabilities
    }

    pub fn settings(&self) -> BridgeSettings {
        self.inner.settings
    }

    /// Callbacks ignored because they named an unknown or resolved request.
    pub fn protocol_violations(&self) -> u64 {
        self.inner.protocol_violations.load(Ordering::Relaxed)
    }
}

impl CaptureDelegate for CaptureBridge {
    fn on_will_begin(&self, id: RequestId) {
        self.inner.on_will_begin(id);
    }

    fn on_intermediate_data(
        &self,
        id: RequestId,
        payload: Option<Vec<u8>>,
        error: Option<HardwareError>,
    ) {
        self.inner.on_intermediate_data(id, payload, error);
    }

    fn on_finished(&self, id: RequestId, error: Option<HardwareError>) {
        self.inner.on_finished(id, error);
    }
}

/// Check options against device capabilities and the active configuration.
pub fn validate_options(
    options: &CaptureOptions,
    capabilities: &OutputCapabilities,
    configuration: &OutputConfiguration,
) -> Result<(), BridgeError> {
    if !capabilities.supported_formats.contains(&options.format) {
        return Err(BridgeError::InvalidOptions(format!(
            "format '{}' is not supported by this device",
            options.format
        )));
    }

    if let Some(dimensions) = options.max_dimensions {
        if dimensions.is_empty() {
            return Err(BridgeError::InvalidOptions(format!(
                "dimensions must be non-zero, got {}",
                dimensions
            )));
        }
        if !dimensions.fits_within(configuration.max_dimensions) {
            return Err(BridgeError::InvalidOptions(format!(
                "dimensions {} exceed the configured maximum {}",
                dimensions, configuration.max_dimensions
            )));
        }
    }

    if options.quality > configuration.max_quality {
        return Err(BridgeError::InvalidOptions(format!(
            "quality '{}' exceeds the configured maximum '{}'",
            options.quality, configuration.max_quality
        )));
    }

    if options.flash != FlashMode::Off && !capabilities.has_flash {
        return Err(BridgeError::InvalidOptions(
            "flash requested but the device has no flash".to_string(),
        ));
    }

    Ok(())
}

fn validate_configuration(
    configuration: &OutputConfiguration,
    capabilities: &OutputCapabilities,
) -> Result<(), BridgeError> {
    if configuration.max_dimensions.is_empty() {
        return Err(BridgeError::InvalidConfiguration(
            "maximum dimensions must be non-zero".to_string(),
        ));
    }
    if !configuration
        .max_dimensions
        .fits_within(capabilities.max_dimensions)
    {
        return Err(BridgeError::InvalidConfiguration(format!(
            "{} exceeds the device maximum {}",
            configuration.max_dimensions, capabilities.max_dimensions
        )));
    }
    if configuration.max_quality > capabilities.max_quality {
        return Err(BridgeError::InvalidConfiguration(format!(
            "quality '{}' exceeds the device maximum '{}'",
            configuration.max_quality, capabilities.max_quality
        )));
    }
    Ok(())
}
