//! End-to-end tests for the capture request bridge.
//!
//! Callbacks are delivered through the delegate the bridge hands to the
//! output, from threads other than the submitting one, the way camera
//! hardware delivers them.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use futures_util::FutureExt;
use shutter_bridge::bridge::{
    BridgeSettings, CaptureActivityEvent, CaptureBridge, CaptureFailure, CaptureRequest,
    ConfigurationUpdate, RequestId,
};
use shutter_bridge::camera::{CaptureOptions, Dimensions, PhotoFormat, QualityPrioritization};
use shutter_bridge::output::{
    decode_payload, CaptureDelegate, HardwareError, OutputCapabilities, OutputConfiguration,
    OutputError, PhotoOutput, SimulatedOutcome, SimulatedOutput,
};

/// Output that records every enqueued capture together with its delegate.
#[derive(Default)]
struct RecordingOutput {
    enqueued: Mutex<Vec<(CaptureRequest, Arc<dyn CaptureDelegate>)>>,
}

impl RecordingOutput {
    fn delegate(&self, id: RequestId) -> Arc<dyn CaptureDelegate> {
        let enqueued = self.enqueued.lock().unwrap();
        let (_, delegate) = enqueued
            .iter()
            .find(|(request, _)| request.id == id)
            .expect("capture was enqueued");
        Arc::clone(delegate)
    }

    fn request(&self, id: RequestId) -> CaptureRequest {
        let enqueued = self.enqueued.lock().unwrap();
        enqueued
            .iter()
            .find(|(request, _)| request.id == id)
            .map(|(request, _)| request.clone())
            .expect("capture was enqueued")
    }
}

impl PhotoOutput for RecordingOutput {
    fn capabilities(&self) -> OutputCapabilities {
        OutputCapabilities::default()
    }

    fn apply_configuration(&self, _configuration: &OutputConfiguration) {}

    fn enqueue(
        &self,
        request: &CaptureRequest,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Result<(), OutputError> {
        self.enqueued
            .lock()
            .unwrap()
            .push((request.clone(), delegate));
        Ok(())
    }
}

fn recording_bridge() -> (Arc<RecordingOutput>, CaptureBridge) {
    let output = Arc::new(RecordingOutput::default());
    let bridge = CaptureBridge::new(output.clone(), BridgeSettings::default());
    (output, bridge)
}

/// Run `f` against the delegate on a separate "hardware" thread.
fn on_hardware_thread<F>(delegate: Arc<dyn CaptureDelegate>, f: F)
where
    F: FnOnce(&dyn CaptureDelegate) + Send + 'static,
{
    thread::spawn(move || f(delegate.as_ref()))
        .join()
        .expect("hardware thread panicked");
}

#[tokio::test]
async fn test_will_begin_payload_finish_yields_success() {
    let (output, bridge) = recording_bridge();
    let (pending, activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let id = pending.id();
    assert_eq!(output.request(id).options, CaptureOptions::default());

    on_hardware_thread(output.delegate(id), move |d| {
        d.on_will_begin(id);
        d.on_intermediate_data(id, Some(b"P".to_vec()), None);
        d.on_finished(id, None);
    });

    let photo = pending.await.expect("capture should succeed");
    assert_eq!(photo.data, b"P".to_vec());
    assert!(!photo.is_proxy);
    assert_eq!(activity.collect().await, vec![CaptureActivityEvent::WillBegin]);
}

#[tokio::test]
async fn test_finish_with_error_and_no_data() {
    let (output, bridge) = recording_bridge();
    let (pending, activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let id = pending.id();

    on_hardware_thread(output.delegate(id), move |d| {
        d.on_finished(id, Some(HardwareError::new("E")));
    });

    assert_eq!(
        pending.await,
        Err(CaptureFailure::Hardware(HardwareError::new("E")))
    );
    assert!(activity.collect().await.is_empty());
}

#[tokio::test]
async fn test_intermediate_error_does_not_resolve() {
    let (output, bridge) = recording_bridge();
    let (mut pending, _activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let id = pending.id();
    let delegate = output.delegate(id);

    on_hardware_thread(Arc::clone(&delegate), move |d| {
        d.on_intermediate_data(id, None, Some(HardwareError::new("E2")));
    });

    // Still pending after the intermediate error.
    let waited = tokio::time::timeout(Duration::from_millis(20), &mut pending).await;
    assert!(waited.is_err());
    assert_eq!(bridge.pending_count(), 1);

    on_hardware_thread(delegate, move |d| d.on_finished(id, None));
    assert_eq!(pending.await, Err(CaptureFailure::NoPayload));
}

#[tokio::test]
async fn test_concurrent_requests_resolve_independently() {
    let (output, bridge) = recording_bridge();
    let (first, first_activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let (second, second_activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let (a, b) = (first.id(), second.id());
    assert_ne!(a, b);

    on_hardware_thread(output.delegate(b), move |d| {
        d.on_will_begin(b);
        d.on_intermediate_data(b, Some(b"second".to_vec()), None);
        d.on_finished(b, None);
    });

    assert_eq!(second.await.unwrap().data, b"second".to_vec());
    assert_eq!(bridge.pending_count(), 1);
    assert_eq!(
        second_activity.collect().await,
        vec![CaptureActivityEvent::WillBegin]
    );

    on_hardware_thread(output.delegate(a), move |d| {
        d.on_finished(a, Some(HardwareError::new("first failed")));
    });

    assert!(matches!(first.await, Err(CaptureFailure::Hardware(_))));
    assert!(first_activity.collect().await.is_empty());
    assert_eq!(bridge.pending_count(), 0);
}

/// Wait for the activity feed to close while the hardware runs on its own
/// thread, then check the result was already committed at that point.
async fn result_at_feed_close<F>(f: F) -> Option<Result<Vec<u8>, CaptureFailure>>
where
    F: FnOnce(&dyn CaptureDelegate, RequestId) + Send + 'static,
{
    let (output, bridge) = recording_bridge();
    let (pending, activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let id = pending.id();
    let delegate = output.delegate(id);

    let hardware = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        f(delegate.as_ref(), id);
    });

    activity.collect().await;
    let result = pending.now_or_never();
    hardware.join().expect("hardware thread panicked");
    result.map(|r| r.map(|photo| photo.data))
}

#[tokio::test]
async fn test_feed_closes_after_success_is_committed() {
    let result = result_at_feed_close(|d, id| {
        d.on_will_begin(id);
        d.on_intermediate_data(id, Some(b"P".to_vec()), None);
        d.on_finished(id, None);
    })
    .await;
    assert_eq!(result, Some(Ok(b"P".to_vec())));
}

#[tokio::test]
async fn test_feed_closes_after_failure_is_committed() {
    let result = result_at_feed_close(|d, id| {
        d.on_will_begin(id);
        d.on_finished(id, Some(HardwareError::new("E")));
    })
    .await;
    assert_eq!(
        result,
        Some(Err(CaptureFailure::Hardware(HardwareError::new("E"))))
    );
}

#[tokio::test]
async fn test_late_callbacks_after_resolution_are_ignored() {
    let (output, bridge) = recording_bridge();
    let (pending, _activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let id = pending.id();
    let delegate = output.delegate(id);

    on_hardware_thread(Arc::clone(&delegate), move |d| {
        d.on_intermediate_data(id, Some(b"once".to_vec()), None);
        d.on_finished(id, None);
        d.on_finished(id, Some(HardwareError::new("again")));
        d.on_intermediate_data(id, Some(b"late".to_vec()), None);
    });

    assert_eq!(pending.await.unwrap().data, b"once".to_vec());
    assert_eq!(bridge.protocol_violations(), 2);
}

#[tokio::test]
async fn test_callbacks_after_bridge_dropped_are_harmless() {
    let (output, bridge) = recording_bridge();
    let (pending, activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let id = pending.id();
    let delegate = output.delegate(id);

    drop(bridge);
    assert_eq!(pending.await, Err(CaptureFailure::Abandoned));
    assert!(activity.collect().await.is_empty());

    on_hardware_thread(delegate, move |d| {
        d.on_will_begin(id);
        d.on_finished(id, None);
    });
}

#[tokio::test]
async fn test_simulated_output_many_concurrent_captures() {
    let output = Arc::new(SimulatedOutput::new(
        OutputCapabilities::default(),
        Duration::from_millis(2),
    ));
    let bridge = CaptureBridge::new(output.clone(), BridgeSettings::default());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let (pending, activity) = bridge.submit(CaptureOptions::default()).unwrap();
        handles.push(tokio::spawn(async move {
            let events = activity.collect().await;
            (pending.await, events)
        }));
    }

    for handle in handles {
        let (result, events) = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(events, vec![CaptureActivityEvent::WillBegin]);
    }
    assert_eq!(bridge.pending_count(), 0);
    assert_eq!(output.capture_count(), 16);
}

#[tokio::test]
async fn test_simulated_payload_reflects_options() {
    let output = Arc::new(SimulatedOutput::new(
        OutputCapabilities::default(),
        Duration::ZERO,
    ));
    let bridge = CaptureBridge::new(output, BridgeSettings::default());

    let options = CaptureOptions::default()
        .with_format(PhotoFormat::Heif)
        .with_max_dimensions(Dimensions::FULL_HD);
    let (pending, _activity) = bridge.submit(options).unwrap();
    let photo = pending.await.unwrap();
    assert_eq!(
        decode_payload(&photo.data),
        Some((PhotoFormat::Heif, Dimensions::FULL_HD))
    );
}

#[tokio::test]
async fn test_simulated_skip_will_begin_has_no_events() {
    let output = Arc::new(SimulatedOutput::new(
        OutputCapabilities::default(),
        Duration::ZERO,
    ));
    output.script([SimulatedOutcome::SkipWillBegin]);
    let bridge = CaptureBridge::new(output, BridgeSettings::default());

    let (pending, activity) = bridge.submit(CaptureOptions::default()).unwrap();
    assert!(pending.await.is_ok());
    assert!(activity.collect().await.is_empty());
}

#[tokio::test]
async fn test_deferred_configuration_only_affects_later_captures() {
    let output = Arc::new(SimulatedOutput::new(
        OutputCapabilities::default(),
        Duration::from_millis(20),
    ));
    let bridge = CaptureBridge::new(output.clone(), BridgeSettings::default());

    let (in_flight, _activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let smaller = OutputConfiguration {
        max_dimensions: Dimensions::VGA,
        max_quality: QualityPrioritization::Quality,
    };
    assert_eq!(
        bridge.update_configuration(smaller).unwrap(),
        ConfigurationUpdate::Deferred { pending: 1 }
    );

    let photo = in_flight.await.unwrap();
    assert_eq!(
        decode_payload(&photo.data),
        Some((PhotoFormat::Jpeg, Dimensions::TWELVE_MP))
    );
    assert_eq!(output.configuration(), smaller);

    let (later, _activity) = bridge.submit(CaptureOptions::default()).unwrap();
    let photo = later.await.unwrap();
    assert_eq!(
        decode_payload(&photo.data),
        Some((PhotoFormat::Jpeg, Dimensions::VGA))
    );
}

#[tokio::test]
async fn test_stopped_output_refuses_submission() {
    let output = Arc::new(SimulatedOutput::new(
        OutputCapabilities::default(),
        Duration::ZERO,
    ));
    let bridge = CaptureBridge::new(output.clone(), BridgeSettings::default());
    output.stop();

    assert!(bridge.submit(CaptureOptions::default()).is_err());
    assert_eq!(bridge.pending_count(), 0);
}

#[test]
fn test_blocking_callers_can_wait() {
    let output = Arc::new(SimulatedOutput::new(
        OutputCapabilities::default(),
        Duration::from_millis(1),
    ));
    let bridge = CaptureBridge::new(output, BridgeSettings::default());
    let (pending, _activity) = bridge.submit(CaptureOptions::default()).unwrap();
    assert!(pending.blocking_wait().is_ok());
}
