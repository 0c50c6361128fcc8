//! Sampling session lifecycle.
//!
//! A [`SamplingLoop`] owns at most one upstream subscription at a time. A
//! worker thread receives delivered samples and applies each one as a single
//! unit: persist to the durable store, then refresh the presenter. `stop()`
//! unsubscribes first and then joins the worker, so an in-flight sample is
//! either fully applied before teardown completes or never dequeued at all.
//!
//! Silence is watched but never acted on locally: when no sample arrives
//! within the stall window, a [`SamplerEvent::Stalled`] is reported upward
//! and waiting continues. Radio conditions are outside our control.

use crate::config::SamplingPolicy;
use crate::notify::StatusPresenter;
use crate::provider::{FixProvider, LocationSample, SubscribeError, SubscriptionHandle};
use crate::store::StateStore;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often the worker wakes to check for shutdown and stalls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors starting a sampling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// A session is already active; treated as an idempotent no-op by the
    /// controller, which never double-starts under its own serialization.
    AlreadyActive,
    /// The provider rejected the subscription for lack of authorization.
    AuthorizationMissing,
    /// The provider rejected the subscription as unavailable.
    ProviderUnavailable,
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::AlreadyActive => write!(f, "sampling session already active"),
            StartError::AuthorizationMissing => write!(f, "location authorization not granted"),
            StartError::ProviderUnavailable => write!(f, "positioning provider unavailable"),
        }
    }
}

impl std::error::Error for StartError {}

impl From<SubscribeError> for StartError {
    fn from(err: SubscribeError) -> Self {
        match err {
            SubscribeError::AuthorizationMissing => StartError::AuthorizationMissing,
            SubscribeError::ProviderUnavailable => StartError::ProviderUnavailable,
        }
    }
}

/// Asynchronous reports from the sampling worker to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerEvent {
    /// No sample within the stall window. Non-fatal.
    Stalled,
    /// The subscription channel closed without a stop request. Fatal for
    /// this session.
    Disconnected,
}

/// One active subscription plus its worker thread.
struct ActiveSession {
    handle: SubscriptionHandle,
    shutdown: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Owns the lifecycle of a sampling session.
pub struct SamplingLoop {
    provider: Arc<dyn FixProvider>,
    store: Arc<StateStore>,
    presenter: Arc<dyn StatusPresenter>,
    policy: SamplingPolicy,
    events: Sender<SamplerEvent>,
    session: Option<ActiveSession>,
}

impl SamplingLoop {
    pub fn new(
        provider: Arc<dyn FixProvider>,
        store: Arc<StateStore>,
        presenter: Arc<dyn StatusPresenter>,
        policy: SamplingPolicy,
        events: Sender<SamplerEvent>,
    ) -> Self {
        Self {
            provider,
            store,
            presenter,
            policy,
            events,
            session: None,
        }
    }

    /// Establish the upstream subscription and spawn the worker.
    ///
    /// Returns immediately on success; samples arrive asynchronously. The
    /// provider-side authorization check here is a safety net behind the
    /// controller's own precondition check.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.session.is_some() {
            return Err(StartError::AlreadyActive);
        }

        let (tx, rx) = bounded(64);
        let handle = self
            .provider
            .subscribe(&self.policy.subscription_request(), tx)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = {
            let store = self.store.clone();
            let presenter = self.presenter.clone();
            let events = self.events.clone();
            let shutdown = shutdown.clone();
            let stall_window = self.policy.stall_window();
            thread::spawn(move || run_worker(rx, store, presenter, events, shutdown, stall_window))
        };

        debug!("sampling session started, subscription {handle}");
        self.session = Some(ActiveSession {
            handle,
            shutdown,
            worker,
        });
        Ok(())
    }

    /// Tear down the subscription and worker. No-op when idle.
    ///
    /// Joining the worker after unsubscribing guarantees that a sample
    /// in flight at this moment is fully applied before we return, and a
    /// sample still queued afterwards is discarded whole.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            // Raise the flag before unsubscribing so the worker never takes
            // the resulting channel close for an upstream failure.
            session.shutdown.store(true, Ordering::SeqCst);
            self.provider.unsubscribe(session.handle);
            let _ = session.worker.join();
            debug!("sampling session stopped, subscription {}", session.handle);
        }
    }

    /// Whether a session is currently held.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for SamplingLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop: drain samples, watch for stalls, exit on shutdown.
fn run_worker(
    rx: Receiver<LocationSample>,
    store: Arc<StateStore>,
    presenter: Arc<dyn StatusPresenter>,
    events: Sender<SamplerEvent>,
    shutdown: Arc<AtomicBool>,
    stall_window: Duration,
) {
    let mut last_activity = Instant::now();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(sample) => {
                apply_sample(&store, presenter.as_ref(), &sample);
                last_activity = Instant::now();
            }
            Err(RecvTimeoutError::Timeout) => {
                if last_activity.elapsed() >= stall_window {
                    warn!(
                        "no sample within {:?}; subscription considered stalled",
                        stall_window
                    );
                    let _ = events.send(SamplerEvent::Stalled);
                    // Restart the window so a sustained outage reports once
                    // per window instead of every poll.
                    last_activity = Instant::now();
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !shutdown.load(Ordering::SeqCst) {
                    warn!("subscription channel closed unexpectedly");
                    let _ = events.send(SamplerEvent::Disconnected);
                }
                return;
            }
        }
    }
}

/// Apply one delivered sample: persist, then refresh the presenter.
///
/// A failed persistence write is logged and does not break the session; the
/// previous durable value stays effective.
fn apply_sample(store: &StateStore, presenter: &dyn StatusPresenter, sample: &LocationSample) {
    debug!(
        "sample accepted: {:.6}, {:.6} (±{}m)",
        sample.latitude, sample.longitude, sample.accuracy
    );

    if let Err(e) = store.record_sample(sample) {
        warn!("could not persist sample: {e}");
    }
    presenter.show_fix(sample);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullPresenter;
    use crate::provider::{AccuracyMode, SubscriptionRequest};
    use crossbeam_channel::unbounded;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Provider that hands its sink back to the test for manual delivery.
    struct PushProvider {
        sink: Mutex<Option<Sender<LocationSample>>>,
        reject_with: Option<SubscribeError>,
    }

    impl PushProvider {
        fn new() -> Self {
            Self {
                sink: Mutex::new(None),
                reject_with: None,
            }
        }

        fn rejecting(err: SubscribeError) -> Self {
            Self {
                sink: Mutex::new(None),
                reject_with: Some(err),
            }
        }

        fn push(&self, sample: LocationSample) {
            self.sink
                .lock()
                .unwrap()
                .as_ref()
                .expect("no active subscription")
                .send(sample)
                .unwrap();
        }

        fn drop_sink(&self) {
            *self.sink.lock().unwrap() = None;
        }
    }

    impl FixProvider for PushProvider {
        fn subscribe(
            &self,
            _request: &SubscriptionRequest,
            sink: Sender<LocationSample>,
        ) -> Result<SubscriptionHandle, SubscribeError> {
            if let Some(err) = self.reject_with {
                return Err(err);
            }
            *self.sink.lock().unwrap() = Some(sink);
            Ok(SubscriptionHandle::new())
        }

        fn unsubscribe(&self, _handle: SubscriptionHandle) {
            self.drop_sink();
        }
    }

    fn scratch_store() -> Arc<StateStore> {
        let dir: PathBuf = std::env::temp_dir()
            .join("geotrack-sampling-test")
            .join(Uuid::new_v4().to_string());
        Arc::new(StateStore::open(dir).unwrap())
    }

    fn fast_policy() -> SamplingPolicy {
        SamplingPolicy {
            interval_ms: 10,
            min_interval_ms: 5,
            max_latency_ms: 50,
            stall_multiplier: 1,
            accuracy: AccuracyMode::High,
        }
    }

    fn make_loop(
        provider: Arc<dyn FixProvider>,
        policy: SamplingPolicy,
    ) -> (SamplingLoop, Arc<StateStore>, Receiver<SamplerEvent>) {
        let store = scratch_store();
        let (tx, rx) = unbounded();
        let sampler = SamplingLoop::new(
            provider,
            store.clone(),
            Arc::new(NullPresenter),
            policy,
            tx,
        );
        (sampler, store, rx)
    }

    #[test]
    fn test_second_start_is_rejected() {
        let provider = Arc::new(PushProvider::new());
        let (mut sampler, _store, _events) = make_loop(provider, fast_policy());

        sampler.start().unwrap();
        assert_eq!(sampler.start(), Err(StartError::AlreadyActive));
        assert!(sampler.is_active());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let provider = Arc::new(PushProvider::new());
        let (mut sampler, _store, _events) = make_loop(provider, fast_policy());

        sampler.stop();
        assert!(!sampler.is_active());
    }

    #[test]
    fn test_subscribe_rejection_maps_to_start_error() {
        let provider = Arc::new(PushProvider::rejecting(SubscribeError::AuthorizationMissing));
        let (mut sampler, _store, _events) = make_loop(provider, fast_policy());

        assert_eq!(sampler.start(), Err(StartError::AuthorizationMissing));
        assert!(!sampler.is_active());
    }

    #[test]
    fn test_delivered_sample_is_persisted() {
        let provider = Arc::new(PushProvider::new());
        let (mut sampler, store, _events) = make_loop(provider.clone(), fast_policy());

        sampler.start().unwrap();
        let sample = LocationSample {
            latitude: 48.8584,
            longitude: 2.2945,
            captured_at: 1_700_000_000_000,
            accuracy: 8.0,
        };
        provider.push(sample);

        // Wait for the worker to pick the sample up.
        let deadline = Instant::now() + Duration::from_secs(2);
        while store.last_sample().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(store.last_sample(), Some(sample));

        sampler.stop();
    }

    #[test]
    fn test_silence_reports_stalled() {
        let provider = Arc::new(PushProvider::new());
        let (mut sampler, _store, events) = make_loop(provider, fast_policy());

        sampler.start().unwrap();
        // Stall window is 50ms and nothing is delivered.
        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, SamplerEvent::Stalled);
        assert!(sampler.is_active());

        sampler.stop();
    }

    #[test]
    fn test_dropped_sink_reports_disconnected() {
        let provider = Arc::new(PushProvider::new());
        let (mut sampler, _store, events) = make_loop(provider.clone(), fast_policy());

        sampler.start().unwrap();
        provider.drop_sink();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, SamplerEvent::Disconnected);
    }

    #[test]
    fn test_stop_does_not_report_disconnect() {
        let provider = Arc::new(PushProvider::new());
        let (mut sampler, _store, events) = make_loop(provider, fast_policy());

        sampler.start().unwrap();
        sampler.stop();
        assert!(!sampler.is_active());

        // Teardown must not masquerade as an upstream failure.
        while let Ok(event) = events.try_recv() {
            assert_ne!(event, SamplerEvent::Disconnected);
        }
    }
}
