//! Integration tests for the tracking controller lifecycle.

use crossbeam_channel::Sender;
use geotrack_agent::{
    AuthorizationKind, Config, FixProvider, LocationSample, PreconditionFailure, ReconcileOutcome,
    RunState, SamplingPolicy, ServiceController, StartFailure, StateStore, StaticEnvironment,
    StatusPresenter, SubscribeError, SubscriptionHandle, SubscriptionRequest,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Provider controlled by the test: records the subscription request and
/// hands the sink back for manual sample delivery.
#[derive(Default)]
struct ScriptedProvider {
    request: Mutex<Option<SubscriptionRequest>>,
    sink: Mutex<Option<Sender<LocationSample>>>,
    reject_with: Mutex<Option<SubscribeError>>,
}

impl ScriptedProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn rejecting(err: SubscribeError) -> Arc<Self> {
        let provider = Self::default();
        *provider.reject_with.lock().unwrap() = Some(err);
        Arc::new(provider)
    }

    fn last_request(&self) -> SubscriptionRequest {
        self.request.lock().unwrap().expect("no subscription made")
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

impl FixProvider for ScriptedProvider {
    fn subscribe(
        &self,
        request: &SubscriptionRequest,
        sink: Sender<LocationSample>,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        if let Some(err) = *self.reject_with.lock().unwrap() {
            return Err(err);
        }
        *self.request.lock().unwrap() = Some(*request);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(SubscriptionHandle::new())
    }

    fn unsubscribe(&self, _handle: SubscriptionHandle) {
        self.drop_sink();
    }
}

/// Presenter that records the rendering sequence.
#[derive(Default)]
struct RecordingPresenter {
    calls: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl StatusPresenter for RecordingPresenter {
    fn show_initializing(&self) {
        self.calls.lock().unwrap().push("initializing".to_string());
    }

    fn show_fix(&self, sample: &LocationSample) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("fix:{:.6},{:.6}", sample.latitude, sample.longitude));
    }

    fn clear(&self) {
        self.calls.lock().unwrap().push("clear".to_string());
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir()
        .join("geotrack-controller-test")
        .join(Uuid::new_v4().to_string())
}

fn test_config() -> Config {
    Config {
        policy: SamplingPolicy::default(),
        data_path: scratch_dir(),
        detached: true,
    }
}

struct Harness {
    controller: ServiceController,
    provider: Arc<ScriptedProvider>,
    presenter: Arc<RecordingPresenter>,
    store: Arc<StateStore>,
    config: Config,
}

fn harness_with(config: Config, env: StaticEnvironment) -> Harness {
    let provider = ScriptedProvider::new();
    let presenter = RecordingPresenter::new();
    let store = Arc::new(StateStore::open(&config.data_path).unwrap());
    let controller = ServiceController::new(
        &config,
        provider.clone(),
        Arc::new(env),
        store.clone(),
        presenter.clone(),
    );
    Harness {
        controller,
        provider,
        presenter,
        store,
        config,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), StaticEnvironment::all_granted())
}

fn sample(latitude: f64, longitude: f64, captured_at: i64) -> LocationSample {
    LocationSample {
        latitude,
        longitude,
        captured_at,
        accuracy: 10.0,
    }
}

fn wait_for<F: Fn() -> bool>(cond: F) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(cond(), "condition not met within deadline");
}

#[test]
fn test_successful_start_runs_with_source_policy() {
    let mut h = harness();
    assert!(!h.store.tracking_intent());

    h.controller.request_start().unwrap();

    let status = h.controller.status();
    assert_eq!(status.run_state(), RunState::Running);
    assert!(status.is_active());
    assert!(h.store.tracking_intent());

    // Subscription carries the fixed delivery policy.
    let request = h.provider.last_request();
    assert_eq!(request.interval, Duration::from_millis(30_000));
    assert_eq!(request.min_interval, Duration::from_millis(15_000));
    assert_eq!(request.max_latency, Duration::from_millis(60_000));
    assert!(!request.wait_for_fix);
}

#[test]
fn test_start_with_positioning_disabled() {
    let mut h = harness_with(test_config(), StaticEnvironment::positioning_disabled());

    let err = h.controller.request_start().unwrap_err();
    assert_eq!(
        err,
        StartFailure::Precondition(PreconditionFailure::GpsDisabled)
    );

    // Nothing was touched.
    assert!(!h.store.tracking_intent());
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
    assert!(h.presenter.calls().is_empty());
}

#[test]
fn test_start_without_authorization_leaves_prior_intent() {
    let config = test_config();

    // Intent was already on from an earlier session.
    {
        let store = StateStore::open(&config.data_path).unwrap();
        store.set_intent(true).unwrap();
    }

    let mut h = harness_with(config, StaticEnvironment::no_authorization());
    let err = h.controller.request_start().unwrap_err();
    assert_eq!(
        err,
        StartFailure::Precondition(PreconditionFailure::PermissionDenied(
            AuthorizationKind::Fine
        ))
    );
    assert!(h.store.tracking_intent());
}

#[test]
fn test_detached_agent_requires_background_grant() {
    let env = StaticEnvironment {
        background: false,
        ..StaticEnvironment::all_granted()
    };
    let mut h = harness_with(test_config(), env.clone());

    let err = h.controller.request_start().unwrap_err();
    assert_eq!(
        err,
        StartFailure::Precondition(PreconditionFailure::PermissionDenied(
            AuthorizationKind::Background
        ))
    );

    // Attached to a foreground UI, coarse/fine alone suffices.
    let attached = Config {
        detached: false,
        ..test_config()
    };
    let mut h = harness_with(attached, env);
    h.controller.request_start().unwrap();
    assert!(h.controller.status().is_active());
}

#[test]
fn test_stop_is_idempotent() {
    let mut h = harness();
    h.controller.request_start().unwrap();

    h.controller.request_stop();
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
    assert!(!h.store.tracking_intent());
    let after_first = h.presenter.calls();

    h.controller.request_stop();
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
    assert!(!h.store.tracking_intent());
    // Second stop produced no new renderings.
    assert_eq!(h.presenter.calls(), after_first);
}

#[test]
fn test_stop_before_any_start_is_a_noop() {
    let mut h = harness();
    h.controller.request_stop();
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
    assert!(h.presenter.calls().is_empty());
}

#[test]
fn test_reconcile_resumes_after_simulated_crash() {
    let config = test_config();

    {
        let mut h = harness_with(config.clone(), StaticEnvironment::all_granted());
        h.controller.request_start().unwrap();
        // Process dies here; run state is lost, intent is not.
    }

    let mut h = harness_with(config, StaticEnvironment::all_granted());
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);

    let outcome = h.controller.reconcile_after_restart();
    assert_eq!(outcome, ReconcileOutcome::Resumed);
    assert!(h.controller.status().is_active());
    assert!(h.store.tracking_intent());
}

#[test]
fn test_reconcile_without_intent_is_idle() {
    let mut h = harness();
    let outcome = h.controller.reconcile_after_restart();
    assert_eq!(outcome, ReconcileOutcome::Idle);
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
}

#[test]
fn test_reconcile_with_positioning_disabled_keeps_intent() {
    let config = test_config();

    {
        let store = StateStore::open(&config.data_path).unwrap();
        store.set_intent(true).unwrap();
    }

    let mut h = harness_with(config, StaticEnvironment::positioning_disabled());
    let outcome = h.controller.reconcile_after_restart();
    assert_eq!(
        outcome,
        ReconcileOutcome::Deferred(StartFailure::Precondition(
            PreconditionFailure::GpsDisabled
        ))
    );

    // Stopped, but the desire to track is not erased.
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
    assert!(h.store.tracking_intent());
}

#[test]
fn test_subscription_rejection_falls_back_to_stopped() {
    let config = test_config();
    let provider = ScriptedProvider::rejecting(SubscribeError::ProviderUnavailable);
    let presenter = RecordingPresenter::new();
    let store = Arc::new(StateStore::open(&config.data_path).unwrap());
    let mut controller = ServiceController::new(
        &config,
        provider,
        Arc::new(StaticEnvironment::all_granted()),
        store.clone(),
        presenter.clone(),
    );

    let err = controller.request_start().unwrap_err();
    assert!(matches!(err, StartFailure::Sampler(_)));
    assert_eq!(controller.status().run_state(), RunState::Stopped);

    // The initializing card was shown and withdrawn.
    assert_eq!(presenter.calls(), vec!["initializing", "clear"]);
}

#[test]
fn test_latest_sample_wins() {
    let mut h = harness();
    h.controller.request_start().unwrap();

    let s1 = sample(1.0, 1.0, 100);
    let s2 = sample(2.0, 2.0, 200);

    h.provider.push(s1);
    wait_for(|| h.store.last_sample().is_some());
    h.provider.push(s2);
    wait_for(|| h.store.last_sample() == Some(s2));

    assert_eq!(h.store.last_sample(), Some(s2));

    // The overwrite is durable across a reopen of the same records.
    h.controller.request_stop();
    let reopened = StateStore::open(&h.config.data_path).unwrap();
    assert_eq!(reopened.last_sample(), Some(s2));
}

#[test]
fn test_stall_is_reported_but_not_fatal() {
    let config = Config {
        policy: SamplingPolicy {
            max_latency_ms: 30,
            stall_multiplier: 1,
            ..SamplingPolicy::default()
        },
        ..test_config()
    };
    let mut h = harness_with(config, StaticEnvironment::all_granted());

    h.controller.request_start().unwrap();
    thread::sleep(Duration::from_millis(300));
    h.controller.service_events();

    // Silence is waited out, never escalated.
    assert!(h.controller.status().is_active());
    assert!(h.store.tracking_intent());

    // Delivery after the stall still lands.
    let s = sample(3.0, 3.0, 300);
    h.provider.push(s);
    wait_for(|| h.store.last_sample() == Some(s));
}

#[test]
fn test_disconnect_stops_session_but_keeps_intent() {
    let mut h = harness();
    h.controller.request_start().unwrap();

    h.provider.drop_sink();
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        h.controller.service_events();
        if h.controller.status().run_state() == RunState::Stopped {
            break;
        }
        assert!(Instant::now() < deadline, "disconnect never serviced");
        thread::sleep(Duration::from_millis(20));
    }

    // An upstream loss is not an opt-out.
    assert!(h.store.tracking_intent());
}

#[test]
fn test_presenter_rendering_sequence() {
    let mut h = harness();
    h.controller.request_start().unwrap();

    let s = sample(52.520008, 13.404954, 1_700_000_000_000);
    h.provider.push(s);
    wait_for(|| h.store.last_sample().is_some());

    h.controller.request_stop();

    assert_eq!(
        h.presenter.calls(),
        vec!["initializing", "fix:52.520008,13.404954", "clear"]
    );
}

#[test]
fn test_run_state_follows_last_successful_request() {
    let mut h = harness();

    h.controller.request_start().unwrap();
    h.controller.request_stop();
    h.controller.request_start().unwrap();
    h.controller.request_start().unwrap(); // second start is a no-op success
    assert!(h.controller.status().is_active());

    h.controller.request_stop();
    assert_eq!(h.controller.status().run_state(), RunState::Stopped);
    assert!(!h.store.tracking_intent());
}
