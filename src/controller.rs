//! Tracking service controller.
//!
//! Single authority over whether sampling runs. Reconciles three inputs:
//! explicit user actions, the restart signal, and environment preconditions.
//! All state transitions happen here; everything else only observes through
//! [`StatusHandle`].
//!
//! The one asymmetry worth knowing: an explicit stop clears durable tracking
//! intent, but a failed restart reconciliation does not. A user who opted in
//! stays opted in through transient outages (positioning switched off,
//! permission revoked and later restored) and is never silently opted out.

use crate::config::Config;
use crate::environment::{AuthorizationKind, EnvironmentProbe};
use crate::notify::StatusPresenter;
use crate::provider::FixProvider;
use crate::sampling::{SamplerEvent, SamplingLoop, StartError};
use crate::status::{RunState, StatusHandle};
use crate::store::StateStore;
use crossbeam_channel::{unbounded, Receiver};
use log::{debug, info, warn};
use std::sync::Arc;

/// A start attempt rejected before anything was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// No positioning provider is enabled.
    GpsDisabled,
    /// The named authorization grant is missing.
    PermissionDenied(AuthorizationKind),
}

impl std::fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreconditionFailure::GpsDisabled => write!(f, "positioning is disabled"),
            PreconditionFailure::PermissionDenied(kind) => {
                write!(f, "{kind} location permission not granted")
            }
        }
    }
}

impl std::error::Error for PreconditionFailure {}

/// Why a start request did not end in a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFailure {
    /// Rejected up front; tracking intent was left untouched.
    Precondition(PreconditionFailure),
    /// The sampling loop could not establish the subscription.
    Sampler(StartError),
}

impl std::fmt::Display for StartFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartFailure::Precondition(e) => write!(f, "{e}"),
            StartFailure::Sampler(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StartFailure {}

/// Result of the restart-time reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Tracking was not desired; nothing to do.
    Idle,
    /// Tracking was desired and has resumed.
    Resumed,
    /// Tracking was desired but could not start. Intent is retained so a
    /// later recovery can resume without the user re-opting-in.
    Deferred(StartFailure),
}

/// The state machine deciding whether the sampling loop runs.
pub struct ServiceController {
    env: Arc<dyn EnvironmentProbe>,
    store: Arc<StateStore>,
    presenter: Arc<dyn StatusPresenter>,
    sampler: SamplingLoop,
    status: StatusHandle,
    events: Receiver<SamplerEvent>,
    detached: bool,
}

impl ServiceController {
    /// Wire up a controller over the given collaborators.
    pub fn new(
        config: &Config,
        provider: Arc<dyn FixProvider>,
        env: Arc<dyn EnvironmentProbe>,
        store: Arc<StateStore>,
        presenter: Arc<dyn StatusPresenter>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        let sampler = SamplingLoop::new(
            provider,
            store.clone(),
            presenter.clone(),
            config.policy,
            events_tx,
        );

        Self {
            env,
            store,
            presenter,
            sampler,
            status: StatusHandle::new(),
            events: events_rx,
            detached: config.detached,
        }
    }

    /// Read-only run-state view for observers.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Shared durable store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Explicit start request.
    ///
    /// On success tracking intent is durably true before this returns and
    /// the session is live. On precondition failure nothing is touched; on a
    /// sampler failure intent stays true but the state falls back to
    /// stopped.
    pub fn request_start(&mut self) -> Result<(), StartFailure> {
        self.check_preconditions()
            .map_err(StartFailure::Precondition)?;

        if let Err(e) = self.store.set_intent(true) {
            // The session is still worth having; the previous durable value
            // simply stays effective.
            warn!("could not persist tracking intent: {e}");
        }

        self.start_sampling()
    }

    /// Explicit stop request. Idempotent; cannot fail.
    pub fn request_stop(&mut self) {
        if let Err(e) = self.store.set_intent(false) {
            warn!("could not persist tracking intent: {e}");
        }

        if self.status.run_state() != RunState::Stopped {
            self.sampler.stop();
            self.status.set(RunState::Stopped);
            self.presenter.clear();
            info!("tracking stopped");
        }
    }

    /// Restart-time reconciliation, invoked once per process start by the
    /// boot or relaunch signal.
    ///
    /// Restores the session when durable intent says tracking should be on.
    /// Intent is read, never rewritten here; a precondition or start failure
    /// is reported and deferred, not treated as an opt-out.
    pub fn reconcile_after_restart(&mut self) -> ReconcileOutcome {
        if !self.store.tracking_intent() {
            debug!("reconcile: tracking not desired");
            return ReconcileOutcome::Idle;
        }

        if let Err(failure) = self.check_preconditions() {
            warn!("reconcile: tracking desired but deferred: {failure}");
            return ReconcileOutcome::Deferred(StartFailure::Precondition(failure));
        }

        match self.start_sampling() {
            Ok(()) => {
                info!("reconcile: tracking resumed");
                ReconcileOutcome::Resumed
            }
            Err(failure) => {
                warn!("reconcile: tracking desired but deferred: {failure}");
                ReconcileOutcome::Deferred(failure)
            }
        }
    }

    /// Drain pending sampler reports and apply policy.
    ///
    /// Stalls are logged and waited out. A disconnect is unrecoverable for
    /// the session: tear down to stopped, leaving intent untouched.
    pub fn service_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SamplerEvent::Stalled => {
                    warn!("sampling stalled; continuing to wait for the provider");
                }
                SamplerEvent::Disconnected => {
                    if self.status.run_state() != RunState::Stopped {
                        warn!("sampling session lost; stopping");
                        self.sampler.stop();
                        self.status.set(RunState::Stopped);
                        self.presenter.clear();
                    }
                }
            }
        }
    }

    /// The single precondition check shared by user-triggered and
    /// restart-triggered starts.
    fn check_preconditions(&self) -> Result<(), PreconditionFailure> {
        if !self.env.positioning_enabled() {
            return Err(PreconditionFailure::GpsDisabled);
        }

        let has_fix_grant = self.env.has_authorization(AuthorizationKind::Fine)
            || self.env.has_authorization(AuthorizationKind::Coarse);
        if !has_fix_grant {
            return Err(PreconditionFailure::PermissionDenied(
                AuthorizationKind::Fine,
            ));
        }

        if self.detached && !self.env.has_authorization(AuthorizationKind::Background) {
            return Err(PreconditionFailure::PermissionDenied(
                AuthorizationKind::Background,
            ));
        }

        Ok(())
    }

    /// Stopped -> Starting -> Running, or back to Stopped on failure.
    fn start_sampling(&mut self) -> Result<(), StartFailure> {
        self.status.set(RunState::Starting);
        self.presenter.show_initializing();

        match self.sampler.start() {
            Ok(()) => {
                self.status.set(RunState::Running);
                info!("tracking running");
                Ok(())
            }
            // The loop was already live; keep it rather than escalating.
            Err(StartError::AlreadyActive) => {
                self.status.set(RunState::Running);
                Ok(())
            }
            Err(e) => {
                self.status.set(RunState::Stopped);
                self.presenter.clear();
                warn!("could not start sampling: {e}");
                Err(StartFailure::Sampler(e))
            }
        }
    }
}

impl Drop for ServiceController {
    fn drop(&mut self) {
        self.sampler.stop();
        self.status.set(RunState::Stopped);
    }
}
