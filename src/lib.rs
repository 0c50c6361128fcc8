//! Geotrack Agent - background location tracking with durable intent.
//!
//! This library implements a background sampling service that periodically
//! records device position, persists the latest sample, and reflects its
//! status to observers. The interesting part is not the sampling itself but
//! the lifecycle: the user's desire for tracking ("intent") is durable and
//! survives process death and device reboots, while the runtime session is
//! rebuilt from it on every restart.
//!
//! # State restoration
//!
//! - **Explicit stop clears intent.** Only the user opts out.
//! - **Failed restarts defer, never opt out.** If tracking was on and the
//!   environment is unusable after a reboot (positioning off, permission
//!   revoked), the agent stays stopped but keeps intent, so recovery resumes
//!   tracking without a new opt-in.
//! - **Run state is never persisted.** Every process starts stopped and
//!   reconciles from intent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Geotrack Agent                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  start/stop  boot signal        ┌─────────────┐             │
//! │      │            │             │ Environment │             │
//! │      ▼            ▼             │    Probe    │             │
//! │  ┌─────────────────────────┐    └──────┬──────┘             │
//! │  │    ServiceController    │◀──────────┘                    │
//! │  │  Stopped/Starting/      │──────────────▶ StatusHandle    │
//! │  │  Running                │                                │
//! │  └──────┬──────────────────┘                                │
//! │         ▼                                                   │
//! │  ┌─────────────┐  samples   ┌─────────────┐  ┌───────────┐  │
//! │  │ SamplingLoop│◀───────────│ FixProvider │  │ Presenter │  │
//! │  └──────┬──────┘            └─────────────┘  └─────▲─────┘  │
//! │         │ persist                                  │        │
//! │         ▼                                 refresh  │        │
//! │  ┌─────────────┐                                   │        │
//! │  │  StateStore │───────────────────────────────────┘        │
//! │  │ (intent +   │                                            │
//! │  │  last fix)  │                                            │
//! │  └─────────────┘                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use geotrack_agent::{
//!     Config, ConsolePresenter, ServiceController, SimulatedProvider,
//!     StateStore, StaticEnvironment,
//! };
//!
//! let config = Config::default();
//! let store = Arc::new(StateStore::open(&config.data_path).expect("store"));
//! let mut controller = ServiceController::new(
//!     &config,
//!     Arc::new(SimulatedProvider::new(52.52, 13.405)),
//!     Arc::new(StaticEnvironment::all_granted()),
//!     store,
//!     Arc::new(ConsolePresenter),
//! );
//!
//! controller.request_start().expect("start tracking");
//! let status = controller.status();
//! assert!(status.is_active());
//! ```

pub mod config;
pub mod controller;
pub mod environment;
pub mod notify;
pub mod provider;
pub mod sampling;
pub mod status;
pub mod store;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SamplingPolicy};
pub use controller::{PreconditionFailure, ReconcileOutcome, ServiceController, StartFailure};
pub use environment::{AuthorizationKind, EnvironmentProbe, StaticEnvironment};
pub use notify::{ConsolePresenter, NullPresenter, StatusPresenter};
pub use provider::{
    AccuracyMode, FixProvider, LocationSample, SimulatedProvider, SubscribeError,
    SubscriptionHandle, SubscriptionRequest,
};
pub use sampling::{SamplerEvent, SamplingLoop, StartError};
pub use status::{RunState, StatusHandle};
pub use store::{StateStore, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
