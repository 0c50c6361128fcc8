//! Fix-provider boundary.
//!
//! The platform's location subsystem is an external collaborator; the agent
//! consumes it through the [`FixProvider`] trait. Samples are pushed into a
//! channel sink owned by the sampling loop, which keeps delivery decoupled
//! from the provider's own scheduling.

pub mod sim;
pub mod types;

use crossbeam_channel::Sender;
use uuid::Uuid;

pub use sim::SimulatedProvider;
pub use types::{AccuracyMode, LocationSample, SubscriptionRequest};

/// Opaque handle identifying one active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors a provider may return when a subscription is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeError {
    /// The caller lacks location authorization.
    AuthorizationMissing,
    /// The positioning subsystem is disabled or absent.
    ProviderUnavailable,
}

impl std::fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscribeError::AuthorizationMissing => {
                write!(f, "location authorization not granted")
            }
            SubscribeError::ProviderUnavailable => {
                write!(f, "positioning provider unavailable")
            }
        }
    }
}

impl std::error::Error for SubscribeError {}

/// Source of periodic position samples.
///
/// A subscription delivers [`LocationSample`]s into `sink` on the provider's
/// own schedule until unsubscribed. It may deliver nothing indefinitely under
/// poor radio conditions; that is the subscriber's problem to watchdog.
pub trait FixProvider: Send + Sync {
    /// Establish a subscription with the given delivery policy.
    fn subscribe(
        &self,
        request: &SubscriptionRequest,
        sink: Sender<LocationSample>,
    ) -> Result<SubscriptionHandle, SubscribeError>;

    /// Tear down a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
