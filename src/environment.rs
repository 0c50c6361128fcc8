//! Environment preconditions for starting a tracking session.
//!
//! Positioning availability and authorization state live outside the agent;
//! this module is the single query boundary the controller consults before
//! every start attempt, whether user-triggered or restart-triggered.

use serde::{Deserialize, Serialize};

/// A location authorization grant the platform may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationKind {
    /// Approximate position
    Coarse,
    /// Precise position
    Fine,
    /// Position access while detached from any foreground UI
    Background,
}

impl std::fmt::Display for AuthorizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationKind::Coarse => write!(f, "coarse"),
            AuthorizationKind::Fine => write!(f, "fine"),
            AuthorizationKind::Background => write!(f, "background"),
        }
    }
}

/// Query surface over the platform's positioning and authorization state.
pub trait EnvironmentProbe: Send + Sync {
    /// Whether any positioning provider is currently enabled.
    fn positioning_enabled(&self) -> bool;

    /// Whether the given authorization kind is granted.
    fn has_authorization(&self, kind: AuthorizationKind) -> bool;
}

/// Fixed-answer probe for the simulated agent and for tests.
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    pub positioning: bool,
    pub coarse: bool,
    pub fine: bool,
    pub background: bool,
}

impl StaticEnvironment {
    /// Everything enabled and granted.
    pub fn all_granted() -> Self {
        Self {
            positioning: true,
            coarse: true,
            fine: true,
            background: true,
        }
    }

    /// Positioning disabled, all grants present.
    pub fn positioning_disabled() -> Self {
        Self {
            positioning: false,
            ..Self::all_granted()
        }
    }

    /// Positioning enabled, no grants at all.
    pub fn no_authorization() -> Self {
        Self {
            positioning: true,
            coarse: false,
            fine: false,
            background: false,
        }
    }
}

impl EnvironmentProbe for StaticEnvironment {
    fn positioning_enabled(&self) -> bool {
        self.positioning
    }

    fn has_authorization(&self, kind: AuthorizationKind) -> bool {
        match kind {
            AuthorizationKind::Coarse => self.coarse,
            AuthorizationKind::Fine => self.fine,
            AuthorizationKind::Background => self.background,
        }
    }
}
