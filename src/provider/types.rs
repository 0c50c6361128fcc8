//! Position sample and subscription types for the fix-provider boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single position estimate delivered by the fix provider.
///
/// Immutable once created; the agent retains only the most recent sample
/// (overwrite semantics, no history).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Capture time, epoch milliseconds UTC
    pub captured_at: i64,
    /// Estimated horizontal accuracy in meters
    pub accuracy: f32,
}

impl LocationSample {
    /// Create a sample captured now.
    pub fn new(latitude: f64, longitude: f64, accuracy: f32) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now().timestamp_millis(),
            accuracy,
        }
    }

    /// Capture time as a chrono timestamp, if representable.
    pub fn captured_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.captured_at)
    }
}

/// Fix quality requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyMode {
    /// Best available fix source, highest power draw
    High,
    /// Coarse, low-power fix source
    Balanced,
}

/// Parameters for an upstream sample subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// Target delivery interval between samples
    pub interval: Duration,
    /// Minimum interval the provider may deliver at (burst protection)
    pub min_interval: Duration,
    /// Maximum delivery latency / batching window
    pub max_latency: Duration,
    /// Requested fix quality
    pub accuracy: AccuracyMode,
    /// Whether delivery may be delayed until an accurate fix is available.
    /// The agent always sets this false: a low-accuracy sample now beats
    /// an accurate one later.
    pub wait_for_fix: bool,
}
