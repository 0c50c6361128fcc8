//! Status presentation boundary.
//!
//! The host platform's persistent notification surface is external; the
//! agent drives it through [`StatusPresenter`]. Two renderings exist: an
//! initializing card shown as soon as a start is accepted, and a live card
//! re-issued for every accepted sample.

use crate::provider::LocationSample;
use chrono::{DateTime, Utc};

/// Render surface for the current tracking status.
///
/// Implementations must be callable from the sampling worker thread
/// concurrently with controller calls.
pub trait StatusPresenter: Send + Sync {
    /// Tracking accepted, no fix yet.
    fn show_initializing(&self);

    /// A sample was accepted; re-issue the live rendering.
    fn show_fix(&self, sample: &LocationSample);

    /// Tracking stopped; remove the rendering.
    fn clear(&self);
}

/// Format a sample the way the live card shows it: coordinates to six
/// decimal digits plus a human-readable capture time.
pub fn format_fix(sample: &LocationSample) -> String {
    let time = sample
        .captured_at_utc()
        .map(|t: DateTime<Utc>| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    format!(
        "{:.6}, {:.6} | updated {}",
        sample.latitude, sample.longitude, time
    )
}

/// Presenter that writes status lines to the terminal. Stands in for the
/// platform notification surface when running the simulated agent.
pub struct ConsolePresenter;

impl StatusPresenter for ConsolePresenter {
    fn show_initializing(&self) {
        println!("Location tracking active | initializing...");
    }

    fn show_fix(&self, sample: &LocationSample) {
        println!("Location tracking active | {}", format_fix(sample));
    }

    fn clear(&self) {
        println!("Location tracking stopped");
    }
}

/// Presenter that discards everything. Useful where no status surface
/// exists.
pub struct NullPresenter;

impl StatusPresenter for NullPresenter {
    fn show_initializing(&self) {}
    fn show_fix(&self, _sample: &LocationSample) {}
    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fix_six_decimals() {
        let sample = LocationSample {
            latitude: 52.520008,
            longitude: 13.404954,
            captured_at: 0,
            accuracy: 10.0,
        };
        let text = format_fix(&sample);
        assert!(text.starts_with("52.520008, 13.404954"));
        assert!(text.contains("00:00:00"));
    }

    #[test]
    fn test_format_fix_unrepresentable_time() {
        let sample = LocationSample {
            latitude: 0.0,
            longitude: 0.0,
            captured_at: i64::MAX,
            accuracy: 1.0,
        };
        assert!(format_fix(&sample).contains("--:--:--"));
    }
}
