//! Simulated fix provider.
//!
//! Emits a deterministic drifting position on a background thread, so the
//! agent can run end to end on machines without a positioning subsystem.

use crate::provider::{
    FixProvider, LocationSample, SubscribeError, SubscriptionHandle, SubscriptionRequest,
};
use chrono::Utc;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// A provider that synthesizes samples around a fixed origin.
pub struct SimulatedProvider {
    origin: (f64, f64),
    /// Forced subscription rejection, for exercising failure paths.
    reject_with: Option<SubscribeError>,
    active: Mutex<HashMap<SubscriptionHandle, Arc<AtomicBool>>>,
}

impl SimulatedProvider {
    /// Create a provider emitting samples near the given origin.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            origin: (latitude, longitude),
            reject_with: None,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Create a provider that rejects every subscription with `err`.
    pub fn rejecting(err: SubscribeError) -> Self {
        Self {
            origin: (0.0, 0.0),
            reject_with: Some(err),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Number of currently active subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

impl FixProvider for SimulatedProvider {
    fn subscribe(
        &self,
        request: &SubscriptionRequest,
        sink: Sender<LocationSample>,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        if let Some(err) = self.reject_with {
            return Err(err);
        }

        let handle = SubscriptionHandle::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.active
            .lock()
            .unwrap()
            .insert(handle, cancelled.clone());

        let origin = self.origin;
        let interval = request.interval;
        thread::spawn(move || emit_loop(origin, interval, sink, cancelled));

        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Some(cancelled) = self.active.lock().unwrap().remove(&handle) {
            cancelled.store(true, Ordering::SeqCst);
        }
    }
}

/// Emits one sample immediately, then one per interval until cancelled.
fn emit_loop(
    origin: (f64, f64),
    interval: Duration,
    sink: Sender<LocationSample>,
    cancelled: Arc<AtomicBool>,
) {
    // Small xorshift state seeded from the clock; drift only needs to look
    // plausible, not be random.
    let mut state = Utc::now().timestamp_millis() as u64 | 1;
    let mut lat = origin.0;
    let mut lon = origin.1;

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        // Drift a few meters per tick.
        lat += (((state % 200) as f64) - 100.0) * 1e-6;
        lon += ((((state >> 8) % 200) as f64) - 100.0) * 1e-6;
        let accuracy = 5.0 + ((state >> 16) % 20) as f32;

        let sample = LocationSample::new(lat, lon, accuracy);
        if sink.send(sample).is_err() {
            // Subscriber is gone; stop emitting.
            return;
        }

        // Sleep in short slices so unsubscribe takes effect promptly.
        let mut remaining = interval;
        while remaining > Duration::ZERO {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            let slice = remaining.min(Duration::from_millis(50));
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}
