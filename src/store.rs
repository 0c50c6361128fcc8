//! Durable state for the tracking agent.
//!
//! Two independent records survive process and device restarts:
//!
//! - tracking intent: whether the user wants tracking on
//! - last sample: the most recently accepted position
//!
//! Each record is committed as a whole file via write-to-temp-then-rename,
//! so a process killed mid-write leaves the previous value intact. Intent is
//! the only record ever read back into control decisions; the last sample is
//! informational.

use crate::provider::LocationSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const INTENT_FILE: &str = "tracking_intent.json";
const SAMPLE_FILE: &str = "last_sample.json";

/// Store errors.
#[derive(Debug)]
pub enum StoreError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::IoError(e) => write!(f, "IO error: {e}"),
            StoreError::ParseError(e) => write!(f, "Parse error: {e}"),
            StoreError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// On-disk shape of the tracking intent record.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIntent {
    enabled: bool,
    updated_at: DateTime<Utc>,
}

/// File-backed durable state with an in-memory cache.
///
/// Reads are served from the cache; every mutation commits to disk before
/// updating it. Safe to share across the controller and the sampling worker.
#[derive(Debug)]
pub struct StateStore {
    dir: PathBuf,
    intent: AtomicBool,
    last_sample: Mutex<Option<LocationSample>>,
}

impl StateStore {
    /// Open the store in `dir`, loading whatever records already exist.
    /// Missing records default to intent=false and no sample.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::IoError(e.to_string()))?;

        let intent = read_intent(&dir.join(INTENT_FILE))?;
        let last_sample = read_sample(&dir.join(SAMPLE_FILE))?;

        Ok(Self {
            dir,
            intent: AtomicBool::new(intent),
            last_sample: Mutex::new(last_sample),
        })
    }

    /// Current tracking intent.
    pub fn tracking_intent(&self) -> bool {
        self.intent.load(Ordering::SeqCst)
    }

    /// Durably set tracking intent. The write completes before this returns,
    /// so a restart immediately afterward observes the new value.
    pub fn set_intent(&self, enabled: bool) -> Result<(), StoreError> {
        let record = PersistedIntent {
            enabled,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        write_atomic(&self.dir.join(INTENT_FILE), &json)?;
        self.intent.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    /// Re-read intent from disk, picking up writes made by another process.
    pub fn reload_intent(&self) -> Result<bool, StoreError> {
        let enabled = read_intent(&self.dir.join(INTENT_FILE))?;
        self.intent.store(enabled, Ordering::SeqCst);
        Ok(enabled)
    }

    /// Most recently persisted sample, if any.
    pub fn last_sample(&self) -> Option<LocationSample> {
        *self.last_sample.lock().unwrap()
    }

    /// Durably overwrite the last-sample record. History is never kept.
    pub fn record_sample(&self, sample: &LocationSample) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(sample)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        write_atomic(&self.dir.join(SAMPLE_FILE), &json)?;
        *self.last_sample.lock().unwrap() = Some(*sample);
        Ok(())
    }

    /// Directory holding the durable records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn read_intent(path: &Path) -> Result<bool, StoreError> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::IoError(e.to_string()))?;
    let record: PersistedIntent =
        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))?;
    Ok(record.enabled)
}

fn read_sample(path: &Path) -> Result<Option<LocationSample>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::IoError(e.to_string()))?;
    let sample: LocationSample =
        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))?;
    Ok(Some(sample))
}

/// Single-record atomic commit: write a sibling temp file, then rename over
/// the target. Rename within one directory replaces atomically on the
/// platforms we care about.
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(|e| StoreError::IoError(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::IoError(e.to_string()))?;
    Ok(())
}
