//! Durable key-value persistence for settings and the last outcome.
//!
//! # Design
//! The store is unscoped, last-write-wins and never expires entries. The
//! outcome is written three times in different shapes: the results view
//! reads the combined envelope, older readers read the result and the user
//! snapshot keys separately.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FailureKind, StoreError};
use crate::types::{Settings, SubmissionResult, UserSnapshot};

pub const SETTINGS_KEY: &str = "connection-settings";
pub const OUTCOME_KEY: &str = "submission-outcome";
pub const USER_SNAPSHOT_KEY: &str = "submission-user-snapshot";
pub const ENVELOPE_KEY: &str = "submission-envelope";

/// String-to-string storage with local-storage semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, used by tests and by hosts that persist nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file.
///
/// The file and its parent directory are created on first write. Writes go
/// to a sibling temp file that is renamed over the original.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Entries to update. An unparsable file is replaced rather than left
    /// to block every later write.
    fn read_for_update(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.read_all() {
            Err(StoreError::Malformed(e)) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable storage file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.read_for_update()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_for_update()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Marks a persisted failure, so a response body that happens to share the
/// record's other fields still reads back as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "submission-failure")]
    SubmissionFailure,
}

/// Persisted in place of a response body when a submission failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub error: bool,
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub timestamp: String,
}

/// What the outcome key holds: a failure record or the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredResult {
    Failure(FailureRecord),
    Success(serde_json::Value),
}

impl StoredResult {
    pub fn from_result(result: &SubmissionResult, at: DateTime<Utc>) -> Self {
        match result {
            SubmissionResult::Success(body) => StoredResult::Success(body.clone().into_value()),
            SubmissionResult::Failure(err) => StoredResult::Failure(FailureRecord {
                record_type: RecordType::SubmissionFailure,
                error: true,
                kind: err.kind(),
                message: err.user_message(),
                hint: err.hint().map(str::to_string),
                timestamp: timestamp(at),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StoredResult::Failure(record) if record.error)
    }
}

/// Combined shape read by the results view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEnvelope {
    pub result: StoredResult,
    pub user: UserSnapshot,
    pub timestamp: String,
}

/// Typed access to settings and outcomes on top of a `KeyValueStore`.
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.store.set(SETTINGS_KEY, &serde_json::to_string(settings)?)
    }

    /// Last saved settings. Unreadable or malformed data counts as "none".
    pub fn load_settings(&self) -> Option<Settings> {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "could not read saved settings");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(error = %e, "ignoring malformed saved settings");
                None
            }
        }
    }

    /// Write the outcome under the result, user snapshot and envelope keys.
    ///
    /// The previous envelope is removed first. If a later write fails, the
    /// results view falls back to the separate keys instead of serving the
    /// previous submission.
    pub fn save_outcome(
        &self,
        result: &SubmissionResult,
        user: &UserSnapshot,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let envelope = OutcomeEnvelope {
            result: StoredResult::from_result(result, at),
            user: user.clone(),
            timestamp: timestamp(at),
        };
        self.store.remove(ENVELOPE_KEY)?;
        self.store.set(OUTCOME_KEY, &serde_json::to_string(&envelope.result)?)?;
        self.store.set(USER_SNAPSHOT_KEY, &serde_json::to_string(&envelope.user)?)?;
        self.store.set(ENVELOPE_KEY, &serde_json::to_string(&envelope)?)?;
        debug!(error = envelope.result.is_error(), "outcome persisted");
        Ok(())
    }

    /// Read the last outcome, preferring the envelope and falling back to
    /// the separate keys.
    pub fn load_outcome(&self) -> Result<Option<OutcomeEnvelope>, StoreError> {
        if let Some(raw) = self.store.get(ENVELOPE_KEY)? {
            return Ok(Some(serde_json::from_str(&raw)?));
        }
        let (Some(result), Some(user)) = (
            self.store.get(OUTCOME_KEY)?,
            self.store.get(USER_SNAPSHOT_KEY)?,
        ) else {
            return Ok(None);
        };
        let result: StoredResult = serde_json::from_str(&result)?;
        let timestamp = match &result {
            StoredResult::Failure(record) => record.timestamp.clone(),
            StoredResult::Success(_) => String::new(),
        };
        Ok(Some(OutcomeEnvelope {
            result,
            user: serde_json::from_str(&user)?,
            timestamp,
        }))
    }

    pub fn clear_outcome(&self) -> Result<(), StoreError> {
        for key in [OUTCOME_KEY, USER_SNAPSHOT_KEY, ENVELOPE_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
