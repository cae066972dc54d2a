use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("State file {path} is inconsistent: {reason}")]
    Invalid { path: PathBuf, reason: &'static str },
}

/// On-disk form of the refresh state. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub next_available_time: Option<i64>,
    #[serde(default)]
    pub is_polling: bool,
    #[serde(default)]
    pub polling_start_time: Option<i64>,
}

impl PersistedState {
    pub fn new(
        next_available_at: Option<DateTime<Utc>>,
        polling_started_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            next_available_time: next_available_at.map(|t| t.timestamp_millis()),
            is_polling: polling_started_at.is_some(),
            polling_start_time: polling_started_at.map(|t| t.timestamp_millis()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.next_available_time.is_none() && !self.is_polling
    }

    pub fn next_available_at(&self) -> Option<DateTime<Utc>> {
        self.next_available_time.and_then(from_millis)
    }

    pub fn polling_started_at(&self) -> Option<DateTime<Utc>> {
        self.polling_start_time.and_then(from_millis)
    }

    fn check(&self) -> Result<(), &'static str> {
        if self.is_polling != self.polling_start_time.is_some() {
            return Err("polling flag and polling start time disagree");
        }
        if self.is_polling && self.next_available_time.is_some() {
            return Err("polling and cooldown recorded at the same time");
        }
        if self.next_available_time.is_some() && self.next_available_at().is_none() {
            return Err("next available time is out of range");
        }
        if self.polling_start_time.is_some() && self.polling_started_at().is_none() {
            return Err("polling start time is out of range");
        }
        Ok(())
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Durable, write-through storage for [`PersistedState`], one JSON file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when nothing is stored.
    pub fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let state: PersistedState =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;

        state.check().map_err(|reason| StoreError::Invalid {
            path: self.path.clone(),
            reason,
        })?;

        Ok(Some(state))
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        tracing::debug!(path = ?self.path, ?state, "Saved refresh state");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = ?self.path, "Cleared refresh state");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
