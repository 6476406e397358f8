use crate::page::Viewport;
use crate::store::SessionStore;
use std::str::FromStr;
use wapt_common::error::RecorderError;
use wapt_common::protocol::{
    KEY_HEIGHT, KEY_RECORD_COUNT, KEY_RECORDING, KEY_START_TIME, KEY_TASK_NAME, KEY_WIDTH,
};

/// Value of the recording flag while a session exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Events are appended as records.
    Recording,
    /// A stop signal was seen; the records wait for delivery and nothing more
    /// is appended.
    Finalizing,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Recording => "true",
            SessionStatus::Finalizing => "finalizing",
        }
    }

    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "true" => Some(SessionStatus::Recording),
            "finalizing" => Some(SessionStatus::Finalizing),
            _ => None,
        }
    }
}

/// Session header persisted in the store.
///
/// Nothing is cached between page loads: every load rebuilds this value from the
/// store with [`Session::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub task_name: String,
    pub start_time: u64,
    pub viewport: Viewport,
    pub status: SessionStatus,
    pub record_count: u64,
}

impl Session {
    pub fn begin(task_name: impl Into<String>, start_time: u64, viewport: Viewport) -> Self {
        Self {
            task_name: task_name.into(),
            start_time,
            viewport,
            status: SessionStatus::Recording,
            record_count: 0,
        }
    }

    /// Read the current session, recording or finalizing, if any.
    ///
    /// A set recording flag with any header field missing or unparseable is
    /// reported as [`RecorderError::CorruptSession`].
    pub fn load(store: &dyn SessionStore) -> Result<Option<Session>, RecorderError> {
        let Some(status) = Self::status(store)? else {
            return Ok(None);
        };

        let task_name = store
            .get(KEY_TASK_NAME)?
            .ok_or_else(|| RecorderError::corrupt("taskname"))?;
        let start_time = read_number(store, KEY_START_TIME, "start_time")?;
        let record_count = read_number(store, KEY_RECORD_COUNT, "nrecords")?;
        let width = read_number(store, KEY_WIDTH, "width")?;
        let height = read_number(store, KEY_HEIGHT, "height")?;

        Ok(Some(Session {
            task_name,
            start_time,
            viewport: Viewport::new(width, height),
            status,
            record_count,
        }))
    }

    /// Persist every header field. The recording flag goes last so an
    /// interrupted save never leaves a flagged session with missing fields.
    pub fn save(&self, store: &dyn SessionStore) -> Result<(), RecorderError> {
        store.set(KEY_TASK_NAME, &self.task_name)?;
        store.set(KEY_START_TIME, &self.start_time.to_string())?;
        store.set(KEY_RECORD_COUNT, &self.record_count.to_string())?;
        store.set(KEY_WIDTH, &self.viewport.width.to_string())?;
        store.set(KEY_HEIGHT, &self.viewport.height.to_string())?;
        store.set(KEY_RECORDING, self.status.as_str())?;
        Ok(())
    }

    pub fn status(store: &dyn SessionStore) -> Result<Option<SessionStatus>, RecorderError> {
        Ok(store
            .get(KEY_RECORDING)?
            .as_deref()
            .and_then(SessionStatus::from_flag))
    }

    /// True only while events are being recorded.
    pub fn is_active(store: &dyn SessionStore) -> Result<bool, RecorderError> {
        Ok(Self::status(store)? == Some(SessionStatus::Recording))
    }

    /// Stop appending records without touching the ones already stored.
    pub fn mark_finalizing(store: &dyn SessionStore) -> Result<(), RecorderError> {
        store.set(KEY_RECORDING, SessionStatus::Finalizing.as_str())?;
        Ok(())
    }

    pub fn set_record_count(store: &dyn SessionStore, count: u64) -> Result<(), RecorderError> {
        store.set(KEY_RECORD_COUNT, &count.to_string())?;
        Ok(())
    }

    pub fn clear(store: &dyn SessionStore) -> Result<(), RecorderError> {
        store.clear()?;
        Ok(())
    }
}

fn read_number<T: FromStr>(
    store: &dyn SessionStore,
    key: &str,
    field: &'static str,
) -> Result<T, RecorderError> {
    store
        .get(key)?
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or_else(|| RecorderError::corrupt(field))
}

/// Task name for a page path: the last segment with its extension removed.
pub fn task_name_from_path(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or_default();
    let stem = match segment.rfind('.') {
        Some(0) | None => segment,
        Some(dot) => &segment[..dot],
    };
    if stem.is_empty() {
        "index".to_string()
    } else {
        stem.to_string()
    }
}
