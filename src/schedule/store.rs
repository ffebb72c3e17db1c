use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    format_sync_time, format_timestamp, parse_sync_time, parse_timestamp, ScheduleError,
    SyncSchedule,
};

/// Wire form of the sidecar record. Timestamps carry an explicit zone
/// suffix; sync times are bare `HH:MM` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScheduleRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync: Option<String>,
    next_sync: String,
    sync_times: Vec<String>,
}

/// Durable home for the [`SyncSchedule`], pluggable so a key-value store can
/// replace the file-backed default without touching the executor.
pub trait ScheduleStore: Send + Sync {
    fn load(&self) -> Result<SyncSchedule, ScheduleError>;
    fn save(&self, schedule: &SyncSchedule) -> Result<(), ScheduleError>;
}

/// JSON sidecar file next to the replica.
pub struct FileScheduleStore {
    path: PathBuf,
}

impl FileScheduleStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for FileScheduleStore {
    fn load(&self) -> Result<SyncSchedule, ScheduleError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScheduleError::NotFound(self.path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let record: ScheduleRecord = serde_json::from_str(&raw)
            .map_err(|e| ScheduleError::CorruptState(format!("{}: {e}", self.path.display())))?;

        let last_sync = record
            .last_sync
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let next_sync = parse_timestamp(&record.next_sync)?;
        let sync_times = record
            .sync_times
            .iter()
            .map(|s| parse_sync_time(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SyncSchedule {
            last_sync,
            next_sync,
            sync_times,
        })
    }

    fn save(&self, schedule: &SyncSchedule) -> Result<(), ScheduleError> {
        let record = ScheduleRecord {
            last_sync: schedule.last_sync.as_ref().map(format_timestamp),
            next_sync: format_timestamp(&schedule.next_sync),
            sync_times: schedule.sync_times.iter().map(format_sync_time).collect(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| ScheduleError::CorruptState(e.to_string()))?;

        // Write to a sibling temp file and rename over the target, so a
        // concurrent reader never observes a half-written record.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
