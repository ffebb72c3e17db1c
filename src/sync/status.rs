use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Terminal outcome of the most recent sync attempt in this process.
/// Never persisted; recomputed each session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    NotYetRun,
    Success,
    /// The local store cannot replicate (no remote configured, or a plain
    /// local-only file). Expected in offline mode, not an error.
    SkippedUnsupported(String),
    Failed(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::NotYetRun => write!(f, "Not yet run"),
            SyncStatus::Success => write!(f, "Success"),
            SyncStatus::SkippedUnsupported(reason) => write!(f, "Skipped: {reason}"),
            SyncStatus::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}

/// In-memory sync status for a single process.
#[derive(Debug, Clone, Default)]
pub struct SyncStatusState {
    pub last_status: SyncStatus,
    /// When the last sync attempt started, regardless of outcome.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Wall time the last remote pull took, in milliseconds.
    pub last_pull_ms: u64,
    /// Frames applied by the last successful pull.
    pub frames_applied: u64,
}

pub type SharedSyncStatus = Arc<Mutex<SyncStatusState>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_messages_read_plainly() {
        assert_eq!(SyncStatus::NotYetRun.to_string(), "Not yet run");
        assert_eq!(SyncStatus::Success.to_string(), "Success");
        assert_eq!(
            SyncStatus::SkippedUnsupported("local-only file".into()).to_string(),
            "Skipped: local-only file"
        );
        assert_eq!(
            SyncStatus::Failed("auth expired".into()).to_string(),
            "Failed: auth expired"
        );
    }
}
