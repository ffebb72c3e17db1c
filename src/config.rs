use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::schedule::{parse_sync_time, ScheduleError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Path to the local replica database file; also used as the replica id
    /// reported to the remote.
    pub replica_path: String,
    /// `host:port` of the remote replication endpoint. `None` runs in
    /// local-only mode where every sync is skipped.
    pub remote_addr: Option<String>,
    /// Name of the environment variable holding the replication auth token.
    pub auth_token_env: String,
    /// Path of the JSON sidecar file holding the persisted schedule.
    pub state_path: String,
    /// Daily sync trigger times as `HH:MM` strings, UTC.
    pub sync_times: Vec<String>,
    /// Seconds between background due-check ticks.
    pub tick_interval_secs: u64,
    /// Milliseconds to wait after cache invalidation before pulling, so
    /// in-flight readers can release their handles.
    pub drain_delay_ms: u64,
    /// Seconds a due-check verdict stays cached before re-evaluating.
    pub due_check_ttl_secs: u64,
    /// Seconds before an in-flight pull is abandoned as failed.
    pub pull_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replica_path: "./replica.db".to_string(),
            remote_addr: None,
            auth_token_env: "REPLISYNC_AUTH_TOKEN".to_string(),
            state_path: "./sync_state.json".to_string(),
            sync_times: vec!["01:00".to_string(), "13:00".to_string()],
            tick_interval_secs: 60,
            drain_delay_ms: 200,
            due_check_ttl_secs: 900,
            pull_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Validate and parse the configured `HH:MM` strings.
    pub fn parsed_sync_times(&self) -> Result<Vec<NaiveTime>, ScheduleError> {
        self.sync_times.iter().map(|s| parse_sync_time(s)).collect()
    }

    /// Auth token from the configured environment variable, if set.
    pub fn resolve_auth_token(&self) -> Option<String> {
        std::env::var(&self.auth_token_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn default_values_are_sensible() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.replica_path, "./replica.db");
        assert!(cfg.remote_addr.is_none());
        assert_eq!(cfg.sync_times, vec!["01:00", "13:00"]);
        assert_eq!(cfg.tick_interval_secs, 60);
        assert_eq!(cfg.drain_delay_ms, 200);
        assert_eq!(cfg.due_check_ttl_secs, 900);
    }

    #[test]
    fn json_round_trip() {
        let cfg = SyncConfig {
            remote_addr: Some("db.example.net:5001".to_string()),
            ..SyncConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.remote_addr.as_deref(), Some("db.example.net:5001"));
        assert_eq!(back.sync_times, cfg.sync_times);
    }

    #[test]
    fn parsed_sync_times_validates_entries() {
        let cfg = SyncConfig::default();
        assert_eq!(
            cfg.parsed_sync_times().unwrap(),
            vec![
                NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            ]
        );

        let bad = SyncConfig {
            sync_times: vec!["13:00".to_string(), "24:99".to_string()],
            ..SyncConfig::default()
        };
        assert!(bad.parsed_sync_times().is_err());
    }
}
