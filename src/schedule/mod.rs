use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};

pub mod error;
pub mod store;

pub use error::ScheduleError;
pub use store::{FileScheduleStore, ScheduleStore};

/// A check this close to `next_sync` fires early, so a coarse-grained tick
/// cannot miss the window entirely.
pub const EARLY_TRIGGER_TOLERANCE_SECS: i64 = 60;

/// Applied when no daily sync times are configured.
pub const FALLBACK_INTERVAL_HOURS: i64 = 3;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const SYNC_TIME_FORMAT: &str = "%H:%M";

/// Persisted scheduler state: when the replica last synced, when it should
/// sync next, and the configured daily trigger times (UTC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSchedule {
    /// Completion time of the most recent successful sync; `None` if the
    /// replica has never synced.
    pub last_sync: Option<DateTime<Utc>>,
    pub next_sync: DateTime<Utc>,
    pub sync_times: Vec<NaiveTime>,
}

impl SyncSchedule {
    /// Fresh schedule used when no durable state exists or the sidecar file
    /// is unreadable: pretend the last sync happened a day ago and aim for
    /// the next configured slot, so the process recovers instead of
    /// crash-looping on corrupt state.
    pub fn seeded(sync_times: Vec<NaiveTime>, now: DateTime<Utc>) -> Self {
        let now = truncate_to_minute(now);
        let next_sync = next_sync_or_fallback(&sync_times, now);
        Self {
            last_sync: Some(now - Duration::days(1)),
            next_sync,
            sync_times,
        }
    }
}

/// Whether the replica is stale enough to refresh. Pure; safe to call from
/// any number of concurrent readers.
pub fn is_due(schedule: &SyncSchedule, now: DateTime<Utc>) -> bool {
    if schedule.last_sync.is_none() {
        return true;
    }
    if now >= schedule.next_sync {
        return true;
    }
    schedule.next_sync - now <= Duration::seconds(EARLY_TRIGGER_TOLERANCE_SECS)
}

/// Earliest configured daily time strictly after `after`, rolling to the
/// next day when today's slot has passed. Duplicate entries collapse to one.
pub fn compute_next(
    sync_times: &[NaiveTime],
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    if sync_times.is_empty() {
        return Err(ScheduleError::NoScheduleConfigured);
    }

    let mut candidates: Vec<DateTime<Utc>> = sync_times
        .iter()
        .map(|time| {
            let mut candidate = after.date_naive().and_time(*time).and_utc();
            if candidate <= after {
                candidate += Duration::days(1);
            }
            candidate
        })
        .collect();

    candidates.sort();
    candidates.dedup();
    Ok(candidates[0])
}

/// `compute_next` with the documented fallback: an empty schedule yields
/// `after + 3h` and a configuration warning rather than an error.
pub fn next_sync_or_fallback(sync_times: &[NaiveTime], after: DateTime<Utc>) -> DateTime<Utc> {
    match compute_next(sync_times, after) {
        Ok(next) => next,
        Err(e) => {
            log::warn!(
                "{e}; scheduling next sync {FALLBACK_INTERVAL_HOURS} hours from now"
            );
            after + Duration::hours(FALLBACK_INTERVAL_HOURS)
        }
    }
}

/// Drop seconds and sub-second precision so in-memory timestamps match the
/// minute-granular durable record exactly.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Format a timestamp for the durable record, e.g. `2024-01-01 13:00 UTC`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    format!("{} UTC", ts.format(TIMESTAMP_FORMAT))
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let naive = s
        .strip_suffix(" UTC")
        .ok_or_else(|| ScheduleError::CorruptState(format!("timestamp {s:?} lacks UTC suffix")))?;
    NaiveDateTime::parse_from_str(naive, TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| ScheduleError::CorruptState(format!("timestamp {s:?}: {e}")))
}

pub fn format_sync_time(time: &NaiveTime) -> String {
    time.format(SYNC_TIME_FORMAT).to_string()
}

pub fn parse_sync_time(s: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(s, SYNC_TIME_FORMAT)
        .map_err(|e| ScheduleError::CorruptState(format!("sync time {s:?}: {e}")))
}
