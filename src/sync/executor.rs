use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::NaiveTime;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::sleep;

use crate::cache::CacheLayer;
use crate::common::clock::Clock;
use crate::schedule::{
    self, format_timestamp, ScheduleError, ScheduleStore, SyncSchedule,
};
use crate::sync::remote::{PullOutcome, ReplicaRemote};
use crate::sync::status::{SharedSyncStatus, SyncStatus, SyncStatusState};

struct DueCheck {
    checked_at: Instant,
    due: bool,
}

/// Shared handle around the sync state machine. One instance per replica,
/// handed to every component that needs it (background worker, request
/// handlers, CLI) instead of living in ambient global state.
///
/// The schedule is read by many and written only inside [`perform_sync`]
/// under the sync lock, with the durable record saved in the same critical
/// section so memory and disk never disagree.
///
/// [`perform_sync`]: SyncScheduler::perform_sync
pub struct SyncScheduler {
    schedule: RwLock<SyncSchedule>,
    /// At-most-one-concurrent-sync guard around the executor body.
    sync_lock: TokioMutex<()>,
    store: Box<dyn ScheduleStore>,
    remote: Box<dyn ReplicaRemote>,
    caches: Vec<Arc<dyn CacheLayer>>,
    clock: Arc<dyn Clock>,
    status: SharedSyncStatus,
    drain_delay: Duration,
    due_check_ttl: Duration,
    due_cache: Mutex<Option<DueCheck>>,
    /// Bumped after every terminal transition; lets a caller that waited on
    /// the sync lock detect that its trigger was already serviced.
    epoch: AtomicU64,
}

impl SyncScheduler {
    /// Load the durable schedule and build the handle. A missing sidecar
    /// file seeds a fresh schedule from `configured_times`; an unreadable
    /// one does the same with a warning, so corrupt state self-heals
    /// instead of crash-looping.
    pub fn initialize(
        store: Box<dyn ScheduleStore>,
        remote: Box<dyn ReplicaRemote>,
        caches: Vec<Arc<dyn CacheLayer>>,
        clock: Arc<dyn Clock>,
        configured_times: Vec<NaiveTime>,
        drain_delay: Duration,
        due_check_ttl: Duration,
    ) -> Self {
        let now = clock.now();
        let schedule = match store.load() {
            Ok(schedule) => schedule,
            Err(ScheduleError::NotFound(path)) => {
                log::info!("no schedule state at {path}; seeding a fresh schedule");
                let seeded = SyncSchedule::seeded(configured_times, now);
                if let Err(e) = store.save(&seeded) {
                    log::warn!("could not persist seeded schedule: {e}");
                }
                seeded
            }
            Err(e) => {
                log::warn!("schedule state unreadable ({e}); seeding a fresh schedule");
                let seeded = SyncSchedule::seeded(configured_times, now);
                if let Err(e) = store.save(&seeded) {
                    log::warn!("could not persist seeded schedule: {e}");
                }
                seeded
            }
        };
        log::info!(
            "sync schedule loaded; next sync at {}",
            format_timestamp(&schedule.next_sync)
        );

        Self {
            schedule: RwLock::new(schedule),
            sync_lock: TokioMutex::new(()),
            store,
            remote,
            caches,
            clock,
            status: SharedSyncStatus::default(),
            drain_delay,
            due_check_ttl,
            due_cache: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// Whether a sync should run now. The verdict is cached for the
    /// configured TTL to bound how often the schedule is re-evaluated on
    /// hot paths; every sync attempt resets the cache.
    pub fn is_sync_due(&self) -> bool {
        {
            let cached = self.due_cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(check) = cached.as_ref() {
                if check.checked_at.elapsed() < self.due_check_ttl {
                    return check.due;
                }
            }
        }

        let due = {
            let guard = self.schedule.read().unwrap_or_else(PoisonError::into_inner);
            schedule::is_due(&guard, self.clock.now())
        };
        *self.due_cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(DueCheck {
            checked_at: Instant::now(),
            due,
        });
        due
    }

    /// Background path: run the executor only when the due-check fires.
    /// Shares the executor body with [`perform_sync`], so the
    /// invalidate-then-drain-then-pull ordering is never bypassed.
    ///
    /// [`perform_sync`]: SyncScheduler::perform_sync
    pub async fn sync_if_due(&self) -> Option<SyncStatus> {
        if !self.is_sync_due() {
            return None;
        }
        Some(self.perform_sync().await)
    }

    /// Run one sync attempt and return its terminal status. Unconditional:
    /// manual triggers call this directly, bypassing the due-check but not
    /// the sync lock. A caller that blocked while another sync ran gets
    /// that sync's status back without a second remote pull.
    pub async fn perform_sync(&self) -> SyncStatus {
        let epoch_before = self.epoch.load(Ordering::Acquire);
        let _guard = self.sync_lock.lock().await;
        if self.epoch.load(Ordering::Acquire) != epoch_before {
            log::info!("sync already performed by a concurrent caller; skipping duplicate pull");
            return self.status.lock().await.last_status.clone();
        }

        let attempt_started = self.clock.now();

        // Invalidate derived state before touching the replica, then give
        // in-flight readers a moment to release their handles before the
        // file is overwritten. The fixed delay is a known approximation of
        // a reader drain, not a hard barrier.
        for cache in &self.caches {
            cache.invalidate_all();
        }
        self.reset_due_cache();
        log::info!(
            "caches cleared for sync; draining readers for {} ms",
            self.drain_delay.as_millis()
        );
        sleep(self.drain_delay).await;

        let pull_started = Instant::now();
        let outcome = self.remote.pull().await;
        let pull_ms = pull_started.elapsed().as_millis() as u64;

        let (status, frames_applied) = match outcome {
            PullOutcome::Completed { frames_applied } => {
                (self.commit_success(pull_ms), frames_applied)
            }
            PullOutcome::Unsupported(reason) => {
                log::info!("skipping sync: {reason}");
                (SyncStatus::SkippedUnsupported(reason), 0)
            }
            PullOutcome::Failed(reason) => {
                // Schedule left untouched so the next due-check retries.
                log::error!("sync failed: {reason}");
                (SyncStatus::Failed(reason), 0)
            }
        };

        self.reset_due_cache();
        {
            let mut state = self.status.lock().await;
            state.last_status = status.clone();
            state.last_attempt_at = Some(attempt_started);
            state.last_pull_ms = pull_ms;
            state.frames_applied = frames_applied;
        }
        self.epoch.fetch_add(1, Ordering::Release);
        status
    }

    /// Advance and persist the schedule after a confirmed pull. The durable
    /// record is written first; memory is only updated once the write
    /// lands, so a save failure leaves both sides on the old schedule.
    fn commit_success(&self, pull_ms: u64) -> SyncStatus {
        let now = schedule::truncate_to_minute(self.clock.now());
        let updated = {
            let current = self.schedule.read().unwrap_or_else(PoisonError::into_inner);
            SyncSchedule {
                last_sync: Some(now),
                next_sync: schedule::next_sync_or_fallback(&current.sync_times, now),
                sync_times: current.sync_times.clone(),
            }
        };

        match self.store.save(&updated) {
            Ok(()) => {
                log::info!(
                    "replica synced in {pull_ms} ms; next sync at {}",
                    format_timestamp(&updated.next_sync)
                );
                *self.schedule.write().unwrap_or_else(PoisonError::into_inner) = updated;
                SyncStatus::Success
            }
            Err(e) => {
                log::error!("pull succeeded but schedule could not be persisted: {e}");
                SyncStatus::Failed(format!("schedule persist failed: {e}"))
            }
        }
    }

    fn reset_due_cache(&self) {
        *self.due_cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of the current schedule for display.
    pub fn schedule(&self) -> SyncSchedule {
        self.schedule
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of this session's sync status.
    pub async fn status(&self) -> SyncStatusState {
        self.status.lock().await.clone()
    }
}
