// Core scheduler modules
pub mod cache;
pub mod common;
pub mod config;
pub mod schedule;
pub mod sync;

// Public exports
pub use cache::{CacheLayer, QueryCache};
pub use common::clock::{Clock, SystemClock};
pub use config::SyncConfig;
pub use schedule::{compute_next, is_due, FileScheduleStore, ScheduleError, ScheduleStore, SyncSchedule};
pub use sync::{
    GrpcRemote, LocalOnlyRemote, PullOutcome, ReplicaRemote, SyncScheduler, SyncStatus, SyncWorker,
};
