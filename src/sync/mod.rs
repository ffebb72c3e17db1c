pub mod executor;
pub mod remote;
pub mod status;
pub mod worker;

pub use executor::SyncScheduler;
pub use remote::{GrpcRemote, LocalOnlyRemote, PullOutcome, ReplicaRemote};
pub use status::{SharedSyncStatus, SyncStatus, SyncStatusState};
pub use worker::SyncWorker;

pub mod proto {
    tonic::include_proto!("replication");
}
