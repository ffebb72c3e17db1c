use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tonic::{Code, Request};

use crate::sync::proto::replication_service_client::ReplicationServiceClient;
use crate::sync::proto::PullRequest;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed outcome of one remote pull. The executor switches on these values
/// instead of inspecting error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Completed { frames_applied: u64 },
    /// The target cannot replicate; expected for local-only replicas.
    Unsupported(String),
    Failed(String),
}

/// The remote-authoritative database, as seen by the executor: a single
/// blocking pull with no partial-progress reporting.
#[async_trait]
pub trait ReplicaRemote: Send + Sync {
    async fn pull(&self) -> PullOutcome;
}

/// gRPC replication endpoint. Connect and call are both bounded by
/// timeouts, so a hung remote surfaces as `Failed` rather than blocking the
/// executor indefinitely.
pub struct GrpcRemote {
    target: String,
    replica_id: String,
    auth_token: Option<String>,
    pull_timeout: Duration,
}

impl GrpcRemote {
    pub fn new(target: &str, replica_id: &str) -> Self {
        Self {
            target: target.to_string(),
            replica_id: replica_id.to_string(),
            auth_token: None,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }

    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(token);
        self
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }
}

#[async_trait]
impl ReplicaRemote for GrpcRemote {
    async fn pull(&self) -> PullOutcome {
        let endpoint = match Endpoint::from_shared(format!("http://{}", self.target)) {
            Ok(ep) => ep,
            Err(e) => return PullOutcome::Failed(format!("invalid remote address: {e}")),
        };

        let channel = match endpoint
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(self.pull_timeout)
            .connect()
            .await
        {
            Ok(ch) => ch,
            Err(e) => return PullOutcome::Failed(format!("connect to {}: {e}", self.target)),
        };

        let mut client = ReplicationServiceClient::new(channel);
        let request = PullRequest {
            replica_id: self.replica_id.clone(),
            auth_token: self.auth_token.clone().unwrap_or_default(),
        };

        match client.pull(Request::new(request)).await {
            Ok(response) => {
                let response = response.into_inner();
                if response.supported {
                    PullOutcome::Completed {
                        frames_applied: response.frames_applied,
                    }
                } else {
                    PullOutcome::Unsupported(response.message)
                }
            }
            Err(status)
                if matches!(status.code(), Code::Unimplemented | Code::FailedPrecondition) =>
            {
                PullOutcome::Unsupported(status.message().to_string())
            }
            Err(status) => PullOutcome::Failed(status.to_string()),
        }
    }
}

/// Stand-in remote for a replica that is a plain local file with no remote
/// endpoint configured. Every pull is skipped, never failed.
pub struct LocalOnlyRemote;

#[async_trait]
impl ReplicaRemote for LocalOnlyRemote {
    async fn pull(&self) -> PullOutcome {
        PullOutcome::Unsupported(
            "replica is a local-only file without a configured remote".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_only_remote_always_skips() {
        let outcome = LocalOnlyRemote.pull().await;
        assert!(matches!(outcome, PullOutcome::Unsupported(_)));
    }

    #[tokio::test]
    async fn invalid_address_is_a_failure() {
        let outcome = GrpcRemote::new("not a host:port", "replica.db").pull().await;
        match outcome {
            PullOutcome::Failed(reason) => {
                assert!(reason.contains("invalid remote address") || reason.contains("connect"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
