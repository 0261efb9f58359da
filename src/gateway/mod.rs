//! Remote node group gateway
//!
//! Everything that talks to the IKS API lives here: the wire types, the
//! reqwest-backed client, and the failure taxonomy surfaced to callers.
//! The gateway performs no caching and no retries; a failed call is
//! reported once with exactly one [`FailureKind`].

pub mod client;
pub mod types;

pub use client::IksApiClient;
pub use types::{ClusterSnapshot, NodeGroupSnapshot, NodeSnapshot, ResizeRequest};

use async_trait::async_trait;
use thiserror::Error;

/// Classification of a failed gateway call.
///
/// Mapped from the remote HTTP status where one was received; callers
/// react on the kind alone and never inspect transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Timeout,
    Conflict,
    RateLimited,
    ServerError,
    ServiceUnavailable,
    /// The calling context was cancelled while the call was in flight.
    Cancelled,
    /// Rejected locally before any remote call was made.
    InvalidArgument,
    Unknown,
}

impl FailureKind {
    /// Maps an HTTP status code to a failure kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            503 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }
}

/// Errors surfaced by gateway calls.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The remote API answered with a status code outside the accepted
    /// set for the verb.
    #[error("IKS API returned {status} for {method} {url}")]
    Api {
        kind: FailureKind,
        status: u16,
        method: String,
        url: String,
    },

    /// The request timed out before a response arrived.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The request never completed (connection failure, malformed
    /// response body).
    #[error("transport failure for {url}: {message}")]
    Transport { url: String, message: String },

    /// The calling context was cancelled mid-call. No local state was
    /// mutated.
    #[error("request cancelled by caller shutdown")]
    Cancelled,

    /// Rejected by local validation, before any remote call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GatewayError {
    /// The single failure kind for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Api { kind, .. } => *kind,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Transport { .. } => FailureKind::Unknown,
            Self::Cancelled => FailureKind::Cancelled,
            Self::InvalidArgument(_) => FailureKind::InvalidArgument,
        }
    }
}

/// Read and write operations against the remote node group API.
///
/// The trait is the seam between the reconciler and the transport: the
/// real implementation is [`IksApiClient`], tests substitute a mock.
#[async_trait]
pub trait NodeGroupGateway: Send + Sync {
    /// Fetches the current state of a node group.
    async fn fetch_group(&self, remote_id: &str) -> Result<NodeGroupSnapshot, GatewayError>;

    /// Resizes a node group, optionally naming victim nodes to remove.
    ///
    /// Victims are identified by system uuid for provisioned machines and
    /// by ordinal index for nodes IKS has not finished creating.
    async fn resize(
        &self,
        remote_id: &str,
        new_count: u32,
        victims: &[String],
    ) -> Result<NodeGroupSnapshot, GatewayError>;

    /// Lists all node groups belonging to a cluster.
    async fn list_groups_for_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<NodeGroupSnapshot>, GatewayError>;
}

/// Hook consulted when the IKS API rejects the current token.
///
/// Re-authentication policy is a collaborator concern. A handler that
/// returns a replacement token opts in to a single retry of the failed
/// call; the default handler declines and the call fails immediately
/// with [`FailureKind::Unauthorized`].
#[async_trait]
pub trait ReauthHandler: Send + Sync {
    async fn replacement_token(&self) -> Option<String>;
}

/// Default re-authentication policy: fail immediately.
pub struct DenyReauth;

#[async_trait]
impl ReauthHandler for DenyReauth {
    async fn replacement_token(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory gateway for unit tests.

    use super::*;
    use std::sync::Mutex;

    /// Records resize calls and serves snapshots from a mutable listing.
    pub struct MockGateway {
        pub groups: Mutex<Vec<NodeGroupSnapshot>>,
        pub resize_calls: Mutex<Vec<ResizeCall>>,
        pub fail_next_resize: Mutex<Option<FailureKind>>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ResizeCall {
        pub remote_id: String,
        pub new_count: u32,
        pub victims: Vec<String>,
    }

    impl MockGateway {
        pub fn new(groups: Vec<NodeGroupSnapshot>) -> Self {
            Self {
                groups: Mutex::new(groups),
                resize_calls: Mutex::new(vec![]),
                fail_next_resize: Mutex::new(None),
            }
        }

        pub fn snapshot(id: &str, name: &str, role: &str, size: u32) -> NodeGroupSnapshot {
            NodeGroupSnapshot {
                id: id.to_string(),
                name: name.to_string(),
                cluster_id: "cluster-1".to_string(),
                role: role.to_string(),
                current_size: size,
                min_node_count: 1,
                max_node_count: Some(10),
                nodes: vec![],
                created_at: None,
                updated_at: None,
            }
        }
    }

    #[async_trait]
    impl NodeGroupGateway for MockGateway {
        async fn fetch_group(&self, remote_id: &str) -> Result<NodeGroupSnapshot, GatewayError> {
            self.groups
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.id == remote_id || g.name == remote_id)
                .cloned()
                .ok_or_else(|| GatewayError::Api {
                    kind: FailureKind::NotFound,
                    status: 404,
                    method: "GET".to_string(),
                    url: format!("mock:///node_groups/{remote_id}"),
                })
        }

        async fn resize(
            &self,
            remote_id: &str,
            new_count: u32,
            victims: &[String],
        ) -> Result<NodeGroupSnapshot, GatewayError> {
            self.resize_calls.lock().unwrap().push(ResizeCall {
                remote_id: remote_id.to_string(),
                new_count,
                victims: victims.to_vec(),
            });

            if let Some(kind) = self.fail_next_resize.lock().unwrap().take() {
                return Err(GatewayError::Api {
                    kind,
                    status: 409,
                    method: "POST".to_string(),
                    url: format!("mock:///node_groups/{remote_id}/resize"),
                });
            }

            let mut groups = self.groups.lock().unwrap();
            let group = groups
                .iter_mut()
                .find(|g| g.id == remote_id)
                .ok_or_else(|| GatewayError::Api {
                    kind: FailureKind::NotFound,
                    status: 404,
                    method: "POST".to_string(),
                    url: format!("mock:///node_groups/{remote_id}/resize"),
                })?;
            group.current_size = new_count;
            Ok(group.clone())
        }

        async fn list_groups_for_cluster(
            &self,
            _cluster_id: &str,
        ) -> Result<Vec<NodeGroupSnapshot>, GatewayError> {
            Ok(self.groups.lock().unwrap().clone())
        }
    }
}
