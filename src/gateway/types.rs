//! Wire types for the IKS API
//!
//! These mirror the JSON bodies of the node group and cluster endpoints.
//! They are pure data carriers: eligibility checks live here, everything
//! stateful lives in the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node group as reported by the IKS API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroupSnapshot {
    /// Opaque identifier issued by IKS. Immutable; the primary key for
    /// diffing during refresh.
    pub id: String,

    /// Raw name of the node group. Not unique on its own; see
    /// [`crate::identity::unique_name`].
    pub name: String,

    /// Cluster this node group belongs to.
    #[serde(default)]
    pub cluster_id: String,

    /// Role label used by auto discovery filtering.
    #[serde(default)]
    pub role: String,

    /// Current worker count as known by IKS.
    pub current_size: u32,

    /// Lower autoscaling bound.
    #[serde(default)]
    pub min_node_count: u32,

    /// Upper autoscaling bound. Unset means the group is not eligible
    /// for autoscaling.
    #[serde(default)]
    pub max_node_count: Option<u32>,

    /// Raw node list for this group.
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl NodeGroupSnapshot {
    /// A group is eligible for autoscaling iff it has a defined, non-zero
    /// maximum size.
    pub fn is_eligible(&self) -> bool {
        self.max_node_count.is_some_and(|max| max >= 1)
    }
}

/// A single worker node within a node group, as reported by IKS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Provider-assigned identifier of the machine.
    pub id: String,

    #[serde(default)]
    pub private_ip: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub public_ip: Option<String>,

    /// Lifecycle status string (e.g. "ACTIVE", "CREATING").
    #[serde(default)]
    pub status: String,
}

/// A cluster as reported by the IKS API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub node_group_ids: Vec<String>,

    #[serde(default)]
    pub worker_count: u32,

    #[serde(default)]
    pub status: String,
}

/// Body of a resize call.
///
/// The victim list is advisory: it names specific nodes to remove when
/// shrinking. Victims IKS does not recognize are treated as an arbitrary
/// size reduction.
#[derive(Debug, Clone, Serialize)]
pub struct ResizeRequest {
    pub node_count: u32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes_to_remove: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub nodegroup: String,
}
