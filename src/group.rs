//! Node group
//!
//! The mutable unit of scaling. A `NodeGroup` caches the bounds and
//! target size last known for its remote counterpart and executes size
//! changes through the gateway, updating the cache only after the remote
//! call reports success. Bounds are mutated exclusively by the registry's
//! refresh; the decision loop only ever changes the target.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::gateway::{GatewayError, NodeGroupGateway};
use crate::noderef::NodeRef;

/// How long a requested deletion is honored locally. Entries older than
/// this are pruned, so a node IKS never removed becomes a scale-down
/// candidate again.
pub const DELETED_NODE_RETENTION_MINS: i64 = 10;

/// Mutable state of a node group, guarded as one unit so readers never
/// observe a half-applied update.
#[derive(Debug)]
struct GroupState {
    min_size: u32,
    max_size: u32,
    target_size: u32,
    /// Victim key to the time its deletion was requested.
    deleted_nodes: HashMap<String, DateTime<Utc>>,
}

/// A logical pool of worker nodes backed by a remote IKS node group.
pub struct NodeGroup {
    /// Display name, unique within the registry.
    id: String,
    /// Identifier issued by IKS; immutable, the key for refresh diffing.
    remote_id: String,
    gateway: Arc<dyn NodeGroupGateway>,
    /// Serializes this group's remote mutations against the discovery
    /// refresh; held across the remote call.
    cluster_update_lock: Arc<Mutex<()>>,
    state: RwLock<GroupState>,
}

impl NodeGroup {
    pub(crate) fn new(
        id: String,
        remote_id: String,
        min_size: u32,
        max_size: u32,
        target_size: u32,
        gateway: Arc<dyn NodeGroupGateway>,
        cluster_update_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            id,
            remote_id,
            gateway,
            cluster_update_lock,
            state: RwLock::new(GroupState {
                min_size,
                max_size,
                target_size,
                deleted_nodes: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, GroupState> {
        self.state.read().expect("node group state lock poisoned")
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, GroupState> {
        self.state.write().expect("node group state lock poisoned")
    }

    /// Display name of this node group.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote identifier of this node group.
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn min_size(&self) -> u32 {
        self.state().min_size
    }

    pub fn max_size(&self) -> u32 {
        self.state().max_size
    }

    /// Cached target size. Authoritative only until the next refresh; a
    /// caller needing the remote truth triggers a refresh instead.
    pub fn current_size(&self) -> u32 {
        self.state().target_size
    }

    /// Updates the bounds in place when the remote values differ.
    ///
    /// Registry-refresh only: the target size and deletion ledger are
    /// deliberately left untouched so an in-flight scale-down is not
    /// forgotten over a bounds change.
    pub(crate) fn set_bounds(&self, min_size: u32, max_size: u32) {
        let mut state = self.state_mut();
        if state.min_size != min_size {
            state.min_size = min_size;
            info!(group = %self.id, min_size, "node group min node count changed");
        }
        if state.max_size != max_size {
            state.max_size = max_size;
            info!(group = %self.id, max_size, "node group max node count changed");
        }
    }

    /// Sets the target size of the group.
    ///
    /// The new target must lie within the bounds; violations are
    /// rejected before any remote call. On success the cached target is
    /// updated optimistically; on failure it is left unchanged and the
    /// failure kind propagates as-is.
    pub async fn set_size(&self, new_target: u32) -> Result<(), GatewayError> {
        // Validate under the cluster-update lock so a concurrent refresh
        // cannot move the bounds between the check and the remote call.
        let _guard = self.cluster_update_lock.lock().await;
        {
            let state = self.state();
            if new_target < state.min_size || new_target > state.max_size {
                return Err(GatewayError::InvalidArgument(format!(
                    "size {new_target} for node group {} is outside bounds {}..={}",
                    self.id, state.min_size, state.max_size
                )));
            }
        }

        self.gateway.resize(&self.remote_id, new_target, &[]).await?;

        self.state_mut().target_size = new_target;
        info!(group = %self.id, target = new_target, "node group resized");
        Ok(())
    }

    /// Deletes specific nodes by shrinking the group to `resulting_count`
    /// with the victims named explicitly.
    ///
    /// Placeholder nodes are identified to IKS by ordinal index, real
    /// nodes by system uuid. `resulting_count` must equal the current
    /// target minus the number of victims; a mismatch is rejected before
    /// any remote call.
    pub async fn delete_nodes(
        &self,
        refs: &[NodeRef],
        resulting_count: u32,
    ) -> Result<(), GatewayError> {
        let _guard = self.cluster_update_lock.lock().await;
        {
            let state = self.state();
            let expected = state.target_size.saturating_sub(refs.len() as u32);
            if resulting_count != expected || (refs.len() as u32) > state.target_size {
                return Err(GatewayError::InvalidArgument(format!(
                    "resulting count {resulting_count} does not match target {} minus {} victims \
                     for node group {}",
                    state.target_size,
                    refs.len(),
                    self.id
                )));
            }
        }

        let victims: Vec<String> = refs
            .iter()
            .inspect(|r| debug!(group = %self.id, node = %r, "deleting node"))
            .map(|r| r.victim().to_string())
            .collect();

        self.gateway
            .resize(&self.remote_id, resulting_count, &victims)
            .await?;

        let now = Utc::now();
        let mut state = self.state_mut();
        state.target_size = resulting_count;
        for node in refs {
            state.deleted_nodes.insert(node.ledger_key(), now);
        }
        info!(
            group = %self.id,
            removed = refs.len(),
            target = resulting_count,
            "nodes deleted from node group"
        );
        Ok(())
    }

    /// True iff a deletion for this victim key was requested recently.
    /// Consulting the ledger prunes entries past the retention window.
    pub fn was_recently_deleted(&self, key: &str) -> bool {
        let cutoff = Utc::now() - Duration::minutes(DELETED_NODE_RETENTION_MINS);
        let mut state = self.state_mut();
        state.deleted_nodes.retain(|_, requested| *requested > cutoff);
        state.deleted_nodes.contains_key(key)
    }

    /// One-line state summary for refresh logging.
    pub fn debug_string(&self) -> String {
        let state = self.state();
        format!(
            "{} (min: {}, max: {}, target: {})",
            self.id, state.min_size, state.max_size, state.target_size
        )
    }
}
