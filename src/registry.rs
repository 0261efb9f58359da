//! Node group registry and discovery reconciler
//!
//! Owns the authoritative in-memory collection of node groups and keeps
//! it synchronized with the remote listing. Two locks with distinct
//! jobs:
//!
//! - the *registry lock* guards structural membership of the collection
//!   and is never held across a remote call;
//! - the *cluster-update lock* serializes every operation that mutates
//!   remote cluster topology (the discovery refresh and each group's
//!   resize/delete) and is held across the remote call. Coarse on
//!   purpose: it closes the window where a refresh could drop a group
//!   out from under an in-flight resize.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, trace, warn};

use crate::config::{parse_node_group_spec, SpecParseError};
use crate::discovery::{parse_discovery_specs, DiscoveryConfig, DiscoveryParseError};
use crate::gateway::{GatewayError, NodeGroupGateway};
use crate::group::NodeGroup;
use crate::identity::unique_name;
use crate::noderef::NodeRef;

/// Default interval between discovery refreshes.
pub const DISCOVERY_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Errors from registry construction and reconciliation.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("node group with remote id {0:?} is already registered")]
    DuplicateRemoteId(String),

    #[error("node group with name {0:?} is already registered")]
    DuplicateName(String),

    #[error(transparent)]
    Spec(#[from] SpecParseError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryParseError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// The authoritative collection of autoscalable node groups.
///
/// Built either from static `min:max:name` specs or from auto discovery
/// specs; the two activation modes are mutually exclusive and fixed for
/// the lifetime of the registry.
pub struct NodeGroupRegistry {
    gateway: Arc<dyn NodeGroupGateway>,
    cluster_id: String,

    /// Registry lock. Membership reads and writes only.
    groups: Mutex<Vec<Arc<NodeGroup>>>,

    /// Shared with every registered group; see the module docs.
    cluster_update_lock: Arc<AsyncMutex<()>>,

    /// `Some` in auto discovery mode, `None` in static mode.
    discovery: Option<Vec<DiscoveryConfig>>,
    refresh_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,

    /// Provider id to remote group id, populated lazily by
    /// [`Self::group_for_node`]. Entries of dropped groups are evicted
    /// on refresh, so a stale hit falls through to a fresh scan.
    node_group_cache: DashMap<String, String>,
}

impl NodeGroupRegistry {
    fn empty(
        gateway: Arc<dyn NodeGroupGateway>,
        cluster_id: String,
        discovery: Option<Vec<DiscoveryConfig>>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            cluster_id,
            groups: Mutex::new(Vec::new()),
            cluster_update_lock: Arc::new(AsyncMutex::new(())),
            discovery,
            refresh_interval,
            last_refresh: Mutex::new(None),
            node_group_cache: DashMap::new(),
        }
    }

    /// Builds a registry from static `min:max:name` specs.
    ///
    /// Each spec's group is resolved through the gateway for its unique
    /// name, remote id and live size. An unparseable spec or a failed
    /// lookup is fatal.
    pub async fn from_static_specs(
        gateway: Arc<dyn NodeGroupGateway>,
        cluster_id: impl Into<String>,
        specs: &[String],
    ) -> Result<Self, RegistryError> {
        let registry = Self::empty(
            gateway.clone(),
            cluster_id.into(),
            None,
            DISCOVERY_REFRESH_INTERVAL,
        );

        for raw in specs {
            let spec = parse_node_group_spec(raw)?;
            let snapshot = registry.gateway.fetch_group(&spec.name).await?;
            let name = unique_name(&snapshot.name, &snapshot.id);
            registry.register(Arc::new(NodeGroup::new(
                name,
                snapshot.id,
                spec.min_size,
                spec.max_size,
                snapshot.current_size,
                gateway.clone(),
                registry.cluster_update_lock.clone(),
            )))?;
        }

        Ok(registry)
    }

    /// Builds a registry in auto discovery mode and runs the initial
    /// discovery synchronously, so the caller starts with a populated
    /// view.
    pub async fn with_auto_discovery(
        gateway: Arc<dyn NodeGroupGateway>,
        cluster_id: impl Into<String>,
        specs: &[String],
        refresh_interval: Duration,
    ) -> Result<Self, RegistryError> {
        let configs = parse_discovery_specs(specs)?;
        let registry = Self::empty(gateway, cluster_id.into(), Some(configs), refresh_interval);

        registry.refresh_node_groups().await?;
        *registry.lock_last_refresh() = Some(Instant::now());
        Ok(registry)
    }

    fn lock_groups(&self) -> MutexGuard<'_, Vec<Arc<NodeGroup>>> {
        self.groups.lock().expect("registry lock poisoned")
    }

    fn lock_last_refresh(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_refresh.lock().expect("refresh timestamp lock poisoned")
    }

    fn register(&self, group: Arc<NodeGroup>) -> Result<(), RegistryError> {
        let mut groups = self.lock_groups();
        if groups.iter().any(|g| g.remote_id() == group.remote_id()) {
            return Err(RegistryError::DuplicateRemoteId(
                group.remote_id().to_string(),
            ));
        }
        if groups.iter().any(|g| g.id() == group.id()) {
            return Err(RegistryError::DuplicateName(group.id().to_string()));
        }
        groups.push(group);
        Ok(())
    }

    /// Snapshot of all registered node groups.
    pub fn list_groups(&self) -> Vec<Arc<NodeGroup>> {
        self.lock_groups().clone()
    }

    /// Finds the node group a node belongs to, or `None` when the node
    /// is not part of an autoscaled group.
    ///
    /// Fake references carry their group id; real references resolve
    /// through the provider-id cache, falling back to listing each
    /// group's nodes through the gateway.
    pub async fn group_for_node(
        &self,
        node: &NodeRef,
    ) -> Result<Option<Arc<NodeGroup>>, GatewayError> {
        match node {
            NodeRef::Fake { group_id, .. } => Ok(self
                .lock_groups()
                .iter()
                .find(|g| g.id() == group_id)
                .cloned()),
            NodeRef::Real { provider_id, .. } => {
                if let Some(remote_id) = self.node_group_cache.get(provider_id) {
                    let cached = self
                        .lock_groups()
                        .iter()
                        .find(|g| g.remote_id() == remote_id.value())
                        .cloned();
                    if let Some(group) = cached {
                        trace!(provider_id = %provider_id, group = %group.id(), "node group cache hit");
                        return Ok(Some(group));
                    }
                }
                // Miss or a cached group that left the registry.
                self.node_group_cache.remove(provider_id);
                self.scan_for_provider_id(provider_id).await
            }
        }
    }

    /// Scans every registered group's node listing for a provider id,
    /// populating the cache along the way.
    async fn scan_for_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<Arc<NodeGroup>>, GatewayError> {
        for group in self.list_groups() {
            let snapshot = self.gateway.fetch_group(group.remote_id()).await?;
            let mut found = false;
            for node in &snapshot.nodes {
                self.node_group_cache
                    .insert(node.id.clone(), group.remote_id().to_string());
                if node.id == provider_id {
                    found = true;
                }
            }
            if found {
                debug!(provider_id = %provider_id, group = %group.id(), "resolved node to node group");
                return Ok(Some(group));
            }
        }
        debug!(provider_id = %provider_id, "node is not part of an autoscaled node group");
        Ok(None)
    }

    /// Reconciles the registry against the remote listing.
    ///
    /// Safe to call every decision-loop tick: in auto discovery mode the
    /// actual remote round-trip happens at most once per refresh
    /// interval, in static mode this only traces group state.
    pub async fn refresh(&self) -> Result<(), RegistryError> {
        for group in self.list_groups() {
            trace!("{}", group.debug_string());
        }

        if self.discovery.is_none() {
            return Ok(());
        }

        let due = match *self.lock_last_refresh() {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => true,
        };
        if !due {
            return Ok(());
        }
        *self.lock_last_refresh() = Some(Instant::now());

        self.refresh_node_groups().await
    }

    /// One discovery refresh cycle.
    ///
    /// Groups present on both sides are updated in place so their target
    /// size and deletion history survive a bounds change; identity for
    /// the diff is always the remote id, never the display name.
    async fn refresh_node_groups(&self) -> Result<(), RegistryError> {
        let Some(configs) = &self.discovery else {
            return Ok(());
        };

        let _guard = self.cluster_update_lock.lock().await;

        let discovered = self
            .gateway
            .list_groups_for_cluster(&self.cluster_id)
            .await?;

        // Snapshot the registered groups keyed by remote id. The registry
        // lock is released right after the copy.
        let registered: HashMap<String, Arc<NodeGroup>> = self
            .list_groups()
            .into_iter()
            .map(|g| (g.remote_id().to_string(), g))
            .collect();

        let mut eligible: HashSet<String> = HashSet::new();
        let mut additions: Vec<Arc<NodeGroup>> = Vec::new();

        for snapshot in discovered {
            if !configs.iter().any(|c| c.matches_role(&snapshot.role)) {
                continue;
            }
            let Some(max_size) = snapshot.max_node_count.filter(|max| *max >= 1) else {
                continue;
            };
            if !eligible.insert(snapshot.id.clone()) {
                continue;
            }

            if let Some(existing) = registered.get(&snapshot.id) {
                existing.set_bounds(snapshot.min_node_count, max_size);
                continue;
            }

            let name = unique_name(&snapshot.name, &snapshot.id);
            additions.push(Arc::new(NodeGroup::new(
                name,
                snapshot.id,
                snapshot.min_node_count,
                max_size,
                snapshot.current_size,
                self.gateway.clone(),
                self.cluster_update_lock.clone(),
            )));
        }

        // Apply additions and removals in a single critical section so
        // no reader observes a half-applied diff.
        let mut dropped: Vec<Arc<NodeGroup>> = Vec::new();
        let mut added_names: Vec<String> = Vec::new();
        {
            let mut groups = self.lock_groups();
            let buffer = std::mem::take(&mut *groups);
            for group in buffer {
                if eligible.contains(group.remote_id()) {
                    groups.push(group);
                } else {
                    dropped.push(group);
                }
            }
            for group in additions {
                // Same uniqueness rules as static registration: a
                // discovered group whose derived display name is already
                // taken is skipped, never allowed to shadow the holder.
                if groups.iter().any(|g| g.id() == group.id()) {
                    warn!(
                        group = %group.id(),
                        remote_id = %group.remote_id(),
                        "skipping discovered node group: display name already registered"
                    );
                    continue;
                }
                added_names.push(group.id().to_string());
                groups.push(group);
            }
        }

        for group in &dropped {
            self.node_group_cache
                .retain(|_, remote_id| remote_id != group.remote_id());
        }

        if !added_names.is_empty() {
            info!(
                count = added_names.len(),
                groups = %added_names.join(", "),
                "discovered new node groups for autoscaling"
            );
        }
        if !dropped.is_empty() {
            let names: Vec<&str> = dropped.iter().map(|g| g.id()).collect();
            info!(
                count = names.len(),
                groups = %names.join(", "),
                "dropped node groups which should no longer be autoscaled"
            );
        }

        Ok(())
    }
}
