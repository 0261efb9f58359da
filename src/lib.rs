//! ixscale - node group reconciliation for ixCloud IKS clusters
//!
//! Keeps an in-memory registry of autoscalable node groups synchronized
//! with the IKS API and executes size changes decided by a scaling loop.
//! Node groups are selected either statically (`min:max:name` specs) or
//! by role-based auto discovery (`ixCloud:role=...` specs); the two
//! modes are mutually exclusive.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod gateway;
pub mod group;
pub mod identity;
pub mod noderef;
pub mod registry;

pub use config::{load_cloud_config, CloudConfig, NodeGroupSpec};
pub use discovery::DiscoveryConfig;
pub use gateway::{FailureKind, GatewayError, IksApiClient, NodeGroupGateway};
pub use group::NodeGroup;
pub use noderef::NodeRef;
pub use registry::{NodeGroupRegistry, RegistryError, DISCOVERY_REFRESH_INTERVAL};
