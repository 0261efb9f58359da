//! Node references
//!
//! A scale-down victim is either a provisioned machine or a placeholder
//! the decision loop synthesized for a node that does not (yet) exist in
//! the cluster. The distinction is resolved once at ingestion into a
//! tagged variant instead of being re-derived at each use site: a node
//! observed without a cluster-assigned uid is fake by definition, and its
//! provider id carries its group and ordinal index.

use std::fmt;

use thiserror::Error;

/// Prefix of synthesized provider ids: `fake:///<group>/<index>`.
pub const FAKE_PROVIDER_ID_PREFIX: &str = "fake:///";

/// Reference to a single worker node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// An actually provisioned machine.
    Real {
        name: String,
        system_uuid: String,
        provider_id: String,
    },
    /// A placeholder for a node in a transitional state, identified by
    /// its node group and ordinal position within it.
    Fake { group_id: String, index: String },
}

/// Errors from parsing node references.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RefParseError {
    #[error("could not parse fake node provider ID {0:?}")]
    MalformedFakeId(String),
}

impl NodeRef {
    /// Builds a reference to a provisioned machine.
    pub fn real(
        name: impl Into<String>,
        system_uuid: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self::Real {
            name: name.into(),
            system_uuid: system_uuid.into(),
            provider_id: provider_id.into(),
        }
    }

    /// Builds a placeholder reference.
    pub fn fake(group_id: impl Into<String>, index: impl Into<String>) -> Self {
        Self::Fake {
            group_id: group_id.into(),
            index: index.into(),
        }
    }

    /// Resolves an observed node into a reference.
    ///
    /// A node carrying no cluster-assigned uid was synthesized by the
    /// decision loop, so its provider id must be in the fake form.
    pub fn from_observed(
        name: &str,
        system_uuid: &str,
        provider_id: &str,
    ) -> Result<Self, RefParseError> {
        if system_uuid.is_empty() {
            Self::from_fake_provider_id(provider_id)
        } else {
            Ok(Self::real(name, system_uuid, provider_id))
        }
    }

    /// Parses a `fake:///<group>/<index>` provider id.
    ///
    /// Exactly the first two path segments after the prefix are
    /// significant; fewer than two is a parse error.
    pub fn from_fake_provider_id(id: &str) -> Result<Self, RefParseError> {
        let (group_id, index) = parse_fake_provider_id(id)?;
        Ok(Self::Fake { group_id, index })
    }

    /// True iff this reference carries no cluster-assigned identity.
    pub fn is_fake(&self) -> bool {
        matches!(self, Self::Fake { .. })
    }

    /// The identifier the resize call understands: the system uuid for a
    /// provisioned machine, the ordinal index for a placeholder.
    pub fn victim(&self) -> &str {
        match self {
            Self::Real { system_uuid, .. } => system_uuid,
            Self::Fake { index, .. } => index,
        }
    }

    /// Key under which a requested deletion is recorded.
    pub fn ledger_key(&self) -> String {
        match self {
            Self::Real { provider_id, .. } => provider_id.clone(),
            Self::Fake { .. } => self.to_string(),
        }
    }

    /// Provider id for real nodes; placeholders have none.
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Self::Real { provider_id, .. } => Some(provider_id),
            Self::Fake { .. } => None,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real { name, .. } => write!(f, "{name}"),
            Self::Fake { group_id, index } => {
                write!(f, "{FAKE_PROVIDER_ID_PREFIX}{group_id}/{index}")
            }
        }
    }
}

/// Splits a fake provider id into its node group id and ordinal index.
///
/// Only the segment count is validated; empty segments are preserved
/// as-is (an empty group id simply never matches a registered group).
pub fn parse_fake_provider_id(id: &str) -> Result<(String, String), RefParseError> {
    let rest = id
        .strip_prefix(FAKE_PROVIDER_ID_PREFIX)
        .ok_or_else(|| RefParseError::MalformedFakeId(id.to_string()))?;

    let mut parts = rest.split('/');
    match (parts.next(), parts.next()) {
        (Some(group), Some(index)) => Ok((group.to_string(), index.to_string())),
        _ => Err(RefParseError::MalformedFakeId(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fake_provider_id() {
        let (group, index) = parse_fake_provider_id("fake:///ng1/3").unwrap();
        assert_eq!(group, "ng1");
        assert_eq!(index, "3");
    }

    #[test]
    fn test_parse_fake_extra_segments_ignored() {
        let (group, index) = parse_fake_provider_id("fake:///ng1/3/extra").unwrap();
        assert_eq!(group, "ng1");
        assert_eq!(index, "3");
    }

    #[test]
    fn test_parse_fake_single_segment_fails() {
        assert!(parse_fake_provider_id("fake:///ng1").is_err());
        assert!(parse_fake_provider_id("fake:///").is_err());
    }

    #[test]
    fn test_parse_fake_missing_prefix_fails() {
        assert!(parse_fake_provider_id("bogus").is_err());
    }

    #[test]
    fn test_parse_fake_empty_segments_preserved() {
        assert_eq!(
            parse_fake_provider_id("fake:////3").unwrap(),
            (String::new(), "3".to_string())
        );
        assert_eq!(
            parse_fake_provider_id("fake:///ng1/").unwrap(),
            ("ng1".to_string(), String::new())
        );
    }

    #[test]
    fn test_from_observed_without_uid_is_fake() {
        let node = NodeRef::from_observed("ng1-2", "", "fake:///ng1/2").unwrap();
        assert!(node.is_fake());
        assert_eq!(node.victim(), "2");
    }

    #[test]
    fn test_from_observed_with_uid_is_real() {
        let node = NodeRef::from_observed("worker-a", "uuid-1", "openstack:///vm-1").unwrap();
        assert!(!node.is_fake());
        assert_eq!(node.victim(), "uuid-1");
        assert_eq!(node.provider_id(), Some("openstack:///vm-1"));
    }

    #[test]
    fn test_fake_ref_renders_back() {
        let node = NodeRef::fake("ng1", "3");
        assert_eq!(node.to_string(), "fake:///ng1/3");
        assert_eq!(node.ledger_key(), "fake:///ng1/3");
    }

    #[test]
    fn test_real_ledger_key_is_provider_id() {
        let node = NodeRef::real("worker-a", "uuid-1", "openstack:///vm-1");
        assert_eq!(node.ledger_key(), "openstack:///vm-1");
    }
}
