//! Node group auto discovery specs
//!
//! A spec given via `--node-group-auto-discovery` selects which remote
//! node groups the reconciler manages. The format is:
//!
//! ```text
//! ixCloud:role=<role>[,<role2>]
//! ```

use thiserror::Error;

/// Discoverer token recognized in auto discovery specs.
pub const AUTO_DISCOVERER_IXCLOUD: &str = "ixCloud";

const DISCOVERY_KEY_ROLE: &str = "role";

/// A parsed auto discovery filter. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Roles a node group may carry to be discovered. Non-empty, each
    /// entry non-empty.
    pub roles: Vec<String>,
}

impl DiscoveryConfig {
    /// True iff a group with this role is selected by the filter.
    pub fn matches_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Errors from parsing an auto discovery spec, echoing the offending
/// token. Fatal at startup for the spec in question.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiscoveryParseError {
    #[error("invalid node group auto discovery spec {0:?}: expected <discoverer>:<key>=<value>")]
    Malformed(String),

    #[error("unsupported discoverer {0:?}: the only supported discoverer is \"ixCloud\"")]
    UnsupportedDiscoverer(String),

    #[error("unsupported key {0:?} for discoverer \"ixCloud\": the only supported key is \"role\"")]
    UnsupportedKey(String),

    #[error("role value not supplied in spec {0:?}")]
    EmptyValue(String),

    #[error("invalid role in spec {0:?}: roles must not be empty")]
    EmptyRole(String),
}

/// Parses a single auto discovery spec.
pub fn parse_discovery_spec(spec: &str) -> Result<DiscoveryConfig, DiscoveryParseError> {
    let tokens: Vec<&str> = spec.split(':').collect();
    let [discoverer, param] = tokens[..] else {
        return Err(DiscoveryParseError::Malformed(spec.to_string()));
    };

    if discoverer != AUTO_DISCOVERER_IXCLOUD {
        return Err(DiscoveryParseError::UnsupportedDiscoverer(
            discoverer.to_string(),
        ));
    }

    let kv: Vec<&str> = param.split('=').collect();
    let [key, value] = kv[..] else {
        return Err(DiscoveryParseError::Malformed(spec.to_string()));
    };

    if key != DISCOVERY_KEY_ROLE {
        return Err(DiscoveryParseError::UnsupportedKey(key.to_string()));
    }
    if value.is_empty() {
        return Err(DiscoveryParseError::EmptyValue(spec.to_string()));
    }

    // Multiple roles may be supplied in one spec, comma separated.
    let roles: Vec<String> = value.split(',').map(str::to_string).collect();
    if roles.iter().any(String::is_empty) {
        return Err(DiscoveryParseError::EmptyRole(spec.to_string()));
    }

    Ok(DiscoveryConfig { roles })
}

/// Parses every supplied spec, accumulating the results. The first
/// malformed spec aborts parsing.
pub fn parse_discovery_specs(specs: &[String]) -> Result<Vec<DiscoveryConfig>, DiscoveryParseError> {
    specs.iter().map(|s| parse_discovery_spec(s)).collect()
}
