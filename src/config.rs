//! Configuration
//!
//! Two inputs arrive from the outside: a YAML cloud configuration file
//! (API endpoint and credentials) and static node group specs in the
//! `min:max:name` form. Auto discovery specs have their own grammar in
//! [`crate::discovery`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_request_timeout_secs() -> u64 {
    30
}

/// Contents of the cloud configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the IKS API.
    pub api_url: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Static authorization token. A collaborator-held credential may
    /// replace it at runtime through the re-auth hook.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Name of the secret holding the credential, when not inline.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_namespace: Option<String>,

    /// Upper bound on any single remote call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Errors for configuration file I/O (separate from pure parsing errors).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read cloud config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse cloud config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Loads and parses the cloud configuration file from disk.
pub fn load_cloud_config(path: &Path) -> Result<CloudConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// A node group known ahead of time, declared as `min:max:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroupSpec {
    pub min_size: u32,
    pub max_size: u32,
    pub name: String,
}

/// Errors from parsing a static node group spec. Fatal at startup for
/// the spec in question.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpecParseError {
    #[error("invalid node group spec {0:?}: expected min:max:name")]
    Malformed(String),

    #[error("invalid size {1:?} in node group spec {0:?}")]
    BadSize(String, String),

    #[error("invalid bounds in node group spec {0:?}: min {1} greater than max {2}")]
    BadBounds(String, u32, u32),

    #[error("node group spec {0:?} has no name")]
    EmptyName(String),

    #[error("node group spec {0:?} has max size 0: groups without a maximum are not autoscalable")]
    ZeroMax(String),
}

/// Parses a `min:max:name` spec. Scale to zero is supported, so a
/// minimum of 0 is accepted; a maximum of 0 is not.
pub fn parse_node_group_spec(spec: &str) -> Result<NodeGroupSpec, SpecParseError> {
    let mut parts = spec.splitn(3, ':');
    let (min, max, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(min), Some(max), Some(name)) => (min, max, name),
        _ => return Err(SpecParseError::Malformed(spec.to_string())),
    };

    let min_size: u32 = min
        .parse()
        .map_err(|_| SpecParseError::BadSize(spec.to_string(), min.to_string()))?;
    let max_size: u32 = max
        .parse()
        .map_err(|_| SpecParseError::BadSize(spec.to_string(), max.to_string()))?;

    if name.is_empty() {
        return Err(SpecParseError::EmptyName(spec.to_string()));
    }
    if max_size == 0 {
        return Err(SpecParseError::ZeroMax(spec.to_string()));
    }
    if min_size > max_size {
        return Err(SpecParseError::BadBounds(
            spec.to_string(),
            min_size,
            max_size,
        ));
    }

    Ok(NodeGroupSpec {
        min_size,
        max_size,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_cloud_config() {
        let content = r#"
api_url: https://iks.example.com/api
region: kr-central-1
token: secret-token
"#;
        let file = create_temp_file(content);
        let config = load_cloud_config(file.path()).unwrap();

        assert_eq!(config.api_url, "https://iks.example.com/api");
        assert_eq!(config.region.as_deref(), Some("kr-central-1"));
        assert_eq!(config.token.as_deref(), Some("secret-token"));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_cloud_config_custom_timeout() {
        let content = "api_url: https://iks.example.com\nrequest_timeout_secs: 5\n";
        let file = create_temp_file(content);
        let config = load_cloud_config(file.path()).unwrap();
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = load_cloud_config(Path::new("/nonexistent/cloud.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_malformed_config() {
        let file = create_temp_file("not: [valid");
        let result = load_cloud_config(file.path());
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_parse_node_group_spec() {
        let spec = parse_node_group_spec("1:5:workers").unwrap();
        assert_eq!(
            spec,
            NodeGroupSpec {
                min_size: 1,
                max_size: 5,
                name: "workers".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_spec_scale_to_zero() {
        let spec = parse_node_group_spec("0:3:gpu").unwrap();
        assert_eq!(spec.min_size, 0);
    }

    #[test]
    fn test_parse_spec_missing_fields() {
        assert!(matches!(
            parse_node_group_spec("1:5"),
            Err(SpecParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_node_group_spec("workers"),
            Err(SpecParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_spec_bad_sizes() {
        assert!(matches!(
            parse_node_group_spec("a:5:workers"),
            Err(SpecParseError::BadSize(_, _))
        ));
        assert!(matches!(
            parse_node_group_spec("1:b:workers"),
            Err(SpecParseError::BadSize(_, _))
        ));
    }

    #[test]
    fn test_parse_spec_min_above_max() {
        assert!(matches!(
            parse_node_group_spec("6:5:workers"),
            Err(SpecParseError::BadBounds(_, 6, 5))
        ));
    }

    #[test]
    fn test_parse_spec_zero_max_rejected() {
        assert!(matches!(
            parse_node_group_spec("0:0:workers"),
            Err(SpecParseError::ZeroMax(_))
        ));
    }

    #[test]
    fn test_parse_spec_empty_name() {
        assert!(matches!(
            parse_node_group_spec("1:5:"),
            Err(SpecParseError::EmptyName(_))
        ));
    }
}
