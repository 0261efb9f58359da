//! Node group display name derivation

/// Derives a stable display name for a node group.
///
/// IKS raw names are not unique within a cluster, so the first segment of
/// the remote id (the part before the first `-`) is appended. Two groups
/// sharing a raw name and the same first id segment would still collide;
/// that is an accepted limitation of the scheme.
pub fn unique_name(raw_name: &str, remote_id: &str) -> String {
    let segment = remote_id.split('-').next().unwrap_or(remote_id);
    format!("{raw_name}-{segment}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_uses_first_id_segment() {
        assert_eq!(
            unique_name("workers", "8f14e45f-ab01-4c2d-9ef0-123456789abc"),
            "workers-8f14e45f"
        );
    }

    #[test]
    fn test_unique_name_without_separator_uses_whole_id() {
        assert_eq!(unique_name("workers", "plainid"), "workers-plainid");
    }

    #[test]
    fn test_unique_name_is_deterministic() {
        let a = unique_name("gpu", "aa-bb");
        let b = unique_name("gpu", "aa-bb");
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_raw_name_different_ids_diverge() {
        let a = unique_name("workers", "aaaa-1");
        let b = unique_name("workers", "bbbb-1");
        assert_ne!(a, b);
    }
}
