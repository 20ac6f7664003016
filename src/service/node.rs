//! Snowflake node id resolution.
//!
//! Order of precedence:
//! 1. explicit configuration (`snowflake.node_id`)
//! 2. the `IDBUILDER_NODE_ID` environment variable
//! 3. a hash of `POD_NAME`, `HOSTNAME` or the process id, masked to 10 bits
//!
//! Derived ids are not guaranteed unique across instances; multi-instance
//! deployments should set one explicitly.

use tracing::{info, warn};

use crate::error::{IdError, Result};
use crate::service::snowflake::MAX_NODE_ID;

/// Environment variable holding an explicit node id.
pub const NODE_ID_ENV: &str = "IDBUILDER_NODE_ID";

const SEED_ENVS: [&str; 2] = ["POD_NAME", "HOSTNAME"];

/// Resolve the node id from configuration and the process environment.
///
/// # Errors
///
/// Returns [`IdError::Configuration`] when an explicit value is out of range
/// or not an integer.
pub fn resolve_node_id(configured: Option<i64>) -> Result<i64> {
    resolve_node_id_with(configured, |key| std::env::var(key).ok())
}

/// Resolve the node id with a custom environment lookup.
///
/// # Errors
///
/// See [`resolve_node_id`].
pub fn resolve_node_id_with<F>(configured: Option<i64>, env: F) -> Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(node_id) = configured {
        let node_id = check_range(node_id, "snowflake.node_id")?;
        info!(node_id, "Using configured node id");
        return Ok(node_id);
    }

    if let Some(raw) = env(NODE_ID_ENV).filter(|v| !v.trim().is_empty()) {
        let parsed = raw.trim().parse::<i64>().map_err(|_| {
            IdError::Configuration(format!("{NODE_ID_ENV} must be an integer, got '{raw}'"))
        })?;
        let node_id = check_range(parsed, NODE_ID_ENV)?;
        info!(node_id, "Using node id from {NODE_ID_ENV}");
        return Ok(node_id);
    }

    let seed = SEED_ENVS
        .iter()
        .find_map(|key| env(key).filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| format!("pid-{}", std::process::id()));
    let node_id = hash_to_node_id(seed.trim());
    warn!(
        node_id,
        seed = %seed.trim(),
        "No node id configured, derived one from the host; set {NODE_ID_ENV} for multi-instance deployments"
    );
    Ok(node_id)
}

fn check_range(node_id: i64, source: &str) -> Result<i64> {
    if (0..=MAX_NODE_ID).contains(&node_id) {
        Ok(node_id)
    } else {
        Err(IdError::Configuration(format!(
            "{source} must be in [0, {MAX_NODE_ID}], got {node_id}"
        )))
    }
}

/// FNV-1a over the seed, low 10 bits.
///
/// `DefaultHasher` output is not stable across Rust releases, and a node id
/// derived from a host name must survive a toolchain upgrade.
fn hash_to_node_id(seed: &str) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    const NODE_MASK: u64 = 0x3FF;

    let hash = seed.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    i64::try_from(hash & NODE_MASK).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_configured_wins() {
        let env = env_of(&[(NODE_ID_ENV, "7")]);
        assert_eq!(resolve_node_id_with(Some(3), env).unwrap(), 3);
    }

    #[test]
    fn test_configured_out_of_range() {
        let result = resolve_node_id_with(Some(1024), env_of(&[]));
        assert!(matches!(result, Err(IdError::Configuration(_))));
    }

    #[test]
    fn test_env_value() {
        let env = env_of(&[(NODE_ID_ENV, " 512 ")]);
        assert_eq!(resolve_node_id_with(None, env).unwrap(), 512);

        let env = env_of(&[(NODE_ID_ENV, "abc")]);
        assert!(resolve_node_id_with(None, env).is_err());

        let env = env_of(&[(NODE_ID_ENV, "-1")]);
        assert!(resolve_node_id_with(None, env).is_err());
    }

    #[test]
    fn test_derived_is_stable_and_in_range() {
        let env = env_of(&[("POD_NAME", "idbuilder-7c9f-abcde")]);
        let first = resolve_node_id_with(None, &env).unwrap();
        let second = resolve_node_id_with(None, &env).unwrap();
        assert_eq!(first, second);
        assert!((0..=MAX_NODE_ID).contains(&first));
        assert_eq!(first, hash_to_node_id("idbuilder-7c9f-abcde"));
    }

    #[test]
    fn test_hash_values_are_pinned() {
        assert_eq!(hash_to_node_id(""), 805);
        assert_eq!(hash_to_node_id("a"), 140);
        assert_eq!(hash_to_node_id("worker-1"), 1005);
    }

    #[test]
    fn test_pod_name_before_hostname() {
        let env = env_of(&[("POD_NAME", "pod-a"), ("HOSTNAME", "host-b")]);
        assert_eq!(
            resolve_node_id_with(None, env).unwrap(),
            hash_to_node_id("pod-a")
        );
    }
}
