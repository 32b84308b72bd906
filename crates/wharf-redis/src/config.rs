//! Redis plugin configuration types

use redis::IntoConnectionInfo;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::RedisPluginError;

/// Default single-node endpoint
pub const DEFAULT_URL: &str = "redis://127.0.0.1:6379/0";
/// Default cluster discovery seed
pub const DEFAULT_ROOT_NODE: &str = "redis://127.0.0.1:6379";
/// Default connect attempts under the `retry` startup failure policy
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

// Helper functions for serde defaults
fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_root_nodes() -> Vec<String> {
    vec![DEFAULT_ROOT_NODE.to_string()]
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

// Helper functions for schemars examples
fn example_url() -> &'static str {
    "redis://:secret@cache.internal:6379/0"
}

/// Topology variant selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RedisMode {
    /// One connection to a single node
    Client,
    /// Cluster connection with topology discovery from seed nodes
    Cluster,
}

impl Default for RedisMode {
    fn default() -> Self {
        RedisMode::Client
    }
}

/// What the manager does when the startup connect fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StartupFailurePolicy {
    /// Log the failure once and keep running with no primary handle
    ContinueUnset,
    /// Propagate the failure so host startup aborts
    Abort,
    /// Retry the connect up to `retry_attempts` times, then continue unset
    Retry,
}

impl Default for StartupFailurePolicy {
    fn default() -> Self {
        StartupFailurePolicy::ContinueUnset
    }
}

/// Input configuration for the Redis plugin
/// This is what users provide; [`RedisConfig`] is the validated form the
/// manager actually runs with.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[schemars(
    title = "Redis Plugin Configuration",
    description = "Managed Redis connection (single node or cluster)"
)]
pub struct RedisInputConfig {
    /// Topology: a single node ("client") or a discovered cluster
    #[serde(default)]
    pub mode: RedisMode,

    /// Single-node endpoint,
    /// `redis[s]://[[username][:password]@][host][:port][/db-number]`
    /// (mode=client)
    #[serde(default)]
    #[schemars(example = "example_url")]
    pub url: Option<String>,

    /// Root nodes that are part of the cluster, used in order to discover
    /// the cluster topology (mode=cluster)
    #[serde(default)]
    pub root_nodes: Option<Vec<String>>,

    /// Distribute load by executing readonly commands (such as GET,
    /// GEOSEARCH, etc.) across all cluster nodes instead of masters only
    /// (mode=cluster)
    #[serde(default)]
    pub use_replicas: Option<bool>,

    /// Fail commands immediately while the connection is down instead of
    /// letting the driver retry them
    #[serde(default)]
    pub disable_offline_queue: bool,

    /// Connect in READONLY mode
    #[serde(default)]
    pub readonly: bool,

    /// What to do when the startup connect fails
    #[serde(default)]
    pub on_startup_failure: StartupFailurePolicy,

    /// Connect attempts when `on_startup_failure` is `retry`
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for RedisInputConfig {
    fn default() -> Self {
        Self {
            mode: RedisMode::default(),
            url: None,
            root_nodes: None,
            use_replicas: None,
            disable_offline_queue: false,
            readonly: false,
            on_startup_failure: StartupFailurePolicy::default(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

/// Topology variant with its validated payload
///
/// Exactly one variant is active; fields belonging to the other variant
/// are rejected during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RedisTopology {
    /// One connection endpoint
    Client { url: String },
    /// Bootstrap endpoints used to discover the cluster topology, in order
    Cluster {
        root_nodes: Vec<String>,
        use_replicas: bool,
    },
}

/// Validated configuration the connection manager runs with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(flatten)]
    pub topology: RedisTopology,

    /// Fail commands fast while disconnected
    pub disable_offline_queue: bool,

    /// Open the connection in READONLY mode
    pub readonly: bool,

    /// Startup failure policy
    pub on_startup_failure: StartupFailurePolicy,

    /// Connect attempts under the `retry` policy
    pub retry_attempts: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            topology: RedisTopology::Client {
                url: default_url(),
            },
            disable_offline_queue: false,
            readonly: false,
            on_startup_failure: StartupFailurePolicy::default(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl TryFrom<RedisInputConfig> for RedisConfig {
    type Error = RedisPluginError;

    fn try_from(input: RedisInputConfig) -> Result<Self, Self::Error> {
        let topology = match input.mode {
            RedisMode::Client => {
                if input.root_nodes.is_some() || input.use_replicas.is_some() {
                    return Err(RedisPluginError::Config {
                        details: "root_nodes and use_replicas only apply to cluster mode"
                            .to_string(),
                    });
                }
                let url = input.url.unwrap_or_else(default_url);
                validate_endpoint(&url)?;
                RedisTopology::Client { url }
            }
            RedisMode::Cluster => {
                if input.url.is_some() {
                    return Err(RedisPluginError::Config {
                        details: "url only applies to client mode".to_string(),
                    });
                }
                let root_nodes = input.root_nodes.unwrap_or_else(default_root_nodes);
                if root_nodes.is_empty() {
                    return Err(RedisPluginError::Config {
                        details: "cluster mode requires at least one root node".to_string(),
                    });
                }
                for node in &root_nodes {
                    validate_endpoint(node)?;
                }
                RedisTopology::Cluster {
                    root_nodes,
                    use_replicas: input.use_replicas.unwrap_or(false),
                }
            }
        };

        Ok(Self {
            topology,
            disable_offline_queue: input.disable_offline_queue,
            readonly: input.readonly,
            on_startup_failure: input.on_startup_failure,
            retry_attempts: input.retry_attempts,
        })
    }
}

/// Check that an endpoint parses under the driver's URL grammar
fn validate_endpoint(url: &str) -> Result<(), RedisPluginError> {
    url.into_connection_info()
        .map(|_| ())
        .map_err(|e| RedisPluginError::Config {
            details: format!("invalid Redis endpoint '{}': {}", url, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_config_defaults() {
        let input: RedisInputConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(input.mode, RedisMode::Client);
        assert!(input.url.is_none());
        assert!(input.root_nodes.is_none());
        assert!(input.use_replicas.is_none());
        assert!(!input.disable_offline_queue);
        assert!(!input.readonly);
        assert_eq!(input.on_startup_failure, StartupFailurePolicy::ContinueUnset);
        assert_eq!(input.retry_attempts, 3);
    }

    #[test]
    fn test_client_defaults_resolve_to_default_url() {
        let input: RedisInputConfig = serde_json::from_str("{}").unwrap();
        let config = RedisConfig::try_from(input).unwrap();

        assert_eq!(
            config.topology,
            RedisTopology::Client {
                url: "redis://127.0.0.1:6379/0".to_string()
            }
        );
    }

    #[test]
    fn test_cluster_defaults_resolve_to_default_root_node() {
        let input: RedisInputConfig = serde_json::from_str(r#"{"mode": "cluster"}"#).unwrap();
        let config = RedisConfig::try_from(input).unwrap();

        assert_eq!(
            config.topology,
            RedisTopology::Cluster {
                root_nodes: vec!["redis://127.0.0.1:6379".to_string()],
                use_replicas: false,
            }
        );
    }

    #[test]
    fn test_cluster_preserves_root_node_order() {
        let input: RedisInputConfig = serde_json::from_str(
            r#"{
                "mode": "cluster",
                "root_nodes": ["redis://c:6379", "redis://a:6379", "redis://b:6379"],
                "use_replicas": true
            }"#,
        )
        .unwrap();
        let config = RedisConfig::try_from(input).unwrap();

        match config.topology {
            RedisTopology::Cluster {
                root_nodes,
                use_replicas,
            } => {
                assert_eq!(root_nodes, vec!["redis://c:6379", "redis://a:6379", "redis://b:6379"]);
                assert!(use_replicas);
            }
            other => panic!("expected cluster topology, got {:?}", other),
        }
    }

    #[test]
    fn test_cluster_fields_rejected_in_client_mode() {
        let input: RedisInputConfig = serde_json::from_str(
            r#"{"mode": "client", "root_nodes": ["redis://a:6379"]}"#,
        )
        .unwrap();

        let result = RedisConfig::try_from(input);
        assert!(matches!(result, Err(RedisPluginError::Config { .. })));
    }

    #[test]
    fn test_url_rejected_in_cluster_mode() {
        let input: RedisInputConfig =
            serde_json::from_str(r#"{"mode": "cluster", "url": "redis://a:6379"}"#).unwrap();

        let result = RedisConfig::try_from(input);
        assert!(matches!(result, Err(RedisPluginError::Config { .. })));
    }

    #[test]
    fn test_empty_root_nodes_rejected() {
        let input: RedisInputConfig =
            serde_json::from_str(r#"{"mode": "cluster", "root_nodes": []}"#).unwrap();

        let result = RedisConfig::try_from(input);
        assert!(matches!(result, Err(RedisPluginError::Config { .. })));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let input: RedisInputConfig =
            serde_json::from_str(r#"{"url": "not a redis url"}"#).unwrap();

        let result = RedisConfig::try_from(input);
        assert!(matches!(result, Err(RedisPluginError::Config { .. })));
    }

    #[test]
    fn test_startup_failure_policy_parsing() {
        let input: RedisInputConfig =
            serde_json::from_str(r#"{"on_startup_failure": "abort"}"#).unwrap();
        assert_eq!(input.on_startup_failure, StartupFailurePolicy::Abort);

        let input: RedisInputConfig = serde_json::from_str(
            r#"{"on_startup_failure": "retry", "retry_attempts": 5}"#,
        )
        .unwrap();
        assert_eq!(input.on_startup_failure, StartupFailurePolicy::Retry);
        assert_eq!(input.retry_attempts, 5);
    }

    #[test]
    fn test_shared_flags_carried_into_config() {
        let input: RedisInputConfig = serde_json::from_str(
            r#"{"disable_offline_queue": true, "readonly": true}"#,
        )
        .unwrap();
        let config = RedisConfig::try_from(input).unwrap();

        assert!(config.disable_offline_queue);
        assert!(config.readonly);
    }

    #[test]
    fn test_internal_config_round_trips_with_mode_tag() {
        let config = RedisConfig {
            topology: RedisTopology::Cluster {
                root_nodes: vec!["redis://a:6379".to_string(), "redis://b:6379".to_string()],
                use_replicas: true,
            },
            ..Default::default()
        };

        let serialized = serde_json::to_string(&config).unwrap();
        assert!(serialized.contains(r#""mode":"cluster""#));

        let deserialized: RedisConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.topology, config.topology);
    }
}
