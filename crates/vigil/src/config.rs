//! Configuration management for vigil.
//!
//! Loads settings from an explicit path, `$VIGIL_CONFIG`,
//! /etc/vigil/config.toml or the user config dir, or uses defaults.

use crate::connectivity::ConnectivityMode;
use crate::probes::DEFAULT_PROBE_ORDER;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use vigil_shared::{NodeRole, Result, VigilError};

/// System-wide config file path
pub const CONFIG_PATH: &str = "/etc/vigil/config.toml";

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "VIGIL_CONFIG";

/// Run-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Probes executing at the same time (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// External commands executing at the same time, across all probes
    #[serde(default = "default_max_concurrent_commands")]
    pub max_concurrent_commands: usize,

    /// Per-command timeout in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Stop scheduling new probes after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Per-resource deletion timeout in seconds
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup_timeout_secs: u64,

    /// Directory the report is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Also write `{report}.json`
    #[serde(default)]
    pub write_json: bool,

    /// Shell used to run command text
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_concurrency() -> usize {
    4
}

fn default_max_concurrent_commands() -> usize {
    6
}

fn default_command_timeout() -> u64 {
    60 // oc debug pods take a while to schedule
}

fn default_cleanup_timeout() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_concurrent_commands: default_max_concurrent_commands(),
            command_timeout_secs: default_command_timeout(),
            deadline_secs: None,
            cleanup_timeout_secs: default_cleanup_timeout(),
            output_dir: default_output_dir(),
            write_json: false,
            shell: default_shell(),
        }
    }
}

impl RunConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Where the node list comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Prints the cluster display name
    #[serde(default = "default_cluster_name_command")]
    pub cluster_name_command: String,

    /// Prints whitespace separated node names
    #[serde(default = "default_nodes_command")]
    pub nodes_command: String,

    /// Fixed node list; skips discovery commands when non-empty
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Cluster name used with a fixed node list
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// Explicit roles, overriding name based inference
    #[serde(default)]
    pub roles: HashMap<String, NodeRole>,
}

fn default_cluster_name_command() -> String {
    "oc get infrastructure cluster -o jsonpath='{.status.infrastructureName}'".to_string()
}

fn default_nodes_command() -> String {
    "oc get nodes -o jsonpath='{.items[*].metadata.name}'".to_string()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            cluster_name_command: default_cluster_name_command(),
            nodes_command: default_nodes_command(),
            nodes: Vec::new(),
            cluster_name: None,
            roles: HashMap::new(),
        }
    }
}

/// Probe selection and probe parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbesConfig {
    /// Probes to run; report order is always registration order
    #[serde(default = "default_enabled_probes")]
    pub enabled: Vec<String>,

    /// Interface whose MTU is read on every node
    #[serde(default = "default_mtu_interface")]
    pub mtu_interface: String,

    /// Expected MTU; mismatching nodes are reported as warnings
    #[serde(default)]
    pub expected_mtu: Option<u32>,

    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,

    #[serde(default = "default_sso_namespace")]
    pub sso_namespace: String,

    #[serde(default = "default_threescale_namespace")]
    pub threescale_namespace: String,
}

fn default_enabled_probes() -> Vec<String> {
    DEFAULT_PROBE_ORDER.iter().map(|s| s.to_string()).collect()
}

fn default_mtu_interface() -> String {
    "br-ex".to_string()
}

fn default_storage_namespace() -> String {
    "openshift-storage".to_string()
}

fn default_sso_namespace() -> String {
    "openshift-sso".to_string()
}

fn default_threescale_namespace() -> String {
    "3scale".to_string()
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_probes(),
            mtu_interface: default_mtu_interface(),
            expected_mtu: None,
            storage_namespace: default_storage_namespace(),
            sso_namespace: default_sso_namespace(),
            threescale_namespace: default_threescale_namespace(),
        }
    }
}

/// Connectivity matrix settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub mode: ConnectivityMode,

    /// Per-edge timeout in seconds
    #[serde(default = "default_edge_timeout")]
    pub timeout_secs: u64,

    /// Edges probed at the same time
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Log a cost warning above this many edges
    #[serde(default = "default_warn_above_edges")]
    pub warn_above_edges: usize,
}

fn default_edge_timeout() -> u64 {
    20
}

fn default_parallelism() -> usize {
    8
}

fn default_warn_above_edges() -> usize {
    100
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            mode: ConnectivityMode::default(),
            timeout_secs: default_edge_timeout(),
            parallelism: default_parallelism(),
            warn_above_edges: default_warn_above_edges(),
        }
    }
}

/// Node debug sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Run debug pods in a throwaway namespace deleted at the end of the run
    #[serde(default = "default_ephemeral_namespace")]
    pub ephemeral_namespace: bool,

    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,
}

fn default_ephemeral_namespace() -> bool {
    true
}

fn default_namespace_prefix() -> String {
    "vigil-debug".to_string()
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            ephemeral_namespace: default_ephemeral_namespace(),
            namespace_prefix: default_namespace_prefix(),
        }
    }
}

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub probes: ProbesConfig,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

impl Config {
    /// Load config from `explicit`, `$VIGIL_CONFIG`, the system path or
    /// the user config dir, in that order. Defaults when none exists.
    ///
    /// An explicitly named file that is missing is an error; a file that
    /// exists but does not parse is always an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from_path(Path::new(&path));
        }

        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
            debug!("No config at {}", path.display());
        }

        info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| VigilError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VigilError::Config(e.to_string()))
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("vigil").join("config.toml"));
        }
        paths
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.run.concurrency == 0 {
            return Err(VigilError::Config("run.concurrency must be at least 1".into()));
        }
        if self.run.max_concurrent_commands == 0 {
            return Err(VigilError::Config(
                "run.max_concurrent_commands must be at least 1".into(),
            ));
        }
        if self.run.command_timeout_secs == 0 {
            return Err(VigilError::Config("run.command_timeout_secs must be positive".into()));
        }
        if self.connectivity.parallelism == 0 {
            return Err(VigilError::Config(
                "connectivity.parallelism must be at least 1".into(),
            ));
        }
        if self.run.shell.trim().is_empty() {
            return Err(VigilError::Config("run.shell must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.run.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.probes.enabled.len(), DEFAULT_PROBE_ORDER.len());
        assert_eq!(config.probes.mtu_interface, "br-ex");
        assert_eq!(config.connectivity.mode, ConnectivityMode::AllPairs);
        assert!(config.debug.ephemeral_namespace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let toml_str = r#"
[run]
concurrency = 2
output_dir = "/var/tmp/reports"

[connectivity]
mode = "role-partitioned"

[inventory.roles]
"node-a" = "control-plane"
"#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.run.concurrency, 2);
        assert_eq!(config.run.max_concurrent_commands, 6);
        assert_eq!(config.run.output_dir, PathBuf::from("/var/tmp/reports"));
        assert_eq!(config.connectivity.mode, ConnectivityMode::RolePartitioned);
        assert_eq!(config.inventory.roles.get("node-a"), Some(&NodeRole::ControlPlane));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml("[run]\nconcurrency = 0\n").unwrap_err();
        assert!(matches!(err, VigilError::Config(_)));
        assert!(matches!(
            Config::from_toml("[run\n").unwrap_err(),
            VigilError::Toml(_)
        ));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let text = Config::default().to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.probes.enabled, Config::default().probes.enabled);
    }

    #[test]
    fn test_missing_explicit_path() {
        let err = Config::load(Some(Path::new("/nonexistent/vigil.toml"))).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
