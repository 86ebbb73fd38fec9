//! Configuration handling for the simulator.
//!
//! Settings come from three layers, later ones winning: built-in defaults
//! (the 4-node sample topology), an optional YAML topology file, and
//! environment variables. Command-line flags are applied on top by `main`.

use anyhow::{Context, Result};
use dv_node::NodeConfig;
use dv_topology::{Link, Topology};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default broadcast period
const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Default inbox capacity per node
const DEFAULT_INBOX_CAPACITY: usize = 100;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Nodes and link costs
    pub topology: Topology,
    /// Period of the unconditional vector broadcast
    pub broadcast_interval: Duration,
    /// Capacity of each node's inbox
    pub inbox_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            topology: Topology::sample(),
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

/// Topology file layout
#[derive(Debug, Serialize, Deserialize)]
struct TopologyFile {
    nodes: usize,
    #[serde(default)]
    links: Vec<Link>,
    broadcast_interval_ms: Option<u64>,
    inbox_capacity: Option<usize>,
}

impl SimConfig {
    /// Load configuration from an optional topology file and environment
    /// variables. A path that was given but cannot be read or parsed is an
    /// error; no path means the sample topology.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read topology file {:?}", path))?;
                let file: TopologyFile = serde_yaml::from_str(&content)
                    .with_context(|| format!("failed to parse topology file {:?}", path))?;
                config.apply_file(file)?;
                info!(component = "config", "Loaded topology from {:?}", path);
            }
            None => info!(
                component = "config",
                "No topology file given, using the built-in sample network"
            ),
        }

        config.apply_environment_overrides();

        info!(
            component = "config",
            "Final configuration: {} nodes, {} links, broadcast every {:?}, inbox capacity {}",
            config.topology.node_count(),
            config.topology.links().len(),
            config.broadcast_interval,
            config.inbox_capacity
        );

        Ok(config)
    }

    /// Runtime settings for the node actors
    pub fn node_config(&self, shutdown_grace: Duration) -> NodeConfig {
        NodeConfig {
            broadcast_interval: self.broadcast_interval,
            inbox_capacity: self.inbox_capacity,
            shutdown_grace,
        }
    }

    fn apply_file(&mut self, file: TopologyFile) -> Result<()> {
        self.topology = Topology::from_links(file.nodes, file.links).context("invalid topology")?;

        if let Some(ms) = file.broadcast_interval_ms {
            self.broadcast_interval = Duration::from_millis(ms);
        }
        if let Some(capacity) = file.inbox_capacity {
            self.inbox_capacity = capacity;
        }

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let broadcast_ms =
            lookup("DVSIM_BROADCAST_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok());
        if let Some(ms) = broadcast_ms {
            self.broadcast_interval = Duration::from_millis(ms);
            info!(
                component = "config",
                "Broadcast interval overridden by environment: {}ms",
                ms
            );
        }

        let capacity = lookup("DVSIM_INBOX_CAPACITY").and_then(|v| v.parse::<usize>().ok());
        if let Some(capacity) = capacity {
            self.inbox_capacity = capacity;
            info!(
                component = "config",
                "Inbox capacity overridden by environment: {}",
                capacity
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.topology, Topology::sample());
        assert_eq!(config.broadcast_interval, Duration::from_secs(1));
        assert_eq!(config.inbox_capacity, 100);

        let node_config = config.node_config(Duration::from_secs(3));
        assert_eq!(node_config.inbox_capacity, 100);
        assert_eq!(node_config.shutdown_grace, Duration::from_secs(3));
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
nodes: 3
broadcast_interval_ms: 250
links:
  - { a: 0, b: 1, cost: 4 }
  - { a: 1, b: 2, cost: 2 }
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = SimConfig::load(Some(temp_file.path())).unwrap();

        assert_eq!(config.topology.node_count(), 3);
        assert_eq!(config.topology.link_cost(0, 1), Some(4));
        assert_eq!(config.topology.link_cost(2, 1), Some(2));
        assert_eq!(config.topology.link_cost(0, 2), None);
        assert_eq!(config.broadcast_interval, Duration::from_millis(250));
        assert_eq!(config.inbox_capacity, 100);
    }

    #[test]
    fn test_invalid_topology_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"nodes: 2\nlinks:\n  - { a: 0, b: 5, cost: 1 }\n")
            .unwrap();
        assert!(SimConfig::load(Some(temp_file.path())).is_err());

        let mut garbage = NamedTempFile::new().unwrap();
        garbage.write_all(b"links: [1, 2").unwrap();
        assert!(SimConfig::load(Some(garbage.path())).is_err());

        assert!(SimConfig::load(Some(Path::new("/nonexistent/topology.yaml"))).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = SimConfig::default();
        config.apply_overrides(|key| match key {
            "DVSIM_BROADCAST_INTERVAL_MS" => Some("50".to_string()),
            "DVSIM_INBOX_CAPACITY" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(config.broadcast_interval, Duration::from_millis(50));
        assert_eq!(config.inbox_capacity, 100);
    }
}
