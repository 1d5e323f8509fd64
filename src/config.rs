//! Curator configuration
//!
//! One TOML file configures the whole process: global probing/batching knobs
//! plus one `[[networks]]` table per chain. Each network run is independent;
//! a broken network section fails that network only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chain::{ChainKind, ChainProfile};
use crate::types::WhitelistEntry;

/// Main configuration for the curator process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    // === Probing ===

    /// Budget for a single verification probe (milliseconds)
    pub probe_timeout_ms: u64,

    /// Sequential probe attempts per candidate when scoring
    pub score_retries: u32,

    /// Delay between scoring probes against the same host (milliseconds)
    pub inter_probe_delay_ms: u64,

    // === Batching ===

    /// Probes issued concurrently; the pipeline blocks on a whole batch
    /// before starting the next, bounding peak outbound connections
    pub batch_size: usize,

    /// Cap on verified candidates per run
    pub max_verified: usize,

    // === Scheduling ===

    /// Seconds between reconciliation passes
    pub run_interval_secs: u64,

    // === Persistence ===

    /// Directory holding per-network snapshot files
    pub data_dir: PathBuf,

    // === Networks ===

    /// One entry per curated network
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

/// Per-network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Short name used in logs and snapshot filenames, e.g. "eth"
    pub name: String,

    /// Expected network identity (chain id for EVM networks)
    pub network_id: u64,

    /// Chain family, selects the RPC method set
    pub chain_kind: ChainKind,

    /// Base URL of the routing proxy's admin interface
    pub proxy_url: String,

    /// Admin action prefix, e.g. "evm" or "solana"
    pub action_prefix: String,

    /// Known-good endpoints queried for their peer lists
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Optional public endpoint directory consulted alongside the seeds
    #[serde(default)]
    pub directory_url: Option<String>,

    /// Endpoints exempt from removal regardless of health
    #[serde(default)]
    pub whitelist: Vec<WhitelistEntry>,

    /// Override for the chain's default RPC port
    #[serde(default)]
    pub canonical_port: Option<u16>,

    /// Override for the gossip-derived candidate port list
    #[serde(default)]
    pub candidate_ports: Option<Vec<u16>>,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            score_retries: 3,
            inter_probe_delay_ms: 1000,
            batch_size: 100,
            max_verified: 60,
            run_interval_secs: 120,
            data_dir: PathBuf::from("./data"),
            networks: vec![],
        }
    }
}

impl CuratorConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    // Builder-style methods for CLI overrides

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn with_run_interval(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.run_interval_secs = secs;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.probe_timeout_ms == 0 {
            anyhow::bail!("probe_timeout_ms must be non-zero");
        }

        if self.score_retries == 0 {
            anyhow::bail!("score_retries must be at least 1");
        }

        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }

        if self.networks.is_empty() {
            anyhow::bail!("no [[networks]] configured");
        }

        // Per-network validation happens when each network's run loop
        // starts; a broken section fails that network only
        Ok(())
    }
}

impl NetworkConfig {
    /// Chain profile with per-network port overrides applied
    pub fn profile(&self) -> ChainProfile {
        let mut profile = ChainProfile::for_kind(self.chain_kind);
        if let Some(port) = self.canonical_port {
            profile.canonical_port = port;
        }
        if let Some(ports) = &self.candidate_ports {
            profile.candidate_ports = ports.clone();
        }
        profile
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("network name must not be empty");
        }

        if self.proxy_url.is_empty() {
            anyhow::bail!("network '{}': proxy_url must not be empty", self.name);
        }

        if self.action_prefix.is_empty() {
            anyhow::bail!("network '{}': action_prefix must not be empty", self.name);
        }

        if let Some(ports) = &self.candidate_ports {
            if ports.is_empty() {
                anyhow::bail!("network '{}': candidate_ports must not be empty", self.name);
            }
        }

        Ok(())
    }
}
