//! Persisted candidate snapshot
//!
//! At the end of each run the verified endpoint set and the refreshed admin
//! seed list are written to one JSON file per network. The next run reads
//! the file as a fallback candidate pool when every seed fails, so a
//! transient seed outage does not empty the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::types::ScoredEndpoint;

const SNAPSHOT_VERSION: u32 = 1;

/// One endpoint retained across runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub url: String,

    /// Performance score from the run that produced the snapshot
    pub score: f64,
}

/// Per-network snapshot file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub network_id: u64,

    /// Verified endpoints, best score first
    pub nodes: Vec<SnapshotNode>,

    /// Verified endpoints that also answered a peer-list query; used as the
    /// next run's seed set
    #[serde(default)]
    pub admin_seeds: Vec<String>,
}

impl Snapshot {
    pub fn from_run(network_id: u64, verified: &[ScoredEndpoint], admin_seeds: Vec<String>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            network_id,
            nodes: verified
                .iter()
                .map(|endpoint| SnapshotNode {
                    url: endpoint.url.clone(),
                    score: endpoint.score,
                })
                .collect(),
            admin_seeds,
        }
    }
}

/// Reads and writes per-network snapshot files under one data directory
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, network: &str) -> PathBuf {
        self.dir.join(format!("valid-nodes-{}.json", network))
    }

    /// Load the snapshot for a network.
    ///
    /// A missing or unreadable file is not an error; the caller falls back
    /// to an empty pool.
    pub fn load(&self, network: &str) -> Option<Snapshot> {
        let path = self.path(network);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => {
                debug!("No snapshot at {:?}", path);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring corrupt snapshot {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write a network's snapshot, creating the data directory if needed
    pub fn store(&self, network: &str, snapshot: &Snapshot) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.path(network), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scored(url: &str, score: f64) -> ScoredEndpoint {
        ScoredEndpoint {
            url: url.to_string(),
            reliability: 1.0,
            avg_latency_ms: 100,
            score,
            last_liveness: None,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let verified = vec![scored("http://a:8545", 0.97), scored("http://b:8545", 0.5)];
        let snapshot = Snapshot::from_run(1, &verified, vec!["http://a:8545".to_string()]);
        store.store("eth", &snapshot).unwrap();

        let loaded = store.load("eth").unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.network_id, 1);
        assert_eq!(loaded.nodes.len(), 2);
        assert_eq!(loaded.nodes[0].url, "http://a:8545");
        assert_eq!(loaded.admin_seeds, vec!["http://a:8545"]);
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load("eth").is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_none() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        std::fs::write(store.path("eth"), "not json at all").unwrap();
        assert!(store.load("eth").is_none());
    }

    #[test]
    fn test_networks_use_separate_files() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let eth = Snapshot::from_run(1, &[scored("http://a:8545", 1.0)], vec![]);
        let bsc = Snapshot::from_run(56, &[scored("http://b:8545", 1.0)], vec![]);
        store.store("eth", &eth).unwrap();
        store.store("bsc", &bsc).unwrap();

        assert_eq!(store.load("eth").unwrap().network_id, 1);
        assert_eq!(store.load("bsc").unwrap().network_id, 56);
    }
}
