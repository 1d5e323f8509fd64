//! One reconciliation pass for one network
//!
//! Stage order: collect → normalize/dedupe → verify → gossip-derived verify
//! → score → reconcile → apply → persist snapshot. Stages hand each other
//! plain in-memory sequences; nothing is shared mutably across concurrent
//! tasks. The pass is stateless across runs except for the snapshot
//! fallback, and always ends with a summary even under partial failure.

use std::time::Duration;
use tracing::{info, warn};

use crate::config::{CuratorConfig, NetworkConfig};
use crate::discovery::normalize::dedupe_by_host;
use crate::discovery::PeerDiscovery;
use crate::probe::score::PerformanceScorer;
use crate::probe::HealthProber;
use crate::reconcile;
use crate::registry::NodeRegistry;
use crate::rpc::RpcClient;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::types::{Candidate, RunSummary, SourceKind};

/// Drives one network's discovery → verification → reconciliation pass
pub struct Pipeline<'a> {
    config: &'a CuratorConfig,
    network: &'a NetworkConfig,
    store: &'a SnapshotStore,
    rpc: RpcClient,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a CuratorConfig,
        network: &'a NetworkConfig,
        store: &'a SnapshotStore,
        rpc: RpcClient,
    ) -> Self {
        Self {
            config,
            network,
            store,
            rpc,
        }
    }

    /// Execute one full pass against the given registry
    pub async fn run(&self, registry: &dyn NodeRegistry) -> RunSummary {
        let profile = self.network.profile();
        let timeout = Duration::from_millis(self.config.probe_timeout_ms);

        let discovery = PeerDiscovery::new(self.rpc.clone(), profile.clone(), timeout);
        let prober = HealthProber::new(
            self.rpc.clone(),
            profile.clone(),
            self.network.network_id,
            timeout,
            self.config.batch_size,
        );

        // --- Collect -------------------------------------------------------
        let previous = self.store.load(&self.network.name);
        let seeds = self.seed_set(previous.as_ref());
        let records = discovery.collect_peer_records(&seeds).await;

        let mut candidates = discovery.candidates_from_records(&records);

        if let Some(directory_url) = &self.network.directory_url {
            let listed = discovery.collect_directory(directory_url).await;
            let directory_candidates =
                discovery.candidates_from_addresses(&listed, SourceKind::DirectoryListed);
            merge_candidates(&mut candidates, directory_candidates, profile.canonical_port);
        }

        if candidates.is_empty() {
            if let Some(snapshot) = &previous {
                info!(
                    "All seeds failed for {}; falling back to snapshot of {}",
                    self.network.name, snapshot.generated_at
                );
                let urls: Vec<String> = snapshot.nodes.iter().map(|n| n.url.clone()).collect();
                candidates = discovery.candidates_from_addresses(&urls, SourceKind::GossipPeer);
            }
        }

        if candidates.is_empty() && records.is_empty() {
            warn!(
                "No candidates for {} and no snapshot to fall back on; skipping reconciliation",
                self.network.name
            );
            return RunSummary::default();
        }

        let discovered = candidates.len();

        // --- Verify --------------------------------------------------------
        let mut verified = prober
            .verify_pool(&candidates, self.config.max_verified)
            .await;

        // Private nodes only reachable through derived URLs
        let remaining = self.config.max_verified.saturating_sub(verified.len());
        if remaining > 0 {
            let ips = discovery.gossip_ips(&records);
            let derived = prober.probe_gossip_ips(&ips, remaining).await;
            merge_candidates(&mut verified, derived, profile.canonical_port);
        }

        info!(
            "🔬 {}: {} of {} candidates verified",
            self.network.name,
            verified.len(),
            discovered
        );

        // --- Score ---------------------------------------------------------
        let scorer = PerformanceScorer::new(
            &prober,
            self.config.score_retries,
            Duration::from_millis(self.config.inter_probe_delay_ms),
            self.config.probe_timeout_ms,
            self.config.batch_size,
        );
        let scored = scorer.score_all(&verified).await;

        // --- Reconcile -----------------------------------------------------
        let (added, removed, failed) = match registry.snapshot().await {
            Ok(registry_entries) => {
                let plan = reconcile::reconcile(&scored, &registry_entries, &self.network.whitelist);
                let stats = reconcile::apply(&plan, registry).await;
                (stats.added, stats.removed, stats.failed)
            }
            Err(e) => {
                warn!(
                    "Registry snapshot unavailable for {}: {}; skipping mutations",
                    self.network.name, e
                );
                (0, 0, 0)
            }
        };

        // --- Persist -------------------------------------------------------
        // A run that verified nothing keeps the previous snapshot: overwriting
        // it with an empty node list would erase the fallback pool
        if scored.is_empty() {
            info!(
                "Nothing verified for {}; keeping previous snapshot",
                self.network.name
            );
        } else {
            let verified_urls: Vec<String> = scored.iter().map(|s| s.url.clone()).collect();
            let admin_seeds = discovery
                .admin_capable(&verified_urls, self.config.batch_size)
                .await;
            let snapshot = Snapshot::from_run(self.network.network_id, &scored, admin_seeds);
            if let Err(e) = self.store.store(&self.network.name, &snapshot) {
                warn!("Failed to persist snapshot for {}: {}", self.network.name, e);
            }
        }

        let summary = RunSummary {
            discovered,
            verified: scored.len(),
            added,
            removed,
            failed,
        };
        info!(
            "📊 {}: discovered={}, verified={}, added={}, removed={}, failed={}",
            self.network.name,
            summary.discovered,
            summary.verified,
            summary.added,
            summary.removed,
            summary.failed
        );
        summary
    }

    /// Seeds for this run: the previous run's peer-list-capable endpoints
    /// when available, the configured seed list otherwise
    fn seed_set(&self, previous: Option<&Snapshot>) -> Vec<String> {
        if let Some(snapshot) = previous {
            if !snapshot.admin_seeds.is_empty() {
                return snapshot.admin_seeds.clone();
            }
        }
        self.network.seeds.clone()
    }
}

/// Merge `extra` into `base`, keeping at most one candidate per host IP
fn merge_candidates(base: &mut Vec<Candidate>, extra: Vec<Candidate>, canonical_port: u16) {
    base.extend(extra);

    let urls: Vec<String> = base.iter().map(|c| c.canonical_url.clone()).collect();
    let kept: std::collections::HashSet<String> =
        dedupe_by_host(&urls, canonical_port).into_iter().collect();

    let mut seen = std::collections::HashSet::new();
    base.retain(|candidate| {
        kept.contains(&candidate.canonical_url) && seen.insert(candidate.canonical_url.clone())
    });
}
