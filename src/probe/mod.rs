//! Health Prober
//!
//! Verifies that a candidate endpoint is alive and on the right network. One
//! probe is one liveness + network-identity round trip raced against the
//! probe budget. Every failure mode (timeout, refused connection, malformed
//! payload, zero height, wrong network) collapses into `reachable = false`;
//! nothing propagates past this boundary.
//!
//! Probes fan out in fixed-size batches: a batch runs concurrently, the stage
//! blocks until the whole batch finishes before the next starts.

pub mod score;

use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::chain::ChainProfile;
use crate::rpc::{batch_result, CallOutcome, RpcClient, RpcRequest, RpcResponse};
use crate::types::{Candidate, ProbeResult, SourceKind};

const LIVENESS_ID: u64 = 1;
const NETWORK_ID_ID: u64 = 2;

/// Probes candidates for liveness and network identity
pub struct HealthProber {
    rpc: RpcClient,
    profile: ChainProfile,
    expected_network_id: u64,
    timeout: Duration,
    batch_size: usize,
}

impl HealthProber {
    pub fn new(
        rpc: RpcClient,
        profile: ChainProfile,
        expected_network_id: u64,
        timeout: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            rpc,
            profile,
            expected_network_id,
            timeout,
            batch_size: batch_size.max(1),
        }
    }

    /// Probe one endpoint. Always returns a result, never an error.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let mut requests = vec![RpcRequest::new(
            LIVENESS_ID,
            self.profile.liveness_method(),
            json!([]),
        )];
        if let Some(method) = self.profile.network_id_method() {
            requests.push(RpcRequest::new(NETWORK_ID_ID, method, json!([])));
        }

        let start = Instant::now();

        // Single-method profiles use a plain request; some servers reject
        // one-element batch arrays
        let responses = if requests.len() == 1 {
            let RpcRequest { method, params, .. } = requests.remove(0);
            match self.rpc.call(url, &method, params, self.timeout).await {
                CallOutcome::Ok(response) => vec![response],
                _ => return ProbeResult::unreachable(),
            }
        } else {
            match self.rpc.call_batch(url, &requests, self.timeout).await {
                CallOutcome::Ok(responses) => responses,
                _ => return ProbeResult::unreachable(),
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        self.evaluate(&responses, latency_ms)
    }

    /// Apply the reachability rule to a decoded probe response.
    ///
    /// Reachable only if liveness decoded and non-zero (a node at height 0 is
    /// not yet synced) and, for profiles with an identity method, the
    /// reported network id equals the expected one.
    fn evaluate(&self, responses: &[RpcResponse], latency_ms: u64) -> ProbeResult {
        let liveness = batch_result(responses, LIVENESS_ID)
            .and_then(|v| self.profile.decode_liveness(v));

        let network_id = if self.profile.network_id_method().is_some() {
            batch_result(responses, NETWORK_ID_ID).and_then(|v| self.profile.decode_network_id(v))
        } else {
            None
        };

        let live = matches!(liveness, Some(height) if height > 0);
        let right_network = match self.profile.network_id_method() {
            Some(_) => network_id == Some(self.expected_network_id),
            None => true,
        };

        ProbeResult {
            reachable: live && right_network,
            network_id,
            liveness,
            latency_ms: Some(latency_ms),
        }
    }

    /// Verify a candidate pool in batches, stopping once `cap` candidates
    /// passed. Returns verified candidates in discovery order.
    pub async fn verify_pool(&self, candidates: &[Candidate], cap: usize) -> Vec<Candidate> {
        let mut verified = Vec::new();

        for batch in candidates.chunks(self.batch_size) {
            if verified.len() >= cap {
                info!("Reached verification cap of {} candidates", cap);
                break;
            }

            let probes = batch.iter().map(|candidate| async move {
                let result = self.probe(&candidate.canonical_url).await;
                (candidate, result)
            });

            for (candidate, result) in join_all(probes).await {
                if result.reachable && verified.len() < cap {
                    debug!(
                        "✅ {} reachable (liveness={:?}, {}ms)",
                        candidate.canonical_url,
                        result.liveness,
                        result.latency_ms.unwrap_or(0)
                    );
                    verified.push(candidate.clone());
                }
            }
        }

        verified
    }

    /// Private-node path: derive candidate URLs from bare gossip IPs and
    /// keep at most the first reachable URL per IP.
    pub async fn probe_gossip_ips(&self, ips: &[String], cap: usize) -> Vec<Candidate> {
        let mut found = Vec::new();
        let mut resolved: HashSet<String> = HashSet::new();

        for batch in ips.chunks(self.batch_size) {
            if found.len() >= cap {
                break;
            }

            let probes = batch.iter().map(|ip| async move {
                // Ports probed concurrently; first reachable in port-list
                // order wins for this IP
                let urls = self.derived_urls(ip);
                let results = join_all(urls.iter().map(|url| self.probe(url))).await;

                urls.into_iter()
                    .zip(results)
                    .find(|(_, result)| result.reachable)
                    .map(|(url, _)| (ip.clone(), url))
            });

            for hit in join_all(probes).await.into_iter().flatten() {
                let (ip, url) = hit;
                if found.len() < cap && resolved.insert(ip) {
                    debug!("✅ Private node found at {}", url);
                    found.push(Candidate::new(url.clone(), url, SourceKind::GossipDerived));
                }
            }
        }

        if !found.is_empty() {
            info!("🔌 Gossip-derived path found {} private nodes", found.len());
        }

        found
    }

    /// Candidate URLs for one bare IP, one per conventional port
    fn derived_urls(&self, ip: &str) -> Vec<String> {
        self.profile
            .candidate_ports
            .iter()
            .map(|port| format!("http://{}:{}", ip, port))
            .collect()
    }
}
