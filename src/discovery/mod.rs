//! Peer Discovery Collector
//!
//! Builds the raw candidate pool for one run. Seeds are queried for their
//! peer lists concurrently; a seed that errors or answers with nothing
//! contributes an empty set and never aborts the collection. An optional
//! public directory contributes additional candidates. The merged records are
//! normalized and deduplicated into at most one candidate per host IP.

pub mod normalize;

use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::chain::ChainProfile;
use crate::rpc::{CallOutcome, RpcClient};
use crate::types::{Candidate, SourceKind};

use normalize::{dedupe_by_host, normalize_address};

/// Collects candidate endpoints from seed peer lists and directories
pub struct PeerDiscovery {
    rpc: RpcClient,
    profile: ChainProfile,
    timeout: Duration,
}

impl PeerDiscovery {
    pub fn new(rpc: RpcClient, profile: ChainProfile, timeout: Duration) -> Self {
        Self {
            rpc,
            profile,
            timeout,
        }
    }

    /// Query every seed's peer list concurrently and merge the raw records.
    ///
    /// Failed seeds are logged at debug and contribute nothing.
    pub async fn collect_peer_records(&self, seeds: &[String]) -> Vec<Value> {
        let queries = seeds.iter().map(|seed| {
            let seed = seed.clone();
            async move {
                let outcome = self
                    .rpc
                    .call(&seed, self.profile.peer_list_method(), json!([]), self.timeout)
                    .await;

                match outcome {
                    CallOutcome::Ok(response) if response.error.is_none() => {
                        let records = response
                            .result
                            .and_then(|v| v.as_array().cloned())
                            .unwrap_or_default();
                        debug!("Seed {} reported {} peers", seed, records.len());
                        records
                    }
                    _ => {
                        debug!("Seed {} contributed no peers", seed);
                        Vec::new()
                    }
                }
            }
        });

        let merged: Vec<Value> = join_all(queries).await.into_iter().flatten().collect();
        info!(
            "🔎 Collected {} peer records from {} seeds",
            merged.len(),
            seeds.len()
        );
        merged
    }

    /// Fetch endpoint URLs from a public directory listing.
    ///
    /// Expects a JSON array of objects with an `endpoint` field; any other
    /// shape yields an empty set.
    pub async fn collect_directory(&self, url: &str) -> Vec<String> {
        let value = match self.rpc.get_json(url, self.timeout).await {
            CallOutcome::Ok(v) => v,
            _ => {
                debug!("Directory {} unavailable", url);
                return Vec::new();
            }
        };

        let listed: Vec<String> = value
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("endpoint"))
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        info!("🔎 Directory {} listed {} endpoints", url, listed.len());
        listed
    }

    /// Normalize raw addresses into deduplicated candidates
    pub fn candidates_from_addresses(
        &self,
        raw_addresses: &[String],
        source: SourceKind,
    ) -> Vec<Candidate> {
        // Keep the raw→canonical pairing so each candidate remembers what the
        // discovery source actually reported
        let pairs: Vec<(String, String)> = raw_addresses
            .iter()
            .filter_map(|raw| {
                normalize_address(raw, &self.profile).map(|canonical| (raw.clone(), canonical))
            })
            .collect();

        let canonical: Vec<String> = pairs.iter().map(|(_, c)| c.clone()).collect();
        let kept: HashSet<String> = dedupe_by_host(&canonical, self.profile.canonical_port)
            .into_iter()
            .collect();

        let mut seen = HashSet::new();
        pairs
            .into_iter()
            .filter(|(_, canonical)| kept.contains(canonical) && seen.insert(canonical.clone()))
            .map(|(raw, canonical)| Candidate::new(raw, canonical, source))
            .collect()
    }

    /// Candidates advertised directly in peer records
    pub fn candidates_from_records(&self, records: &[Value]) -> Vec<Candidate> {
        let raw: Vec<String> = records
            .iter()
            .filter_map(|r| self.profile.peer_record_address(r))
            .collect();
        self.candidates_from_addresses(&raw, SourceKind::GossipPeer)
    }

    /// Keep the endpoints that answer a peer-list query themselves.
    ///
    /// These become the next run's seed set: a verified endpoint that
    /// exposes its peer list is worth more than a static seed.
    pub async fn admin_capable(&self, urls: &[String], batch_size: usize) -> Vec<String> {
        let mut capable = Vec::new();

        for batch in urls.chunks(batch_size.max(1)) {
            let checks = batch.iter().map(|url| {
                let url = url.clone();
                async move {
                    let outcome = self
                        .rpc
                        .call(&url, self.profile.peer_list_method(), json!([]), self.timeout)
                        .await;
                    match outcome {
                        CallOutcome::Ok(response)
                            if response.error.is_none() && response.result.is_some() =>
                        {
                            Some(url)
                        }
                        _ => None,
                    }
                }
            });

            capable.extend(join_all(checks).await.into_iter().flatten());
        }

        capable
    }

    /// Unique bare IPs for the gossip-derived private-node path, in
    /// first-seen order
    pub fn gossip_ips(&self, records: &[Value]) -> Vec<String> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter_map(|r| self.profile.peer_record_ip(r))
            .filter(|ip| seen.insert(ip.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn discovery() -> PeerDiscovery {
        PeerDiscovery::new(
            RpcClient::new().unwrap(),
            ChainProfile::evm(),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_candidates_from_records_normalizes_and_dedupes() {
        let d = discovery();
        let records = vec![
            json!({"network": {"remoteAddress": "1.2.3.4:30303"}}),
            json!({"network": {"remoteAddress": "1.2.3.4:8545"}}),
            json!({"address": "5.6.7.8:9999"}),
            json!({"comment": "no address at all"}),
        ];

        let candidates = d.candidates_from_records(&records);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].canonical_url, "http://1.2.3.4:8545");
        assert_eq!(candidates[1].canonical_url, "http://5.6.7.8:8545");
        assert!(candidates.iter().all(|c| c.source == SourceKind::GossipPeer));
    }

    #[test]
    fn test_gossip_ips_unique_in_order() {
        let d = discovery();
        let records = vec![
            json!({"address": "9.9.9.9:30303"}),
            json!({"enode": "enode://ab@7.7.7.7:30303"}),
            json!({"address": "9.9.9.9:8545"}),
        ];

        assert_eq!(d.gossip_ips(&records), vec!["9.9.9.9", "7.7.7.7"]);
    }

    #[test]
    fn test_directory_addresses_feed_candidates() {
        let d = discovery();
        let raw = vec![
            "https://2.2.2.2:8545".to_string(),
            "not a url".to_string(),
        ];
        let candidates = d.candidates_from_addresses(&raw, SourceKind::DirectoryListed);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].canonical_url, "https://2.2.2.2:8545");
        assert_eq!(candidates[0].source, SourceKind::DirectoryListed);
    }

    #[tokio::test]
    async fn test_unreachable_seeds_contribute_empty_sets() {
        let d = discovery();
        let seeds = vec!["http://127.0.0.1:1/".to_string()];
        let records = d.collect_peer_records(&seeds).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_admin_capable_drops_unreachable_endpoints() {
        // No endpoint answers a peer-list query, so none qualifies as a seed
        let d = discovery();
        let urls = vec![
            "http://127.0.0.1:1/".to_string(),
            "http://127.0.0.1:2/".to_string(),
        ];
        let capable = d.admin_capable(&urls, 10).await;
        assert!(capable.is_empty());
    }
}
