//! Core types for the endpoint curation pipeline
//!
//! Everything here is created fresh for a single run and discarded once the
//! registry mutations have been issued. The only exceptions are the wire
//! types (`RegistryEntry`, `NodeDescriptor`) which mirror the proxy's admin
//! interface exactly.

use serde::{Deserialize, Serialize};

// =============================================================================
// DISCOVERY
// =============================================================================

/// Where a candidate endpoint was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Reported in a seed node's peer list
    GossipPeer,

    /// Listed by a public endpoint directory
    DirectoryListed,

    /// Derived from a low-level gossip record by pairing its IP with
    /// conventional RPC ports
    GossipDerived,
}

/// An address discovered but not yet health-verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Address string exactly as the discovery source reported it
    pub raw_address: String,

    /// Normalized `scheme://ip:port` form used for all later comparisons
    pub canonical_url: String,

    /// Discovery source
    pub source: SourceKind,
}

impl Candidate {
    pub fn new(raw: impl Into<String>, canonical: impl Into<String>, source: SourceKind) -> Self {
        Self {
            raw_address: raw.into(),
            canonical_url: canonical.into(),
            source,
        }
    }
}

// =============================================================================
// PROBING & SCORING
// =============================================================================

/// Outcome of a single verification probe against one candidate
///
/// All failure modes (timeout, refused connection, malformed payload, wrong
/// network) collapse into `reachable = false`; the prober never returns an
/// error.
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    /// True only if the node answered in time, reported non-zero liveness
    /// and matched the expected network identity
    pub reachable: bool,

    /// Network identity the node reported, if it answered
    pub network_id: Option<u64>,

    /// Liveness value (block height or slot), if it answered
    pub liveness: Option<u64>,

    /// Round-trip latency of the probe, if it answered
    pub latency_ms: Option<u64>,
}

impl ProbeResult {
    pub fn unreachable() -> Self {
        Self::default()
    }
}

/// A verified endpoint ranked by reliability and latency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEndpoint {
    pub url: String,

    /// Successful probes / attempted probes, in [0, 1]
    pub reliability: f64,

    /// Mean latency over successful probes; the full probe budget when no
    /// probe succeeded
    pub avg_latency_ms: u64,

    /// Combined ranking score in [0, 1]
    pub score: f64,

    /// Last liveness value observed during scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_liveness: Option<u64>,
}

impl ScoredEndpoint {
    /// Combine reliability and latency into the ranking score.
    ///
    /// `score = 0.7 * reliability + 0.3 * max(0, 1 - avg_latency / budget)`
    pub fn compute(
        url: String,
        reliability: f64,
        avg_latency_ms: u64,
        probe_budget_ms: u64,
        last_liveness: Option<u64>,
    ) -> Self {
        let time_ratio = if probe_budget_ms == 0 {
            0.0
        } else {
            1.0 - avg_latency_ms as f64 / probe_budget_ms as f64
        };
        let score = 0.7 * reliability + 0.3 * time_ratio.max(0.0);

        Self {
            url,
            reliability,
            avg_latency_ms,
            score,
            last_liveness,
        }
    }
}

// =============================================================================
// REGISTRY WIRE TYPES
// =============================================================================

/// One entry of the proxy's current endpoint set
///
/// Owned by the registry; the pipeline only reads a snapshot of these and
/// issues add/remove commands. Field names match the proxy admin JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(rename = "ID", default)]
    pub id: u64,

    #[serde(rename = "Endpoint")]
    pub endpoint: String,

    #[serde(rename = "Is_disabled", default)]
    pub is_disabled: bool,
}

/// Node descriptor sent with a registry add command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub url: String,
    pub public: bool,

    /// Throttle policy string, e.g. `"requests;10000;10;0"`
    pub throttle: String,

    pub score_modifier: i32,
    pub probe_time: u32,
    pub available_block_last: u64,
    pub available_block_last_ts: i64,
    pub is_disabled: bool,
    pub is_throttled: bool,
    pub is_paused: bool,
    pub attr: u32,
    pub score: u32,
}

impl NodeDescriptor {
    /// Descriptor for a freshly verified endpoint
    pub fn for_endpoint(endpoint: &ScoredEndpoint, now_ms: i64) -> Self {
        Self {
            url: endpoint.url.clone(),
            public: false,
            throttle: "requests;10000;10;0".to_string(),
            score_modifier: 1,
            probe_time: 10,
            available_block_last: endpoint.last_liveness.unwrap_or(0),
            available_block_last_ts: now_ms,
            is_disabled: false,
            is_throttled: false,
            is_paused: false,
            attr: 1,
            score: 100,
        }
    }
}

/// Endpoint exempt from removal regardless of health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub url: String,
}

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Add/remove sets computed from one snapshot comparison
#[derive(Debug, Clone, Default)]
pub struct ReconciliationPlan {
    /// Verified endpoints absent from the registry
    pub to_add: Vec<ScoredEndpoint>,

    /// Disabled registry entries not covered by the whitelist
    pub to_remove: Vec<RegistryEntry>,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Counts reported at the end of every run, even under partial failure
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub discovered: usize,
    pub verified: usize,
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_formula() {
        // reliability 1.0, 300ms of a 3000ms budget => 0.7 + 0.3 * 0.9 = 0.97
        let scored = ScoredEndpoint::compute("http://a:8545".to_string(), 1.0, 300, 3000, None);
        assert!((scored.score - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_score_zero_successes() {
        // Full budget as latency => time component 0
        let scored = ScoredEndpoint::compute("http://a:8545".to_string(), 0.0, 3000, 3000, None);
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn test_score_latency_over_budget_clamps() {
        let scored = ScoredEndpoint::compute("http://a:8545".to_string(), 1.0, 9000, 3000, None);
        assert!((scored.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_registry_entry_wire_format() {
        let json = r#"{"ID": 2, "Endpoint": "http://b:8545", "Is_disabled": true}"#;
        let entry: RegistryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 2);
        assert_eq!(entry.endpoint, "http://b:8545");
        assert!(entry.is_disabled);
    }

    #[test]
    fn test_node_descriptor_defaults() {
        let scored = ScoredEndpoint::compute("http://c:8545".to_string(), 1.0, 100, 3000, Some(42));
        let desc = NodeDescriptor::for_endpoint(&scored, 1_700_000_000_000);
        assert_eq!(desc.url, "http://c:8545");
        assert_eq!(desc.available_block_last, 42);
        assert!(!desc.public);
        assert!(!desc.is_disabled);
    }
}
