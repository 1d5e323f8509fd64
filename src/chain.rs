//! Per-network chain profiles
//!
//! The EVM and Solana-style pipelines differ only in RPC method names, result
//! decoding, peer-record shape and port conventions. Everything chain-specific
//! lives behind `ChainProfile` so the pipeline itself stays shared.
//!
//! Liveness predicates are deliberately per-profile: EVM counts a node as live
//! when `eth_blockNumber` is non-zero, Solana-style when `getSlot` is
//! non-zero. A node reporting zero is still syncing and must not serve
//! traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chain family a network belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Evm,
    Solana,
}

/// Chain-specific behavior consumed by the shared pipeline
#[derive(Debug, Clone)]
pub struct ChainProfile {
    pub kind: ChainKind,

    /// The network's conventional default RPC port, preferred during
    /// deduplication
    pub canonical_port: u16,

    /// Ports paired with bare gossip IPs on the private-node path
    pub candidate_ports: Vec<u16>,
}

impl ChainProfile {
    /// Standard EVM profile (Ethereum, BSC, Base, ...)
    pub fn evm() -> Self {
        Self {
            kind: ChainKind::Evm,
            canonical_port: 8545,
            candidate_ports: vec![8545, 30303],
        }
    }

    /// Solana-style profile
    pub fn solana() -> Self {
        Self {
            kind: ChainKind::Solana,
            canonical_port: 8899,
            candidate_ports: vec![8899, 8545],
        }
    }

    pub fn for_kind(kind: ChainKind) -> Self {
        match kind {
            ChainKind::Evm => Self::evm(),
            ChainKind::Solana => Self::solana(),
        }
    }

    /// RPC method whose result is the liveness value
    pub fn liveness_method(&self) -> &'static str {
        match self.kind {
            ChainKind::Evm => "eth_blockNumber",
            ChainKind::Solana => "getSlot",
        }
    }

    /// RPC method whose result is the network identity, if the chain has one
    ///
    /// Profiles without an identity method skip the identity comparison
    /// entirely.
    pub fn network_id_method(&self) -> Option<&'static str> {
        match self.kind {
            ChainKind::Evm => Some("eth_chainId"),
            ChainKind::Solana => None,
        }
    }

    /// RPC method returning the node's peer/gossip list
    pub fn peer_list_method(&self) -> &'static str {
        match self.kind {
            ChainKind::Evm => "admin_peers",
            ChainKind::Solana => "getClusterNodes",
        }
    }

    /// Decode a liveness result payload into a block height / slot
    pub fn decode_liveness(&self, value: &Value) -> Option<u64> {
        match self.kind {
            ChainKind::Evm => decode_hex_quantity(value),
            ChainKind::Solana => value.as_u64(),
        }
    }

    /// Decode a network-identity result payload
    pub fn decode_network_id(&self, value: &Value) -> Option<u64> {
        match self.kind {
            ChainKind::Evm => decode_hex_quantity(value),
            ChainKind::Solana => None,
        }
    }

    /// Extract the advertised RPC-ish address from one peer record
    ///
    /// EVM `admin_peers` records carry `network.remoteAddress` or `address`;
    /// Solana `getClusterNodes` records carry `rpc` (may be null for private
    /// nodes) or `gossip`.
    pub fn peer_record_address(&self, record: &Value) -> Option<String> {
        match self.kind {
            ChainKind::Evm => record
                .pointer("/network/remoteAddress")
                .or_else(|| record.get("address"))
                .and_then(Value::as_str)
                .map(str::to_string),
            ChainKind::Solana => record
                .get("rpc")
                .filter(|v| !v.is_null())
                .or_else(|| record.get("gossip"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Extract a bare IP from a low-level peer record for the gossip-derived
    /// path. Records that only expose a transport-layer address still yield
    /// an IP here.
    pub fn peer_record_ip(&self, record: &Value) -> Option<String> {
        if let Some(addr) = self.peer_record_address(record) {
            return split_host(&addr).map(str::to_string);
        }

        // EVM enode URLs: enode://<pubkey>@ip:port
        if self.kind == ChainKind::Evm {
            if let Some(enode) = record.get("enode").and_then(Value::as_str) {
                if let Some(at) = enode.rfind('@') {
                    return split_host(&enode[at + 1..]).map(str::to_string);
                }
            }
        }

        None
    }
}

/// Parse an EVM hex quantity (`"0x1a"`) into a u64
fn decode_hex_quantity(value: &Value) -> Option<u64> {
    let s = value.as_str()?;
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u64::from_str_radix(hex, 16).ok()
}

/// Host portion of a `host:port` string
fn split_host(addr: &str) -> Option<&str> {
    let host = addr.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_hex_quantity() {
        assert_eq!(decode_hex_quantity(&json!("0x0")), Some(0));
        assert_eq!(decode_hex_quantity(&json!("0x1a")), Some(26));
        assert_eq!(decode_hex_quantity(&json!("1a")), None);
        assert_eq!(decode_hex_quantity(&json!(26)), None);
    }

    #[test]
    fn test_evm_profile_methods() {
        let profile = ChainProfile::evm();
        assert_eq!(profile.liveness_method(), "eth_blockNumber");
        assert_eq!(profile.network_id_method(), Some("eth_chainId"));
        assert_eq!(profile.decode_liveness(&json!("0x10")), Some(16));
        assert_eq!(profile.decode_network_id(&json!("0x38")), Some(56));
    }

    #[test]
    fn test_solana_profile_methods() {
        let profile = ChainProfile::solana();
        assert_eq!(profile.liveness_method(), "getSlot");
        assert_eq!(profile.network_id_method(), None);
        assert_eq!(profile.decode_liveness(&json!(250_000_000u64)), Some(250_000_000));
    }

    #[test]
    fn test_evm_peer_record_address() {
        let profile = ChainProfile::evm();

        let record = json!({"network": {"remoteAddress": "1.2.3.4:30303"}});
        assert_eq!(profile.peer_record_address(&record).as_deref(), Some("1.2.3.4:30303"));

        let record = json!({"address": "5.6.7.8:8545"});
        assert_eq!(profile.peer_record_address(&record).as_deref(), Some("5.6.7.8:8545"));
    }

    #[test]
    fn test_evm_peer_record_ip_from_enode() {
        let profile = ChainProfile::evm();
        let record = json!({"enode": "enode://abcdef@9.9.9.9:30303"});
        assert_eq!(profile.peer_record_ip(&record).as_deref(), Some("9.9.9.9"));
    }

    #[test]
    fn test_solana_peer_record_prefers_rpc() {
        let profile = ChainProfile::solana();

        let record = json!({"rpc": "1.1.1.1:8899", "gossip": "1.1.1.1:8001"});
        assert_eq!(profile.peer_record_address(&record).as_deref(), Some("1.1.1.1:8899"));

        // Private node: rpc is null, fall back to gossip
        let record = json!({"rpc": null, "gossip": "2.2.2.2:8001"});
        assert_eq!(profile.peer_record_address(&record).as_deref(), Some("2.2.2.2:8001"));
    }
}
