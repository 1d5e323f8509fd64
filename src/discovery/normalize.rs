//! Address normalization and per-host deduplication
//!
//! Peer-gossip data is noisy: addresses arrive with or without a scheme, on
//! arbitrary ports, and sometimes malformed. Normalization canonicalizes
//! every usable address to `scheme://ip:port`; deduplication collapses the
//! result to one entry per host IP, preferring the chain's canonical RPC
//! port. Both functions are pure and order-stable: for equal-priority
//! entries, first occurrence wins.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::chain::ChainProfile;

/// Canonicalize one raw peer address into `scheme://ip:port`.
///
/// The port survives only if it is the canonical RPC port or 80; anything
/// else is rewritten to the canonical port, since gossip usually reports the
/// p2p transport port rather than the RPC one. Returns `None` for addresses
/// whose host is not an IP; malformed peer data is expected background
/// noise, not an error.
pub fn normalize_address(raw: &str, profile: &ChainProfile) -> Option<String> {
    let (scheme, rest) = match raw.trim() {
        r if r.starts_with("https://") => ("https", &r[8..]),
        r if r.starts_with("http://") => ("http", &r[7..]),
        r => ("http", r),
    };

    let rest = rest.trim_end_matches('/');
    let mut parts = rest.split(':');
    let host = parts.next()?;
    host.parse::<IpAddr>().ok()?;

    let port: u16 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => profile.canonical_port,
    };

    let port = if port == profile.canonical_port || port == 80 {
        port
    } else {
        profile.canonical_port
    };

    Some(format!("{}://{}:{}", scheme, host, port))
}

/// Collapse a list of addresses to at most one per host IP.
///
/// The entry using the canonical port wins for its host; otherwise the
/// first-seen entry wins. Input strings are preserved as given. Entries with
/// no parseable host are dropped silently.
pub fn dedupe_by_host(addresses: &[String], canonical_port: u16) -> Vec<String> {
    // host -> index into `kept`, so a canonical-port upgrade keeps the
    // host's first-seen position
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<(String, bool)> = Vec::new();

    for address in addresses {
        let clean = address
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let mut parts = clean.split(':');
        let host = match parts.next() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => continue,
        };
        let is_canonical = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .map(|p| p == canonical_port)
            .unwrap_or(false);

        match index_of.get(&host) {
            Some(&i) => {
                if is_canonical && !kept[i].1 {
                    kept[i] = (address.clone(), true);
                }
            }
            None => {
                index_of.insert(host, kept.len());
                kept.push((address.clone(), is_canonical));
            }
        }
    }

    kept.into_iter().map(|(address, _)| address).collect()
}
