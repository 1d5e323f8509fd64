//! Reconciliation Engine
//!
//! Diffs the verified endpoint set against the registry snapshot and the
//! whitelist, then drives the resulting add/remove sets through the registry
//! interface. Each mutation is issued independently: one failure never
//! blocks the others, failures are counted and left for the next run to
//! retry. The snapshot itself is never mutated in place.

use futures::future::join_all;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::registry::NodeRegistry;
use crate::types::{NodeDescriptor, ReconciliationPlan, RegistryEntry, ScoredEndpoint, WhitelistEntry};

/// Counts from one `apply` pass
#[derive(Debug, Clone, Default)]
pub struct ApplyStats {
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Compute the add/remove plan from one snapshot comparison.
///
/// `to_add` is every verified endpoint absent from the registry (exact
/// trimmed-URL match). `to_remove` is every disabled registry entry whose
/// URL is not whitelisted; whitelisted entries survive regardless of
/// health.
pub fn reconcile(
    verified: &[ScoredEndpoint],
    snapshot: &[RegistryEntry],
    whitelist: &[WhitelistEntry],
) -> ReconciliationPlan {
    let registered: HashSet<&str> = snapshot.iter().map(|e| e.endpoint.trim()).collect();
    let whitelisted: HashSet<&str> = whitelist.iter().map(|w| w.url.trim()).collect();

    let to_add: Vec<ScoredEndpoint> = verified
        .iter()
        .filter(|endpoint| !registered.contains(endpoint.url.trim()))
        .cloned()
        .collect();

    let to_remove: Vec<RegistryEntry> = snapshot
        .iter()
        .filter(|entry| entry.is_disabled && !whitelisted.contains(entry.endpoint.trim()))
        .cloned()
        .collect();

    ReconciliationPlan { to_add, to_remove }
}

/// Apply a plan through the registry interface.
///
/// Additions and removals are independent, idempotent commands; replaying
/// them on the next run is safe.
pub async fn apply(plan: &ReconciliationPlan, registry: &dyn NodeRegistry) -> ApplyStats {
    if plan.is_noop() {
        info!("Reconciliation plan is a no-op");
        return ApplyStats::default();
    }

    let now_ms = chrono::Utc::now().timestamp_millis();

    let adds = plan.to_add.iter().map(|endpoint| async move {
        let descriptor = NodeDescriptor::for_endpoint(endpoint, now_ms);
        match registry.add(&descriptor).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to add {}: {}", endpoint.url, e);
                false
            }
        }
    });
    let add_results = join_all(adds).await;

    let removes = plan.to_remove.iter().map(|entry| async move {
        match registry.remove(entry.id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove {} (id={}): {}", entry.endpoint, entry.id, e);
                false
            }
        }
    });
    let remove_results = join_all(removes).await;

    let added = add_results.iter().filter(|ok| **ok).count();
    let removed = remove_results.iter().filter(|ok| **ok).count();
    let failed = (add_results.len() - added) + (remove_results.len() - removed);

    info!(
        "🔁 Applied plan: {} added, {} removed, {} failed",
        added, removed, failed
    );

    ApplyStats {
        added,
        removed,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::MemoryRegistry;

    fn scored(url: &str) -> ScoredEndpoint {
        ScoredEndpoint::compute(url.to_string(), 1.0, 100, 3000, Some(1))
    }

    fn entry(id: u64, endpoint: &str, disabled: bool) -> RegistryEntry {
        RegistryEntry {
            id,
            endpoint: endpoint.to_string(),
            is_disabled: disabled,
        }
    }

    #[test]
    fn test_plan_adds_missing_and_removes_disabled() {
        let snapshot = vec![
            entry(1, "http://a:8545", false),
            entry(2, "http://b:8545", true),
        ];
        let verified = vec![scored("http://a:8545"), scored("http://c:8545")];

        let plan = reconcile(&verified, &snapshot, &[]);

        assert_eq!(plan.to_add.len(), 1);
        assert_eq!(plan.to_add[0].url, "http://c:8545");
        assert_eq!(plan.to_remove.len(), 1);
        assert_eq!(plan.to_remove[0].id, 2);
    }

    #[test]
    fn test_whitelisted_entry_is_never_removed() {
        let snapshot = vec![entry(2, "http://b:8545", true)];
        let whitelist = vec![WhitelistEntry {
            url: "http://b:8545".to_string(),
        }];

        let plan = reconcile(&[], &snapshot, &whitelist);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn test_healthy_entries_are_not_removed() {
        let snapshot = vec![entry(1, "http://a:8545", false)];
        let plan = reconcile(&[], &snapshot, &[]);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn test_url_match_ignores_surrounding_whitespace() {
        let snapshot = vec![entry(1, " http://a:8545 ", false)];
        let verified = vec![scored("http://a:8545")];
        let plan = reconcile(&verified, &snapshot, &[]);
        assert!(plan.to_add.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_after_apply() {
        let registry = MemoryRegistry::with_entries(vec![
            entry(1, "http://a:8545", false),
            entry(2, "http://b:8545", true),
        ]);
        let verified = vec![scored("http://a:8545"), scored("http://c:8545")];

        let snapshot = registry.snapshot().await.unwrap();
        let plan = reconcile(&verified, &snapshot, &[]);
        let stats = apply(&plan, &registry).await;
        assert_eq!(stats.added, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.failed, 0);

        // Second pass over the updated registry is a no-op
        let snapshot = registry.snapshot().await.unwrap();
        let plan = reconcile(&verified, &snapshot, &[]);
        assert!(plan.is_noop());
    }

    #[tokio::test]
    async fn test_mutation_failures_are_counted_not_fatal() {
        let mut registry = MemoryRegistry::with_entries(vec![entry(2, "http://b:8545", true)]);
        registry.fail_mutations = true;

        let verified = vec![scored("http://c:8545")];
        let snapshot = registry.snapshot().await.unwrap();
        let plan = reconcile(&verified, &snapshot, &[]);

        let stats = apply(&plan, &registry).await;
        assert_eq!(stats.added, 0);
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.failed, 2);

        // Registry untouched
        assert_eq!(registry.snapshot().await.unwrap().len(), 1);
    }
}
