//! Performance Scorer
//!
//! Re-probes verified candidates to measure reliability and latency.
//! Attempts against one candidate run sequentially with a fixed delay so a
//! single host is never burst; distinct candidates are scored concurrently
//! in batches.

use futures::future::join_all;
use std::time::Duration;
use tracing::debug;

use super::HealthProber;
use crate::types::{Candidate, ScoredEndpoint};

/// Scores candidates by repeated probing
pub struct PerformanceScorer<'a> {
    prober: &'a HealthProber,
    retries: u32,
    inter_probe_delay: Duration,
    probe_budget_ms: u64,
    batch_size: usize,
}

impl<'a> PerformanceScorer<'a> {
    pub fn new(
        prober: &'a HealthProber,
        retries: u32,
        inter_probe_delay: Duration,
        probe_budget_ms: u64,
        batch_size: usize,
    ) -> Self {
        Self {
            prober,
            retries: retries.max(1),
            inter_probe_delay,
            probe_budget_ms,
            batch_size: batch_size.max(1),
        }
    }

    /// Score one candidate with sequential retries.
    ///
    /// Reliability is successes over attempts; average latency is computed
    /// over successful attempts only. A candidate with zero successes gets
    /// the full probe budget as its average, which zeroes its time component.
    pub async fn score_candidate(&self, candidate: &Candidate) -> ScoredEndpoint {
        let mut successes: u64 = 0;
        let mut latency_total: u64 = 0;
        let mut last_liveness = None;

        for attempt in 0..self.retries {
            let result = self.prober.probe(&candidate.canonical_url).await;

            if result.reachable {
                successes += 1;
                latency_total += result.latency_ms.unwrap_or(self.probe_budget_ms);
                last_liveness = result.liveness.or(last_liveness);
            }

            if attempt + 1 < self.retries {
                tokio::time::sleep(self.inter_probe_delay).await;
            }
        }

        let reliability = successes as f64 / self.retries as f64;
        let avg_latency_ms = if successes > 0 {
            latency_total / successes
        } else {
            self.probe_budget_ms
        };

        let scored = ScoredEndpoint::compute(
            candidate.canonical_url.clone(),
            reliability,
            avg_latency_ms,
            self.probe_budget_ms,
            last_liveness,
        );
        debug!(
            "📈 {}: reliability={:.2}, avg={}ms, score={:.3}",
            scored.url, scored.reliability, scored.avg_latency_ms, scored.score
        );
        scored
    }

    /// Score a candidate set, returned sorted by descending score.
    ///
    /// Ties keep the original discovery order.
    pub async fn score_all(&self, candidates: &[Candidate]) -> Vec<ScoredEndpoint> {
        let mut scored = Vec::with_capacity(candidates.len());

        for batch in candidates.chunks(self.batch_size) {
            let futures = batch.iter().map(|candidate| self.score_candidate(candidate));
            scored.extend(join_all(futures).await);
        }

        sort_by_score(&mut scored);
        scored
    }
}

/// Stable descending sort by score; equal scores keep their input order
pub fn sort_by_score(endpoints: &mut [ScoredEndpoint]) {
    endpoints.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainProfile;
    use crate::rpc::RpcClient;
    use crate::types::SourceKind;

    #[test]
    fn test_sort_descending_with_stable_ties() {
        let mut endpoints = vec![
            ScoredEndpoint::compute("http://a:8545".into(), 0.5, 1000, 3000, None),
            ScoredEndpoint::compute("http://b:8545".into(), 1.0, 300, 3000, None),
            ScoredEndpoint::compute("http://c:8545".into(), 0.5, 1000, 3000, None),
        ];

        sort_by_score(&mut endpoints);

        assert_eq!(endpoints[0].url, "http://b:8545");
        // a and c tie; discovery order preserved
        assert_eq!(endpoints[1].url, "http://a:8545");
        assert_eq!(endpoints[2].url, "http://c:8545");
    }

    #[tokio::test]
    async fn test_unreachable_candidate_scores_zero() {
        let prober = HealthProber::new(
            RpcClient::new().unwrap(),
            ChainProfile::evm(),
            1,
            Duration::from_millis(50),
            10,
        );
        let scorer = PerformanceScorer::new(&prober, 2, Duration::from_millis(0), 50, 10);

        let candidate = Candidate::new(
            "http://127.0.0.1:1/",
            "http://127.0.0.1:1/",
            SourceKind::GossipPeer,
        );
        let scored = scorer.score_candidate(&candidate).await;

        assert_eq!(scored.reliability, 0.0);
        assert_eq!(scored.avg_latency_ms, 50);
        assert_eq!(scored.score, 0.0);
    }
}
