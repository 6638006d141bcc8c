use crate::seen::SeenStore;
use crate::types::{ComposeConfig, MatchResult, Report, Result};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Assembles a user's matched items into a ranked, deduplicated report.
pub struct DigestComposer {
    config: ComposeConfig,
}

impl DigestComposer {
    pub fn new(config: ComposeConfig) -> Self {
        Self { config }
    }

    /// Drop already-delivered items, sort by the ranking order, and truncate
    /// to the report cap. An empty result is a valid report; the orchestrator
    /// decides whether to suppress its delivery.
    pub async fn compose(
        &self,
        user_id: Uuid,
        matches: Vec<MatchResult>,
        seen: &dyn SeenStore,
    ) -> Result<Report> {
        let candidates = matches.len();

        let mut fresh = Vec::new();
        let mut in_run: HashSet<String> = HashSet::new();
        for result in matches {
            // Overlapping fetches may surface the same item twice in one run.
            if !in_run.insert(result.item.id.clone()) {
                continue;
            }
            if seen.has(user_id, &result.item.id).await? {
                continue;
            }
            fresh.push(result);
        }

        fresh.sort_by(rank_order);
        if fresh.len() > self.config.max_items {
            fresh.truncate(self.config.max_items);
        }

        debug!(
            "composed report for {}: {} of {} candidates survived filtering",
            user_id,
            fresh.len(),
            candidates
        );

        Ok(Report {
            user_id,
            items: fresh,
            generated_at: Utc::now(),
        })
    }
}

/// Total order over match results: descending score, then descending published
/// timestamp, then ascending item id. `total_cmp` keeps the float comparison
/// total, so the sort is stable and reproducible.
pub fn rank_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.item.published.cmp(&a.item.published))
        .then_with(|| a.item.id.cmp(&b.item.id))
}
