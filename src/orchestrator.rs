use crate::composer::DigestComposer;
use crate::delivery::Delivery;
use crate::fetcher::ContentSource;
use crate::matcher;
use crate::roster::Roster;
use crate::seen::SeenStore;
use crate::types::{
    ComposeConfig, ContentItem, CorrespondentError, Result, RunConfig, RunSummary, User,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Per-user pipeline stage within a run. FAILED is reachable from any stage
/// and terminal for that user only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserState {
    Pending,
    Fetching,
    Matching,
    Composing,
    Delivering,
    Done,
    Failed,
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserState::Pending => "PENDING",
            UserState::Fetching => "FETCHING",
            UserState::Matching => "MATCHING",
            UserState::Composing => "COMPOSING",
            UserState::Delivering => "DELIVERING",
            UserState::Done => "DONE",
            UserState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

struct UserOutcome {
    user_id: Uuid,
    state: UserState,
    items_delivered: u64,
    site_failures: u64,
}

impl UserOutcome {
    fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            state: UserState::Pending,
            items_delivered: 0,
            site_failures: 0,
        }
    }

    fn enter(&mut self, state: UserState) {
        debug!("user {}: {} -> {}", self.user_id, self.state, state);
        self.state = state;
    }
}

/// Drives the report pipeline across all users. Site fetches share a bounded
/// slot pool across the whole run, with an additional per-host cap so no
/// single remote sees more than a couple of concurrent requests.
pub struct ReportOrchestrator {
    roster: Arc<dyn Roster>,
    source: Arc<dyn ContentSource>,
    seen: Arc<dyn SeenStore>,
    delivery: Arc<dyn Delivery>,
    composer: DigestComposer,
    config: RunConfig,
    fetch_slots: Arc<Semaphore>,
    host_slots: Mutex<HashMap<String, Arc<Semaphore>>>,
    running: AtomicBool,
    cancelled: AtomicBool,
}

impl ReportOrchestrator {
    pub fn new(
        roster: Arc<dyn Roster>,
        source: Arc<dyn ContentSource>,
        seen: Arc<dyn SeenStore>,
        delivery: Arc<dyn Delivery>,
        run_config: RunConfig,
        compose_config: ComposeConfig,
    ) -> Self {
        let fetch_slots = Arc::new(Semaphore::new(run_config.max_concurrent_fetches));
        Self {
            roster,
            source,
            seen,
            delivery,
            composer: DigestComposer::new(compose_config),
            config: run_config,
            fetch_slots,
            host_slots: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Execute one full run across the roster. Rejects re-entrant invocation
    /// while a run is in progress to avoid duplicate delivery. Per-site and
    /// per-user failures are absorbed into the summary; only roster failure
    /// aborts the run.
    pub async fn run_report(&self) -> Result<RunSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CorrespondentError::RunInProgress);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let result = self.run_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Stop issuing new fetches. In-flight fetches finish or time out
    /// normally, and users already past matching complete their run, so no
    /// partial seen-item state is left behind.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        info!("cancellation requested; in-flight fetches will finish");
    }

    /// Standing trigger: run the pipeline on a fixed interval until the
    /// process stops. An interval tick that lands while the previous run is
    /// still in progress is skipped.
    pub async fn run_scheduled(&self, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_report().await {
                Ok(summary) => info!(
                    "scheduled run complete: {} users processed, {} failed, {} items delivered",
                    summary.users_processed, summary.users_failed, summary.items_delivered
                ),
                Err(CorrespondentError::RunInProgress) => {
                    warn!("previous run still in progress; skipping tick")
                }
                Err(e) => error!("scheduled run failed: {}", e),
            }
        }
    }

    async fn run_inner(&self) -> Result<RunSummary> {
        let started_at = Utc::now();

        let users = self.roster.list_users().await?;
        info!("starting report run for {} users", users.len());

        let outcomes =
            futures::future::join_all(users.into_iter().map(|user| self.process_user(user))).await;

        let mut summary = RunSummary {
            users_processed: 0,
            users_failed: 0,
            items_delivered: 0,
            site_failures: 0,
            started_at,
            finished_at: started_at,
        };

        for outcome in outcomes {
            summary.site_failures += outcome.site_failures;
            match outcome.state {
                UserState::Done => {
                    summary.users_processed += 1;
                    summary.items_delivered += outcome.items_delivered;
                }
                UserState::Failed => summary.users_failed += 1,
                _ => debug!("user {} did not run (cancelled)", outcome.user_id),
            }
        }

        if !self.cancelled.load(Ordering::SeqCst) {
            if let Err(e) = self.seen.prune(self.config.retention_days).await {
                warn!("seen-store pruning failed: {}", e);
            }
        }

        summary.finished_at = Utc::now();
        info!(
            "run finished: {} processed, {} failed, {} items delivered, {} site failures",
            summary.users_processed,
            summary.users_failed,
            summary.items_delivered,
            summary.site_failures
        );
        Ok(summary)
    }

    /// One user's pipeline: fetch, match, compose, deliver, record. Strictly
    /// sequential per user; parallelism lives across users and across a
    /// user's site fetches.
    async fn process_user(&self, user: User) -> UserOutcome {
        let mut outcome = UserOutcome::new(user.id);

        if self.cancelled.load(Ordering::SeqCst) {
            debug!("run cancelled before user {} started", user.id);
            return outcome;
        }

        outcome.enter(UserState::Fetching);
        let fetches: Vec<(String, Result<Vec<ContentItem>>)> = stream::iter(user.sites.clone())
            .map(|site| async move {
                let result = self.fetch_site(&site).await;
                (site, result)
            })
            .buffer_unordered(self.config.max_concurrent_fetches)
            .collect()
            .await;

        let mut items = Vec::new();
        for (site, result) in fetches {
            match result {
                Ok(batch) => {
                    debug!("site {} returned {} items for {}", site, batch.len(), user.name);
                    items.extend(batch);
                }
                Err(e) => {
                    warn!("site {} failed for user {}: {}", site, user.name, e);
                    outcome.site_failures += 1;
                }
            }
        }

        if items.is_empty() && outcome.site_failures > 0 {
            warn!(
                "user {} had no usable input ({} site failures)",
                user.name, outcome.site_failures
            );
            outcome.enter(UserState::Failed);
            return outcome;
        }

        outcome.enter(UserState::Matching);
        let matches = matcher::match_items(items, &user.interests);

        outcome.enter(UserState::Composing);
        let report = match self
            .composer
            .compose(user.id, matches, self.seen.as_ref())
            .await
        {
            Ok(report) => report,
            Err(e) => {
                error!("composing report for {} failed: {}", user.name, e);
                outcome.enter(UserState::Failed);
                return outcome;
            }
        };

        if report.items.is_empty() {
            debug!("no undelivered matches for {}; delivery suppressed", user.name);
            outcome.enter(UserState::Done);
            return outcome;
        }

        outcome.enter(UserState::Delivering);
        if let Err(e) = self.delivery.deliver(&report, &user).await {
            warn!("delivery failed for {}: {}", user.email, e);
            outcome.enter(UserState::Failed);
            return outcome;
        }

        // Seen records are written only after confirmed delivery. A write
        // failure leaves the remaining items unmarked, so they redeliver
        // rather than disappear.
        for result in &report.items {
            match self.seen.mark_delivered(user.id, &result.item.id).await {
                Ok(()) => outcome.items_delivered += 1,
                Err(e) => {
                    error!(
                        "recording delivery of {} for user {} failed: {}",
                        result.item.id, user.id, e
                    );
                    outcome.enter(UserState::Failed);
                    return outcome;
                }
            }
        }

        outcome.enter(UserState::Done);
        outcome
    }

    async fn fetch_site(&self, site: &str) -> Result<Vec<ContentItem>> {
        let _run_slot = self
            .fetch_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CorrespondentError::General("fetch pool closed".to_string()))?;

        let host_slots = self.host_slot(site).await;
        let _host_slot = host_slots
            .acquire_owned()
            .await
            .map_err(|_| CorrespondentError::General("fetch pool closed".to_string()))?;

        // Checked after slot acquisition: a cancelled run issues no new
        // fetches, but whatever already holds a connection runs to completion.
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(CorrespondentError::General(
                "run cancelled before fetch".to_string(),
            ));
        }

        self.source.fetch(site).await
    }

    async fn host_slot(&self, site: &str) -> Arc<Semaphore> {
        let host = Url::parse(site)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| site.to_string());

        let mut slots = self.host_slots.lock().await;
        slots
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_host_fetches)))
            .clone()
    }
}
