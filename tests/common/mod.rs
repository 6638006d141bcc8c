use async_trait::async_trait;
use chrono::{Duration, Utc};
use correspondent::delivery::Delivery;
use correspondent::fetcher::ContentSource;
use correspondent::roster::{Roster, SqliteRoster};
use correspondent::seen::SqliteSeenStore;
use correspondent::types::{
    ComposeConfig, ContentItem, CorrespondentError, NewUser, Report, Result, RunConfig, User,
};
use correspondent::ReportOrchestrator;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted behavior for one site URL.
pub enum SiteScript {
    Items(Vec<ContentItem>),
    /// Simulates the adapter giving up after its retry budget.
    Timeout,
    /// Items returned after a delay, for overlap tests.
    Slow(u64, Vec<ContentItem>),
}

pub struct ScriptedSource {
    pub sites: HashMap<String, SiteScript>,
}

impl ScriptedSource {
    pub fn new(sites: Vec<(&str, SiteScript)>) -> Self {
        Self {
            sites: sites
                .into_iter()
                .map(|(url, script)| (url.to_string(), script))
                .collect(),
        }
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch(&self, site_url: &str) -> Result<Vec<ContentItem>> {
        match self.sites.get(site_url) {
            Some(SiteScript::Items(items)) => Ok(items.clone()),
            Some(SiteScript::Timeout) => Err(CorrespondentError::FetchExhausted {
                url: site_url.to_string(),
                attempts: 3,
                reason: "operation timed out".to_string(),
            }),
            Some(SiteScript::Slow(delay_ms, items)) => {
                tokio::time::sleep(std::time::Duration::from_millis(*delay_ms)).await;
                Ok(items.clone())
            }
            None => Ok(Vec::new()),
        }
    }
}

pub struct RecordingDelivery {
    reports: Mutex<Vec<Report>>,
    pub fail: AtomicBool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn delivered(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, report: &Report, user: &User) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CorrespondentError::Delivery(format!(
                "transport refused for {}",
                user.email
            )));
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

pub fn item(site: &str, id: &str, title: &str, body: &str, age_hours: i64) -> ContentItem {
    ContentItem {
        source: site.to_string(),
        id: id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        published: Utc::now() - Duration::hours(age_hours),
    }
}

pub async fn memory_pool() -> SqlitePool {
    correspondent::db::connect("sqlite::memory:")
        .await
        .expect("in-memory database")
}

pub async fn seed_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    interests: &str,
    sites: &str,
) -> User {
    SqliteRoster::new(pool.clone())
        .add_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            interests: interests.to_string(),
            sites: sites.to_string(),
        })
        .await
        .expect("seed user")
}

pub fn orchestrator(
    pool: SqlitePool,
    source: Arc<dyn ContentSource>,
    delivery: Arc<dyn Delivery>,
) -> ReportOrchestrator {
    ReportOrchestrator::new(
        Arc::new(SqliteRoster::new(pool.clone())),
        source,
        Arc::new(SqliteSeenStore::new(pool)),
        delivery,
        RunConfig::default(),
        ComposeConfig::default(),
    )
}
