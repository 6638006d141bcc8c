use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A roster member. Immutable for the duration of a report run; the roster
/// collaborator mutates users only between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub interests: Vec<String>,
    #[serde(rename = "sites_of_interest")]
    pub sites: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw form input for creating a user. Interests and sites arrive as
/// comma-separated strings and are parsed and validated by the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub interests: String,
    pub sites: String,
}

/// A normalized content item produced by the content source adapter.
/// Transient within a run, never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Site URL the item was fetched from.
    pub source: String,
    /// Stable identifier: entry GUID, falling back to the canonical link.
    pub id: String,
    pub title: String,
    pub body: String,
    pub published: DateTime<Utc>,
}

/// A content item that matched at least one of the user's interest keywords.
/// Invariant: score > 0 and matched_keywords is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub item: ContentItem,
    pub score: f64,
    pub matched_keywords: Vec<String>,
}

/// One user's composed digest for a run. Ordered highest score first, ties
/// broken by most recent published timestamp, then by item id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    pub items: Vec<MatchResult>,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

/// Aggregate counts returned by a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub users_processed: u64,
    pub users_failed: u64,
    pub items_delivered: u64,
    pub site_failures: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Total attempts per site, including the first.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "correspondent/0.1".to_string(),
            timeout_seconds: 30,
            max_attempts: 3,
            backoff_base_ms: 200,
            backoff_cap_ms: 5_000,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Report size cap. Truncation drops the lowest-ranked items.
    pub max_items: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self { max_items: 20 }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Fetch slots shared across all users in a run.
    pub max_concurrent_fetches: usize,
    /// Fetch slots per remote host.
    pub per_host_fetches: usize,
    /// Seen records older than this are pruned after a run.
    pub retention_days: i64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            per_host_fetches: 2,
            retention_days: 90,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CorrespondentError {
    #[error("transient fetch failure for {url}: {reason}")]
    TransientFetch { url: String, reason: String },

    #[error("permanent fetch failure for {url}: {reason}")]
    PermanentFetch { url: String, reason: String },

    #[error("fetch gave up on {url} after {attempts} attempts: {reason}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("seen-item store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("roster unavailable: {0}")]
    Roster(String),

    #[error("invalid user input: {0}")]
    InvalidUser(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("a report run is already in progress")]
    RunInProgress,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, CorrespondentError>;
