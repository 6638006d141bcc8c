use crate::types::{CorrespondentError, NewUser, Result, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use url::Url;
use uuid::Uuid;

/// Roster collaborator consumed by the orchestrator at the start of each run.
/// A roster failure aborts the whole run, so implementations surface their
/// errors as `CorrespondentError::Roster`.
#[async_trait]
pub trait Roster: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn add_user(&self, input: NewUser) -> Result<User>;
}

pub struct SqliteRoster {
    db: SqlitePool,
}

impl SqliteRoster {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Roster for SqliteRoster {
    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, name, email, interests, sites, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| CorrespondentError::Roster(e.to_string()))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn add_user(&self, input: NewUser) -> Result<User> {
        let user = validate_user(input)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, interests, sites, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(serde_json::to_string(&user.interests)?)
        .bind(serde_json::to_string(&user.sites)?)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| CorrespondentError::Roster(e.to_string()))?;

        info!("added user {} ({})", user.name, user.id);
        Ok(user)
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let id: String = get_column(row, "id")?;
    let interests: String = get_column(row, "interests")?;
    let sites: String = get_column(row, "sites")?;
    let created_at: DateTime<Utc> = get_column(row, "created_at")?;

    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| CorrespondentError::Roster(e.to_string()))?,
        name: get_column(row, "name")?,
        email: get_column(row, "email")?,
        interests: serde_json::from_str(&interests)?,
        sites: serde_json::from_str(&sites)?,
        created_at,
    })
}

fn get_column<'r, T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>>(
    row: &'r SqliteRow,
    name: &str,
) -> Result<T> {
    row.try_get(name)
        .map_err(|e| CorrespondentError::Roster(e.to_string()))
}

/// Validate raw form input and build a `User`. Name and email are required,
/// interests and sites must be non-empty after parsing the comma-separated
/// input. Interests are lowercased and deduplicated; sites must parse as
/// absolute URLs and are deduplicated by their canonical form.
pub fn validate_user(input: NewUser) -> Result<User> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CorrespondentError::InvalidUser("name is required".to_string()));
    }

    let email = input.email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(CorrespondentError::InvalidUser(format!(
            "email {:?} is not well-formed",
            email
        )));
    }

    Ok(User {
        id: Uuid::new_v4(),
        name,
        email,
        interests: parse_interests(&input.interests)?,
        sites: parse_sites(&input.sites)?,
        created_at: Utc::now(),
    })
}

pub fn parse_interests(raw: &str) -> Result<Vec<String>> {
    let mut interests: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    interests.sort();
    interests.dedup();

    if interests.is_empty() {
        return Err(CorrespondentError::InvalidUser(
            "at least one interest keyword is required".to_string(),
        ));
    }
    Ok(interests)
}

pub fn parse_sites(raw: &str) -> Result<Vec<String>> {
    let mut sites = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let canonical = Url::parse(part)?.to_string();
        if !sites.contains(&canonical) {
            sites.push(canonical);
        }
    }

    if sites.is_empty() {
        return Err(CorrespondentError::InvalidUser(
            "at least one site URL is required".to_string(),
        ));
    }
    Ok(sites)
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
