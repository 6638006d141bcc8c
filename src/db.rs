use crate::types::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

/// Open (creating if missing) the SQLite database and initialize the schema.
/// A single pooled connection: SQLite allows one writer at a time, and it keeps
/// `sqlite::memory:` databases visible to every caller of the pool.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    // Accept a bare file path as well as a sqlite: URL.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}", database_url)
    };
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    debug!("database ready at {}", url);

    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            interests TEXT NOT NULL,
            sites TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seen_items (
            user_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            delivered_at TEXT NOT NULL,
            PRIMARY KEY (user_id, item_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_seen_delivered_at ON seen_items (delivered_at)")
        .execute(pool)
        .await?;

    Ok(())
}
