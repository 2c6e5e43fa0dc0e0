//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and hands out repositories.

use std::path::Path;

use chrono::Utc;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::debug;

use super::history::DieselHistoryRepository;
use super::models::NewPlatform;
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::format_datetime;
use crate::schema::platforms;

/// Platforms seeded on first initialization: (name, color, logo).
pub const KNOWN_PLATFORMS: &[(&str, &str, &str)] = &[
    ("Netflix", "#E50914", "/logos/netflix.svg"),
    ("YouTube TV", "#FF0000", "/logos/youtube-tv.svg"),
    ("YouTube", "#FF0000", "/logos/youtube.svg"),
    ("Amazon Video", "#00A8E1", "/logos/amazon-video.svg"),
    ("HBO Max", "#7B3FF2", "/logos/hbo-max.svg"),
    ("Apple TV+", "#000000", "/logos/apple-tv.svg"),
    ("Peacock", "#000000", "/logos/peacock.svg"),
];

const SQLITE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS platforms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        color TEXT NOT NULL DEFAULT '#000000',
        logo_url TEXT NOT NULL DEFAULT '',
        enabled BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS activity_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        platform_id INTEGER NOT NULL REFERENCES platforms(id),
        title TEXT NOT NULL,
        episode_info TEXT,
        watched_at TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL DEFAULT 0,
        thumbnail_url TEXT,
        genre TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(platform_id, title, watched_at)
    );

    CREATE TABLE IF NOT EXISTS run_outcomes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        platform_id INTEGER NOT NULL REFERENCES platforms(id),
        started_at TEXT NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        items_scraped INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_activity_platform ON activity_records(platform_id);
    CREATE INDEX IF NOT EXISTS idx_activity_watched_at ON activity_records(watched_at);
    CREATE INDEX IF NOT EXISTS idx_run_outcomes_platform ON run_outcomes(platform_id);
"#;

/// Database context that manages the connection factory and provides repository access.
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL (`sqlite:` prefix optional).
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(url),
        }
    }

    /// Get the underlying connection factory.
    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Get the watch-history repository.
    pub fn history(&self) -> DieselHistoryRepository {
        DieselHistoryRepository::new(self.pool.clone())
    }

    /// Create tables if missing and seed the known platforms.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(SQLITE_SCHEMA).await?;

        let now = format_datetime(&Utc::now());
        for &(name, color, logo_url) in KNOWN_PLATFORMS {
            let inserted = diesel::insert_or_ignore_into(platforms::table)
                .values(NewPlatform {
                    name,
                    color,
                    logo_url,
                    enabled: true,
                    created_at: &now,
                })
                .execute(&mut conn)
                .await?;
            if inserted > 0 {
                debug!("Seeded platform {}", name);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::HistoryStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_schema_is_repeatable() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));

        ctx.init_schema().await.unwrap();
        ctx.init_schema().await.unwrap();

        let platforms = ctx.history().list_platforms().await.unwrap();
        assert_eq!(platforms.len(), KNOWN_PLATFORMS.len());
        assert!(platforms.iter().any(|p| p.name == "YouTube TV"));
    }
}
