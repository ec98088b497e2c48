//! Database connection pool and per-entity service access

pub mod schema_sync;
pub mod sqlite_helpers;

use std::str::FromStr;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::entities::{Tag, User};
use crate::orm::DataService;

pub use schema_sync::{SchemaSyncResult, sync_all_entity_schemas};

/// Handle on the SQLite pool, cloned freely across the app.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Wrap an already-connected pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Pool size, overridable through DATABASE_MAX_CONNECTIONS.
    fn get_max_connections() -> u32 {
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10)
    }

    /// Create a new database connection pool.
    ///
    /// Accepts a plain path or a `sqlite:` URL. The database file is created
    /// if missing, and foreign keys are enforced so join-table rows can only
    /// point at real entities.
    pub async fn connect(url: &str) -> Result<Self> {
        // from_str needs a sqlite: scheme; a bare path is used as a filename
        let options = if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url)?
        } else {
            if let Some(parent) = std::path::Path::new(url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectOptions::new().filename(url)
        };
        let options = options.create_if_missing(true).foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(Self::get_max_connections())
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Data service over the users table.
    pub fn users(&self) -> DataService<User> {
        DataService::new(self.pool.clone())
    }

    /// Data service over the tags table.
    pub fn tags(&self) -> DataService<Tag> {
        DataService::new(self.pool.clone())
    }

    /// Bring every entity table and join table up to date
    pub async fn sync_schema(&self) -> SchemaSyncResult {
        sync_all_entity_schemas(&self.pool).await
    }
}
