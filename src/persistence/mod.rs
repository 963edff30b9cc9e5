//! Persistence Layer
//!
//! SQLite storage for keyword scan history, via sqlx.
//!
//! # Database Schema
//!
//! ## keyword_scans
//! - id: Serial
//! - query: Search keyword
//! - products_seen, pages_visited, pages_failed: Scan counters
//! - hit_count: Number of tracked products found
//! - average_position: Mean rank of the hits, NULL when nothing was found
//! - stop_reason: "last_page" or "max_pages"
//! - scanned_at: Timestamp
//!
//! ## position_snapshots
//! - id: Serial
//! - scan_id: Foreign key to keyword_scans
//! - query, article_id, position, promo_position, page
//! - seller, brand, price
//! - scanned_at: Timestamp

pub mod models;
pub mod position_repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: SQLite URL, e.g. "sqlite://data/seller_pulse.db" or
///   "sqlite::memory:"
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    init_with_config(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

pub async fn init_with_config(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    // Every connection to an in-memory database opens its own empty database
    let max_connections = if config.url.contains(":memory:") {
        1
    } else {
        config.max_connections.max(1)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keyword_scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            products_seen INTEGER NOT NULL,
            pages_visited INTEGER NOT NULL,
            pages_failed INTEGER NOT NULL,
            hit_count INTEGER NOT NULL,
            average_position REAL,
            stop_reason TEXT NOT NULL CHECK(stop_reason IN ('last_page', 'max_pages')),
            scanned_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create keyword_scans table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS position_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scan_id INTEGER NOT NULL,
            query TEXT NOT NULL,
            article_id TEXT,
            position INTEGER NOT NULL,
            promo_position INTEGER,
            page INTEGER NOT NULL,
            seller TEXT NOT NULL,
            brand TEXT NOT NULL,
            price REAL,
            scanned_at DATETIME NOT NULL,
            FOREIGN KEY (scan_id) REFERENCES keyword_scans(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create position_snapshots table: {}", e))
    })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scans_query_time ON keyword_scans(query, scanned_at)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_query_time ON position_snapshots(query, scanned_at)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_scan ON position_snapshots(scan_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("Database migrations completed");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/seller_pulse.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/seller_pulse.db".to_string(),
            max_connections: 5,
        }
    }
}
