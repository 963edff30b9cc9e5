//! Database Models
//!
//! Rows of the keyword scan history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One keyword scan in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanRecord {
    pub id: i64,
    pub query: String,
    pub products_seen: i64,
    pub pages_visited: i64,
    pub pages_failed: i64,
    pub hit_count: i64,
    pub average_position: Option<f64>,
    pub stop_reason: String, // "last_page" or "max_pages"
    pub scanned_at: DateTime<Utc>,
}

/// Position of one tracked product at scan time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRecord {
    pub id: i64,
    pub scan_id: i64,
    pub query: String,
    pub article_id: Option<String>,
    pub position: i64,
    pub promo_position: Option<i64>,
    pub page: i64,
    pub seller: String,
    pub brand: String,
    pub price: Option<f64>,
    pub scanned_at: DateTime<Utc>,
}
