use sqlx::SqlitePool;
use tracing::debug;

use crate::domain::entities::catalog::{KeywordScan, StopReason};
use crate::persistence::models::{ScanRecord, SnapshotRecord};
use crate::persistence::DatabaseError;

fn stop_reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::LastPage => "last_page",
        StopReason::MaxPages => "max_pages",
    }
}

/// Repository for keyword scan history
pub struct PositionRepository {
    pool: SqlitePool,
}

impl PositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PositionRepository { pool }
    }

    /// Persist a scan and all of its hits in one transaction. Returns the
    /// scan id.
    pub async fn save_scan(&self, scan: &KeywordScan) -> Result<i64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let scan_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO keyword_scans
            (query, products_seen, pages_visited, pages_failed, hit_count,
             average_position, stop_reason, scanned_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&scan.query)
        .bind(scan.products_seen as i64)
        .bind(scan.pages_visited as i64)
        .bind(scan.pages_failed as i64)
        .bind(scan.hits.len() as i64)
        .bind(scan.average_position())
        .bind(stop_reason_label(scan.stop_reason))
        .bind(scan.scanned_at)
        .fetch_one(&mut *tx)
        .await?;

        for hit in &scan.hits {
            sqlx::query(
                r#"
                INSERT INTO position_snapshots
                (scan_id, query, article_id, position, promo_position, page,
                 seller, brand, price, scanned_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(scan_id)
            .bind(&hit.query)
            .bind(&hit.article_id)
            .bind(hit.position as i64)
            .bind(hit.promo_position.map(i64::from))
            .bind(hit.page as i64)
            .bind(&hit.seller)
            .bind(&hit.brand)
            .bind(hit.price)
            .bind(scan.scanned_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(query = %scan.query, scan_id = scan_id, hits = scan.hits.len(), "Scan saved");

        Ok(scan_id)
    }

    /// Most recent snapshots for a keyword, newest first
    pub async fn recent_snapshots(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<SnapshotRecord>, DatabaseError> {
        let rows = sqlx::query_as::<_, SnapshotRecord>(
            r#"
            SELECT id, scan_id, query, article_id, position, promo_position, page,
                   seller, brand, price, scanned_at
            FROM position_snapshots
            WHERE query = ?
            ORDER BY scanned_at DESC, scan_id DESC, position ASC
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Scan summaries for a keyword, newest first
    pub async fn scan_history(&self, query: &str, limit: i64) -> Result<Vec<ScanRecord>, DatabaseError> {
        let rows = sqlx::query_as::<_, ScanRecord>(
            r#"
            SELECT id, query, products_seen, pages_visited, pages_failed, hit_count,
                   average_position, stop_reason, scanned_at
            FROM keyword_scans
            WHERE query = ?
            ORDER BY scanned_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::catalog::PositionHit;
    use crate::persistence::init_database;
    use chrono::{Duration, Utc};

    fn hit(query: &str, position: u32) -> PositionHit {
        PositionHit {
            query: query.to_string(),
            position,
            page: (position - 1) / 100 + 1,
            article_id: Some(format!("{}", 1000 + position)),
            name: "Case".to_string(),
            brand: "Yalow".to_string(),
            seller: "YalowShop".to_string(),
            seller_id: Some("42".to_string()),
            promo_position: if position == 3 { Some(1) } else { None },
            price: Some(459.0),
            link: None,
        }
    }

    fn scan(query: &str, positions: &[u32], minutes_ago: i64) -> KeywordScan {
        KeywordScan {
            query: query.to_string(),
            hits: positions.iter().map(|p| hit(query, *p)).collect(),
            products_seen: 300,
            pages_visited: 3,
            pages_failed: 0,
            stop_reason: StopReason::LastPage,
            scanned_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    async fn repository() -> PositionRepository {
        let pool = init_database("sqlite::memory:").await.unwrap();
        PositionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_save_and_read_history() {
        let repo = repository().await;
        repo.save_scan(&scan("case", &[3, 150], 10)).await.unwrap();
        let latest = repo.save_scan(&scan("case", &[5], 0)).await.unwrap();
        repo.save_scan(&scan("cover", &[1], 0)).await.unwrap();

        let history = repo.scan_history("case", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, latest);
        assert_eq!(history[0].hit_count, 1);
        assert_eq!(history[1].average_position, Some(76.5));
        assert_eq!(history[1].stop_reason, "last_page");

        let snapshots = repo.recent_snapshots("case", 10).await.unwrap();
        let positions: Vec<i64> = snapshots.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![5, 3, 150]);
        assert_eq!(snapshots[1].promo_position, Some(1));
        assert_eq!(snapshots[2].page, 2);
    }

    #[tokio::test]
    async fn test_scan_without_hits() {
        let repo = repository().await;
        repo.save_scan(&scan("nothing", &[], 0)).await.unwrap();

        let history = repo.scan_history("nothing", 5).await.unwrap();
        assert_eq!(history[0].hit_count, 0);
        assert_eq!(history[0].average_position, None);
        assert!(repo.recent_snapshots("nothing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limit() {
        let repo = repository().await;
        repo.save_scan(&scan("case", &[1, 2, 3], 0)).await.unwrap();

        assert_eq!(repo.recent_snapshots("case", 2).await.unwrap().len(), 2);
    }
}
