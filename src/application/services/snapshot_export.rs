//! Raw snapshot of a reconciled day, written for offline inspection.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::entities::record::FeedRecord;
use crate::domain::services::order_reconciliation::Reconciliation;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct Snapshot<'a> {
    timestamp: String,
    actor: &'a str,
    date: String,
    orders: &'a [FeedRecord],
    real_sales: &'a [FeedRecord],
    cancellations: &'a [FeedRecord],
    returns: &'a [FeedRecord],
}

/// Render the snapshot as pretty-printed JSON. Records are written exactly as
/// they were received.
pub fn render_snapshot(
    actor: &str,
    date: NaiveDate,
    reconciliation: &Reconciliation,
) -> Result<String, ExportError> {
    let snapshot = Snapshot {
        timestamp: Utc::now().to_rfc3339(),
        actor,
        date: date.format("%Y-%m-%d").to_string(),
        orders: &reconciliation.orders,
        real_sales: &reconciliation.real_sales,
        cancellations: &reconciliation.cancellations,
        returns: &reconciliation.returns,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

pub async fn export_snapshot(
    path: &Path,
    actor: &str,
    date: NaiveDate,
    reconciliation: &Reconciliation,
) -> Result<(), ExportError> {
    let json = render_snapshot(actor, date, reconciliation)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), actor = %actor, "Snapshot exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::order_reconciliation::reconcile;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_export_keeps_raw_records() {
        let rec = reconcile(
            vec![
                FeedRecord::from_value(json!({"odid": 1, "priceWithDisc": "100", "extra": true})),
                FeedRecord::from_value(json!({"odid": 2, "priceWithDisc": 50})),
            ],
            vec![FeedRecord::from_value(json!({"odid": "1", "priceWithDisc": 100}))],
            vec![],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        export_snapshot(&path, "shop", date, &rec).await.unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["actor"], "shop");
        assert_eq!(written["date"], "2024-03-01");
        assert_eq!(written["orders"][0], json!({"odid": 1, "priceWithDisc": "100", "extra": true}));
        assert_eq!(written["cancellations"].as_array().unwrap().len(), 1);
        assert_eq!(written["real_sales"][0]["odid"], "1");
        assert!(written["timestamp"].is_string());
    }
}
