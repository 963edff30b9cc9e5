//! Keyword position tracking with optional history persistence.

use tracing::{error, info, warn};

use crate::domain::entities::catalog::KeywordScan;
use crate::domain::services::position_tracker::PositionTracker;
use crate::persistence::position_repository::PositionRepository;

pub struct PositionService {
    tracker: PositionTracker,
    repository: Option<PositionRepository>,
}

impl PositionService {
    pub fn new(tracker: PositionTracker, repository: Option<PositionRepository>) -> Self {
        Self {
            tracker,
            repository,
        }
    }

    /// Scan every keyword and store the results. A storage failure is logged
    /// and does not discard the scan.
    pub async fn track(&self, queries: &[String]) -> Vec<KeywordScan> {
        if self.tracker.target().is_empty() {
            warn!("No seller names, ids or brands configured; no product can match");
        }

        let scans = self.tracker.scan_all(queries).await;

        if let Some(repository) = &self.repository {
            for scan in &scans {
                if let Err(e) = repository.save_scan(scan).await {
                    error!(query = %scan.query, error = %e, "Failed to save scan");
                }
            }
        }

        let found = scans.iter().filter(|s| !s.hits.is_empty()).count();
        info!(keywords = scans.len(), found = found, "Position tracking finished");
        scans
    }
}
