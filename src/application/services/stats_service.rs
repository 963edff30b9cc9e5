//! Daily report service
//!
//! Fetches the three statistics feeds for one seller, reconciles them and
//! caches the serialized report. A cache hit returns the stored JSON as is.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::entities::record::FeedRecord;
use crate::domain::entities::report::DailyReport;
use crate::domain::errors::FeedError;
use crate::domain::repositories::{CacheStore, FeedEndpoint, StatisticsFeed};
use crate::domain::services::order_reconciliation::{reconcile, Reconciliation};
use crate::domain::services::sales_summary::build_report;
use crate::secrets::{ApiToken, TokenProvider};

const CACHE_KEY_PREFIX: &str = "wb_daily_report";

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("No API token configured for actor '{actor}'")]
    NotConfigured { actor: String },

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Statistics feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Report cache lifetimes and preview size
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub report_ttl: Duration,
    pub error_ttl: Duration,
    pub display_limit: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            report_ttl: Duration::from_secs(20 * 60),
            error_ttl: Duration::from_secs(5 * 60),
            display_limit: 8,
        }
    }
}

impl ReportSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            report_ttl: config.cache.report_ttl,
            error_ttl: config.cache.error_ttl,
            display_limit: config.stats.display_limit,
        }
    }
}

pub fn cache_key(actor: &str, date: NaiveDate) -> String {
    format!("{}:{}:{}", CACHE_KEY_PREFIX, actor, date.format("%Y-%m-%d"))
}

pub struct StatsService {
    feed: Arc<dyn StatisticsFeed>,
    cache: Arc<dyn CacheStore>,
    tokens: Arc<dyn TokenProvider>,
    settings: ReportSettings,
}

impl StatsService {
    pub fn new(
        feed: Arc<dyn StatisticsFeed>,
        cache: Arc<dyn CacheStore>,
        tokens: Arc<dyn TokenProvider>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            feed,
            cache,
            tokens,
            settings,
        }
    }

    fn token(&self, actor: &str) -> Result<ApiToken, StatsError> {
        self.tokens.token_for(actor).map_err(|e| {
            warn!(actor = %actor, error = %e, "API token unavailable");
            StatsError::NotConfigured {
                actor: actor.to_string(),
            }
        })
    }

    /// Report for `actor` on `date` as JSON, served from the cache when
    /// possible. Upstream failures that reject the token produce a failed
    /// report, cached for the shorter error TTL.
    pub async fn daily_report_json(&self, actor: &str, date: NaiveDate) -> Result<String, StatsError> {
        let token = self.token(actor)?;
        let key = cache_key(actor, date);

        if let Some(cached) = self.cache.get(&key).await {
            info!(actor = %actor, date = %date, "Serving report from cache");
            return Ok(cached);
        }

        let (report, ttl) = match self.collect(&token, date).await {
            Ok(reconciliation) => (
                build_report(actor, date, &reconciliation, self.settings.display_limit),
                self.settings.report_ttl,
            ),
            Err(e) => {
                warn!(actor = %actor, date = %date, error = %e, "Report failed");
                (DailyReport::failed(actor, date, e.to_string()), self.settings.error_ttl)
            }
        };

        let json = serde_json::to_string(&report)?;
        self.cache.set(&key, json.clone(), ttl).await;

        info!(
            actor = %actor,
            date = %date,
            orders = report.orders.count,
            sales = report.sales.count,
            cancellations = report.cancellations.count,
            returns = report.returns.count,
            "Report generated"
        );
        Ok(json)
    }

    pub async fn daily_report(&self, actor: &str, date: NaiveDate) -> Result<DailyReport, StatsError> {
        let json = self.daily_report_json(actor, date).await?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Full record sets for `date`, bypassing the cache
    pub async fn reconcile_day(&self, actor: &str, date: NaiveDate) -> Result<Reconciliation, StatsError> {
        let token = self.token(actor)?;
        Ok(self.collect(&token, date).await?)
    }

    /// Drop the cached report. Returns whether an entry existed.
    pub async fn clear(&self, actor: &str, date: NaiveDate) -> bool {
        let removed = self.cache.delete(&cache_key(actor, date)).await;
        info!(actor = %actor, date = %date, removed = removed, "Report cache cleared");
        removed
    }

    async fn collect(&self, token: &ApiToken, date: NaiveDate) -> Result<Reconciliation, FeedError> {
        let orders = self.fetch_or_empty(token, FeedEndpoint::Orders, date).await?;
        let sales = self.fetch_or_empty(token, FeedEndpoint::Sales, date).await?;
        let returns = self.fetch_or_empty(token, FeedEndpoint::Returns, date).await?;
        Ok(reconcile(orders, sales, returns))
    }

    /// Records of one endpoint. Only a rejected token is an error; any other
    /// failure yields no records.
    async fn fetch_or_empty(
        &self,
        token: &ApiToken,
        endpoint: FeedEndpoint,
        date: NaiveDate,
    ) -> Result<Vec<FeedRecord>, FeedError> {
        match self.feed.fetch(token, endpoint, date).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "No data from endpoint");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_cache::MemoryCache;
    use crate::secrets::StaticTokenProvider;
    use async_trait::async_trait;
    use serde_json::json;

    struct RejectingFeed;

    #[async_trait]
    impl StatisticsFeed for RejectingFeed {
        async fn fetch(
            &self,
            _token: &ApiToken,
            endpoint: FeedEndpoint,
            _date_from: NaiveDate,
        ) -> Result<Vec<FeedRecord>, FeedError> {
            match endpoint {
                FeedEndpoint::Orders => Ok(vec![FeedRecord::from_value(json!({"odid": 1, "price": 10}))]),
                FeedEndpoint::Sales => Err(FeedError::Status(400)),
                FeedEndpoint::Returns => Err(FeedError::Unauthorized(401)),
            }
        }
    }

    fn service() -> StatsService {
        let tokens = StaticTokenProvider::new().with_token("shop", ApiToken::new("t").unwrap());
        StatsService::new(
            Arc::new(RejectingFeed),
            Arc::new(MemoryCache::new(16)),
            Arc::new(tokens),
            ReportSettings::default(),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("shop", day()), "wb_daily_report:shop:2024-03-01");
    }

    #[tokio::test]
    async fn test_rejected_token_fails_report() {
        let report = service().daily_report("shop", day()).await.unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.orders.count, 0);
    }

    #[tokio::test]
    async fn test_reconcile_day_propagates_fatal_error() {
        let result = service().reconcile_day("shop", day()).await;
        assert!(matches!(result, Err(StatsError::Feed(FeedError::Unauthorized(401)))));
    }

    #[tokio::test]
    async fn test_unknown_actor_is_not_configured() {
        let result = service().daily_report_json("other", day()).await;
        assert!(matches!(result, Err(StatsError::NotConfigured { actor }) if actor == "other"));
    }
}
