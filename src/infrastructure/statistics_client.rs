//! HTTP client for the seller statistics API.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::StatsConfig;
use crate::domain::entities::record::FeedRecord;
use crate::domain::errors::{FeedError, FeedResult};
use crate::domain::repositories::{FeedEndpoint, StatisticsFeed};
use crate::retry::{with_retry, RetryPolicy};
use crate::secrets::ApiToken;

/// Statistics API client
pub struct StatisticsClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl StatisticsClient {
    pub fn new(config: &StatsConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
        })
    }

    fn endpoint_url(&self, endpoint: FeedEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    async fn request_once(
        &self,
        token: &ApiToken,
        url: &str,
        date_from: &str,
    ) -> FeedResult<Vec<FeedRecord>> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token.bearer().as_str())
            .header(ACCEPT, "application/json")
            .query(&[("dateFrom", date_from), ("flag", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::from_status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_records(&body)
    }
}

/// Decode a response body that must be a JSON array of records
pub fn parse_records(body: &str) -> FeedResult<Vec<FeedRecord>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(items.into_iter().map(FeedRecord::from_value).collect()),
        other => Err(FeedError::Malformed(format!(
            "expected a JSON array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl StatisticsFeed for StatisticsClient {
    async fn fetch(
        &self,
        token: &ApiToken,
        endpoint: FeedEndpoint,
        date_from: NaiveDate,
    ) -> FeedResult<Vec<FeedRecord>> {
        let url = self.endpoint_url(endpoint);
        let date_from = date_from.format("%Y-%m-%d").to_string();
        debug!(endpoint = %endpoint, date_from = %date_from, "Requesting statistics");

        let records = with_retry(&endpoint.to_string(), &self.retry, |_| {
            self.request_once(token, &url, &date_from)
        })
        .await?;

        info!(endpoint = %endpoint, records = records.len(), "Statistics received");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_array() {
        let records = parse_records(r#"[{"odid": 1, "priceWithDisc": 10}, {"srid": "x"}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_id.as_deref(), Some("1"));
        assert_eq!(records[0].price, 10.0);
    }

    #[test]
    fn test_parse_records_rejects_other_shapes() {
        assert!(matches!(
            parse_records(r#"{"errors": ["bad"]}"#),
            Err(FeedError::Malformed(msg)) if msg.contains("an object")
        ));
        assert!(matches!(parse_records("<html>"), Err(FeedError::Malformed(_))));
        assert_eq!(parse_records("[]").unwrap(), vec![]);
    }

    #[test]
    fn test_endpoint_url() {
        let config = StatsConfig {
            base_url: "http://127.0.0.1:9000/api/".to_string(),
            ..StatsConfig::default()
        };
        let client = StatisticsClient::new(&config).unwrap();
        assert_eq!(client.endpoint_url(FeedEndpoint::Sales), "http://127.0.0.1:9000/api/sales");
    }
}
