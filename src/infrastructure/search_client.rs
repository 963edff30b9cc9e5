//! HTTP client for the public catalog search.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::SearchConfig;
use crate::domain::entities::catalog::CatalogProduct;
use crate::domain::errors::{FeedError, FeedResult};
use crate::domain::repositories::SearchCatalog;
use crate::retry::{with_retry, RetryPolicy};

const SITE_ORIGIN: &str = "https://www.wildberries.ru";
const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct SearchClient {
    client: Client,
    endpoint: String,
    dest: String,
    sort: String,
    spp: String,
    user_agents: Vec<String>,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            dest: config.dest.clone(),
            sort: config.sort.clone(),
            spp: config.spp.to_string(),
            user_agents: config.user_agents.clone(),
            retry: config.retry.clone(),
        })
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_USER_AGENT)
    }

    async fn request_once(&self, query: &str, page: u32) -> FeedResult<Vec<CatalogProduct>> {
        let user_agent = self.pick_user_agent().to_string();
        let page = page.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "application/json")
            .header(ORIGIN, SITE_ORIGIN)
            .header(REFERER, format!("{}/", SITE_ORIGIN))
            .query(&[
                ("appType", "1"),
                ("curr", "rub"),
                ("dest", self.dest.as_str()),
                ("query", query),
                ("resultset", "catalog"),
                ("sort", self.sort.as_str()),
                ("spp", self.spp.as_str()),
                ("suppressSpellcheck", "false"),
                ("page", page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::from_status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_products(&body)
    }
}

/// Read `data.products` from a search response. A response without products
/// is an empty page.
pub fn parse_products(body: &str) -> FeedResult<Vec<CatalogProduct>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let products = value
        .get("data")
        .and_then(|data| data.get("products"))
        .and_then(Value::as_array)
        .map(|items| items.iter().map(CatalogProduct::from_value).collect())
        .unwrap_or_default();

    Ok(products)
}

#[async_trait]
impl SearchCatalog for SearchClient {
    async fn fetch_page(&self, query: &str, page: u32) -> FeedResult<Vec<CatalogProduct>> {
        let operation = format!("search page {}", page);
        let products = with_retry(&operation, &self.retry, |_| self.request_once(query, page)).await?;
        debug!(query = %query, page = page, products = products.len(), "Search page received");
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let body = r#"{"data": {"products": [
            {"id": 1, "supplier": "A", "log": {"position": 4}},
            {"id": 2, "supplier": "B"}
        ]}}"#;
        let products = parse_products(body).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].organic_position, Some(4));
        assert_eq!(products[1].supplier, "B");
    }

    #[test]
    fn test_parse_products_without_data() {
        assert_eq!(parse_products(r#"{"state": 0}"#).unwrap(), vec![]);
        assert!(matches!(parse_products("not json"), Err(FeedError::Malformed(_))));
    }

    #[test]
    fn test_user_agent_rotation_falls_back() {
        let config = SearchConfig {
            user_agents: vec![],
            ..SearchConfig::default()
        };
        let client = SearchClient::new(&config).unwrap();
        assert_eq!(client.pick_user_agent(), FALLBACK_USER_AGENT);

        let client = SearchClient::new(&SearchConfig::default()).unwrap();
        assert!(config_agents().contains(&client.pick_user_agent().to_string()));
    }

    fn config_agents() -> Vec<String> {
        SearchConfig::default().user_agents
    }
}
