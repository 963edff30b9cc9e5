use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::entities::catalog::{CatalogProduct, KeywordScan, PositionHit, StopReason};
use crate::domain::entities::fields::coerce_identifier;
use crate::domain::repositories::SearchCatalog;

/// The seller whose products are looked for in the search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerTarget {
    /// Matched as case-insensitive substrings of the seller name
    pub names: Vec<String>,
    /// Matched against the seller id
    pub ids: Vec<String>,
    /// Matched case-insensitively against the whole brand
    pub brands: Vec<String>,
}

impl SellerTarget {
    pub fn is_empty(&self) -> bool {
        self.names.iter().all(|n| n.trim().is_empty())
            && self.ids.iter().all(|i| i.trim().is_empty())
            && self.brands.iter().all(|b| b.trim().is_empty())
    }

    pub fn matches(&self, product: &CatalogProduct) -> bool {
        let seller = product.supplier.to_lowercase();
        let by_name = self
            .names
            .iter()
            .map(|n| n.trim().to_lowercase())
            .any(|n| !n.is_empty() && seller.contains(&n));
        if by_name {
            return true;
        }

        if let Some(seller_id) = &product.supplier_id {
            let by_id = self
                .ids
                .iter()
                .filter_map(|id| coerce_identifier(&Value::String(id.clone())))
                .any(|id| &id == seller_id);
            if by_id {
                return true;
            }
        }

        let brand = product.brand.trim().to_lowercase();
        !brand.is_empty()
            && self
                .brands
                .iter()
                .any(|b| b.trim().to_lowercase() == brand)
    }
}

/// Pagination limits of a keyword scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    /// Products per full page; a shorter page is the last one
    pub page_size: usize,
    pub max_pages: u32,
    /// Pause between page requests
    pub page_delay: Duration,
    /// Upper bound of the random extra pause added to `page_delay`
    pub max_jitter: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 5,
            page_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl ScanSettings {
    fn next_delay(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.page_delay + Duration::from_millis(jitter)
    }
}

/// Walks search result pages and records where the target's products rank
pub struct PositionTracker {
    catalog: Arc<dyn SearchCatalog>,
    target: SellerTarget,
    settings: ScanSettings,
}

impl PositionTracker {
    pub fn new(catalog: Arc<dyn SearchCatalog>, target: SellerTarget, settings: ScanSettings) -> Self {
        Self {
            catalog,
            target,
            settings,
        }
    }

    pub fn target(&self) -> &SellerTarget {
        &self.target
    }

    /// Scan one keyword. Pages that fail are skipped; the scan itself never
    /// fails.
    pub async fn scan(&self, query: &str) -> KeywordScan {
        let page_size = self.settings.page_size.max(1);
        let mut hits = Vec::new();
        let mut products_seen = 0u32;
        let mut pages_visited = 0u32;
        let mut pages_failed = 0u32;
        let mut rank_offset = 0u32;
        let mut stop_reason = StopReason::MaxPages;

        info!(query = %query, max_pages = self.settings.max_pages, "Scanning search positions");

        for page in 1..=self.settings.max_pages {
            if page > 1 {
                sleep(self.settings.next_delay()).await;
            }

            let products = match self.catalog.fetch_page(query, page).await {
                Ok(products) => products,
                Err(e) => {
                    warn!(query = %query, page = page, error = %e, "Search page failed, skipping");
                    pages_failed += 1;
                    rank_offset += page_size as u32;
                    continue;
                }
            };

            pages_visited += 1;
            for (index, product) in products.iter().enumerate() {
                if !self.target.matches(product) {
                    continue;
                }
                let hit = PositionHit {
                    query: query.to_string(),
                    position: rank_offset + index as u32 + 1,
                    page,
                    article_id: product.id.clone(),
                    name: product.name.clone(),
                    brand: product.brand.clone(),
                    seller: product.supplier.clone(),
                    seller_id: product.supplier_id.clone(),
                    promo_position: product.promo_position,
                    price: product.price,
                    link: product.link(),
                };
                debug!(query = %query, position = hit.position, article = ?hit.article_id, "Found product");
                hits.push(hit);
            }

            products_seen += products.len() as u32;
            rank_offset += products.len() as u32;

            if products.len() < page_size {
                stop_reason = StopReason::LastPage;
                break;
            }
        }

        info!(
            query = %query,
            hits = hits.len(),
            products_seen = products_seen,
            pages_failed = pages_failed,
            "Keyword scan finished"
        );

        KeywordScan {
            query: query.to_string(),
            hits,
            products_seen,
            pages_visited,
            pages_failed,
            stop_reason,
            scanned_at: Utc::now(),
        }
    }

    /// Scan keywords one after another
    pub async fn scan_all(&self, queries: &[String]) -> Vec<KeywordScan> {
        let mut scans = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                sleep(self.settings.next_delay()).await;
            }
            scans.push(self.scan(query).await);
        }
        scans
    }
}
