//! Search results and keyword position scans.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{coerce_identifier, coerce_number, text_field};

const PRODUCT_LINK_BASE: &str = "https://www.wildberries.ru/catalog";

/// One product from a page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: Option<String>,
    pub name: String,
    pub brand: String,
    pub supplier: String,
    pub supplier_id: Option<String>,
    pub subject: Option<String>,
    pub promo_position: Option<u32>,
    pub organic_position: Option<u32>,
    /// Sale price in roubles (`salePriceU / 100`)
    pub price: Option<f64>,
}

impl CatalogProduct {
    pub fn from_value(value: &Value) -> Self {
        let empty = serde_json::Map::new();
        let object = value.as_object().unwrap_or(&empty);
        let log = object.get("log").and_then(Value::as_object);

        let position = |key: &str| {
            log.and_then(|l| l.get(key))
                .and_then(coerce_number)
                .filter(|p| *p >= 0.0)
                .map(|p| p as u32)
        };

        Self {
            id: object.get("id").and_then(coerce_identifier),
            name: text_field(object, "name").unwrap_or_default(),
            brand: text_field(object, "brand").unwrap_or_default(),
            supplier: text_field(object, "supplier").unwrap_or_default(),
            supplier_id: object.get("supplierId").and_then(coerce_identifier),
            subject: text_field(object, "subjectName").or_else(|| text_field(object, "entity")),
            promo_position: position("promoPosition"),
            organic_position: position("position"),
            price: object
                .get("salePriceU")
                .and_then(coerce_number)
                .map(|kopecks| (kopecks / 100.0).trunc()),
        }
    }

    pub fn link(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| format!("{}/{}/detail.aspx", PRODUCT_LINK_BASE, id))
    }
}

/// A product of the tracked seller found in the search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHit {
    pub query: String,
    /// Global rank across all pages, starting at 1
    pub position: u32,
    pub page: u32,
    pub article_id: Option<String>,
    pub name: String,
    pub brand: String,
    pub seller: String,
    pub seller_id: Option<String>,
    pub promo_position: Option<u32>,
    pub price: Option<f64>,
    pub link: Option<String>,
}

impl PositionHit {
    pub fn is_promoted(&self) -> bool {
        self.promo_position.is_some()
    }
}

/// Why a keyword scan stopped requesting pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A page came back with fewer products than a full page
    LastPage,
    /// The configured page limit was reached
    MaxPages,
}

/// Outcome of walking the search results for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScan {
    pub query: String,
    pub hits: Vec<PositionHit>,
    pub products_seen: u32,
    pub pages_visited: u32,
    pub pages_failed: u32,
    pub stop_reason: StopReason,
    pub scanned_at: DateTime<Utc>,
}

impl KeywordScan {
    pub fn best_position(&self) -> Option<u32> {
        self.hits.iter().map(|h| h.position).min()
    }

    /// Mean rank of the hits, rounded to one decimal.
    pub fn average_position(&self) -> Option<f64> {
        if self.hits.is_empty() {
            return None;
        }
        let total: f64 = self.hits.iter().map(|h| h.position as f64).sum();
        Some((total / self.hits.len() as f64 * 10.0).round() / 10.0)
    }
}

/// Plain-text summary of a batch of scans
pub struct ScanSummary<'a>(pub &'a [KeywordScan]);

impl fmt::Display for ScanSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scan in self.0 {
            writeln!(f, "Query: {}", scan.query)?;
            if scan.hits.is_empty() {
                writeln!(
                    f,
                    "  not found in the first {} products ({} pages failed)",
                    scan.products_seen, scan.pages_failed
                )?;
                continue;
            }

            for hit in &scan.hits {
                let promo = hit
                    .promo_position
                    .map(|p| format!(" [promo {}]", p))
                    .unwrap_or_default();
                let price = hit
                    .price
                    .map(|p| format!("{:.0} RUB", p))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    f,
                    "  #{} (page {}){} {} | {} | {} | {}",
                    hit.position,
                    hit.page,
                    promo,
                    hit.article_id.as_deref().unwrap_or("N/A"),
                    hit.name,
                    price,
                    hit.link.as_deref().unwrap_or("-")
                )?;
            }
            if let Some(average) = scan.average_position() {
                writeln!(f, "  average position: {:.1}", average)?;
            }
        }

        let found = self.0.iter().filter(|s| !s.hits.is_empty()).count();
        writeln!(f, "Found in {} of {} queries", found, self.0.len())
    }
}
