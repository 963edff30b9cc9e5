//! Order, sale and return records from the statistics feed.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields::{extract_price, identifier_field, text_field};

/// A single row of the orders, sales or returns feed.
///
/// The typed fields are read once from the raw object; the raw object is kept
/// so that snapshots can be exported exactly as received. Serializing a
/// record yields the raw object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct FeedRecord {
    /// Order/sale linking identifier (`odid`)
    pub order_id: Option<String>,
    /// Sale row identifier (`srid`)
    pub sale_id: Option<String>,
    /// Marketplace article (`nmId`)
    pub article_id: Option<String>,
    pub price: f64,
    pub timestamp: Option<String>,
    pub subject: Option<String>,
    pub brand: Option<String>,
    pub tech_size: Option<String>,
    raw: Value,
}

pub type OrderRecord = FeedRecord;
pub type SaleRecord = FeedRecord;
pub type ReturnRecord = FeedRecord;

impl FeedRecord {
    pub fn from_value(raw: Value) -> Self {
        let Some(object) = raw.as_object() else {
            return Self {
                order_id: None,
                sale_id: None,
                article_id: None,
                price: 0.0,
                timestamp: None,
                subject: None,
                brand: None,
                tech_size: None,
                raw,
            };
        };

        Self {
            order_id: identifier_field(object, "odid"),
            sale_id: identifier_field(object, "srid"),
            article_id: identifier_field(object, "nmId"),
            price: extract_price(object),
            timestamp: text_field(object, "date"),
            subject: text_field(object, "subject"),
            brand: text_field(object, "brand"),
            tech_size: text_field(object, "techSize"),
            raw,
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// A sale with a negative price is a return of an earlier purchase.
    pub fn is_return(&self) -> bool {
        self.price < 0.0
    }

    /// Identifier shown to users: the odid, falling back to the srid.
    pub fn display_id(&self) -> String {
        self.order_id
            .clone()
            .or_else(|| self.sale_id.clone())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn display_article(&self) -> String {
        self.article_id.clone().unwrap_or_else(|| "N/A".to_string())
    }

    /// Human-readable product name built from whatever the record carries.
    pub fn display_name(&self) -> String {
        match (&self.subject, &self.brand, &self.article_id, &self.tech_size) {
            (Some(subject), Some(brand), _, _) => format!("{} - {}", brand, subject),
            (Some(subject), None, _, _) => subject.clone(),
            (None, _, Some(article), Some(size)) => format!("Art. {} (size {})", article, size),
            (None, _, Some(article), None) => format!("Art. {}", article),
            _ => "Unknown item".to_string(),
        }
    }

    /// `HH:MM` of the record timestamp, or the raw string if it does not parse.
    pub fn display_time(&self) -> String {
        match &self.timestamp {
            Some(ts) => format_clock(ts).unwrap_or_else(|| ts.clone()),
            None => String::new(),
        }
    }
}

impl From<Value> for FeedRecord {
    fn from(raw: Value) -> Self {
        FeedRecord::from_value(raw)
    }
}

impl From<FeedRecord> for Value {
    fn from(record: FeedRecord) -> Self {
        record.raw
    }
}

fn format_clock(timestamp: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.format("%H:%M").to_string());
    }
    let trimmed = timestamp.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_typed_fields() {
        let record = FeedRecord::from_value(json!({
            "odid": 5512,
            "srid": "abc",
            "nmId": 998877,
            "priceWithDisc": 1250.5,
            "date": "2024-03-01T14:05:09",
            "subject": "Case",
            "brand": "YalowShop",
            "techSize": "0"
        }));

        assert_eq!(record.order_id.as_deref(), Some("5512"));
        assert_eq!(record.sale_id.as_deref(), Some("abc"));
        assert_eq!(record.article_id.as_deref(), Some("998877"));
        assert_eq!(record.price, 1250.5);
        assert_eq!(record.display_time(), "14:05");
        assert_eq!(record.display_name(), "YalowShop - Case");
    }

    #[test]
    fn test_non_object_record_degrades() {
        let record = FeedRecord::from_value(json!("garbage"));
        assert_eq!(record.order_id, None);
        assert_eq!(record.price, 0.0);
        assert_eq!(record.display_name(), "Unknown item");
        assert_eq!(record.display_id(), "N/A");
    }

    #[test]
    fn test_display_fallbacks() {
        let record = FeedRecord::from_value(json!({"srid": "s-1", "nmId": 7, "techSize": "M"}));
        assert_eq!(record.display_id(), "s-1");
        assert_eq!(record.display_name(), "Art. 7 (size M)");

        let record = FeedRecord::from_value(json!({"nmId": 7, "date": "yesterday"}));
        assert_eq!(record.display_name(), "Art. 7");
        assert_eq!(record.display_time(), "yesterday");
    }

    #[test]
    fn test_rfc3339_timestamp() {
        let record = FeedRecord::from_value(json!({"date": "2024-03-01T09:30:00Z"}));
        assert_eq!(record.display_time(), "09:30");
    }

    #[test]
    fn test_serializes_raw_object() {
        let raw = json!({"odid": "1", "priceWithDisc": -30, "extra": {"nested": true}});
        let record = FeedRecord::from_value(raw.clone());
        assert!(record.is_return());
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);

        let back: FeedRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(back, record);
    }
}
