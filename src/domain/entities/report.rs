//! Daily sales report shown to sellers.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::FeedRecord;

/// A record rendered for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub id: String,
    pub article: String,
    pub name: String,
    pub price: f64,
    pub time: String,
}

impl DisplayItem {
    pub fn from_record(record: &FeedRecord, price: f64) -> Self {
        Self {
            id: record.display_id(),
            article: record.display_article(),
            name: record.display_name(),
            price,
            time: record.display_time(),
        }
    }
}

/// Count, price sum and a preview of one result set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub count: usize,
    pub sum: f64,
    pub items: Vec<DisplayItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub actor: String,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub orders: Bucket,
    pub sales: Bucket,
    pub cancellations: Bucket,
    pub returns: Bucket,
    pub conversion_rate: f64,
    pub cancellation_rate: f64,
    pub cancelled_articles: Vec<String>,
}

impl DailyReport {
    /// Empty report carrying an error, used when the upstream rejects us.
    pub fn failed(actor: &str, date: NaiveDate, error: impl Into<String>) -> Self {
        Self {
            actor: actor.to_string(),
            date,
            generated_at: Utc::now(),
            status: ReportStatus::Failed {
                error: error.into(),
            },
            orders: Bucket::default(),
            sales: Bucket::default(),
            cancellations: Bucket::default(),
            returns: Bucket::default(),
            conversion_rate: 0.0,
            cancellation_rate: 0.0,
            cancelled_articles: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ReportStatus::Ok)
    }
}

fn write_bucket(f: &mut fmt::Formatter<'_>, title: &str, bucket: &Bucket) -> fmt::Result {
    writeln!(f, "{}: {} ({:.2} RUB)", title, bucket.count, bucket.sum)?;
    for (i, item) in bucket.items.iter().enumerate() {
        writeln!(
            f,
            "  {}. order {} | article {} | {} | {:.2} RUB | {}",
            i + 1,
            item.id,
            item.article,
            item.name,
            item.price,
            item.time
        )?;
    }
    Ok(())
}

impl fmt::Display for DailyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(
            f,
            "SALES REPORT for {} on {}",
            self.actor,
            self.date.format("%d.%m.%Y")
        )?;
        writeln!(f, "{}", "=".repeat(70))?;

        if let ReportStatus::Failed { error } = &self.status {
            writeln!(f, "Report unavailable: {}", error)?;
            return Ok(());
        }

        write_bucket(f, "Orders", &self.orders)?;
        write_bucket(f, "Buyouts", &self.sales)?;
        write_bucket(f, "Cancellations", &self.cancellations)?;
        if !self.cancelled_articles.is_empty() {
            writeln!(
                f,
                "  cancelled articles ({}): {}",
                self.cancelled_articles.len(),
                self.cancelled_articles.join(", ")
            )?;
        }
        write_bucket(f, "Returns", &self.returns)?;

        writeln!(f, "Conversion to buyouts: {:.1}%", self.conversion_rate)?;
        writeln!(f, "Cancellation rate: {:.1}%", self.cancellation_rate)
    }
}
