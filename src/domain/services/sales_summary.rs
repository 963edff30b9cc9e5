//! Counts, sums and rates over a reconciled window.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::record::FeedRecord;
use crate::domain::entities::report::{Bucket, DailyReport, DisplayItem, ReportStatus};
use crate::domain::services::order_reconciliation::Reconciliation;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub count: usize,
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub orders: Totals,
    pub sales: Totals,
    pub cancellations: Totals,
    /// Sum is the magnitude of the returned amounts
    pub returns: Totals,
    pub conversion_rate: f64,
    pub cancellation_rate: f64,
}

fn totals(records: &[FeedRecord], price: fn(&FeedRecord) -> f64) -> Totals {
    Totals {
        count: records.len(),
        sum: records.iter().map(price).sum(),
    }
}

fn signed_price(record: &FeedRecord) -> f64 {
    record.price
}

fn return_price(record: &FeedRecord) -> f64 {
    record.price.abs()
}

/// Percentage of `part` in `whole`, 0 when `whole` is empty.
pub fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn summarize(reconciliation: &Reconciliation) -> SalesSummary {
    let orders = totals(&reconciliation.orders, signed_price);
    let sales = totals(&reconciliation.real_sales, signed_price);
    let cancellations = totals(&reconciliation.cancellations, signed_price);
    let returns = totals(&reconciliation.returns, return_price);

    SalesSummary {
        orders,
        sales,
        cancellations,
        returns,
        conversion_rate: rate(sales.count, orders.count),
        cancellation_rate: rate(cancellations.count, orders.count),
    }
}

fn bucket(records: &[FeedRecord], totals: Totals, price: fn(&FeedRecord) -> f64, limit: usize) -> Bucket {
    Bucket {
        count: totals.count,
        sum: totals.sum,
        items: records
            .iter()
            .take(limit)
            .map(|r| DisplayItem::from_record(r, price(r)))
            .collect(),
    }
}

/// Build the report for `actor` with at most `display_limit` preview items
/// per bucket.
pub fn build_report(
    actor: &str,
    date: NaiveDate,
    reconciliation: &Reconciliation,
    display_limit: usize,
) -> DailyReport {
    let summary = summarize(reconciliation);

    DailyReport {
        actor: actor.to_string(),
        date,
        generated_at: Utc::now(),
        status: ReportStatus::Ok,
        orders: bucket(&reconciliation.orders, summary.orders, signed_price, display_limit),
        sales: bucket(&reconciliation.real_sales, summary.sales, signed_price, display_limit),
        cancellations: bucket(
            &reconciliation.cancellations,
            summary.cancellations,
            signed_price,
            display_limit,
        ),
        returns: bucket(&reconciliation.returns, summary.returns, return_price, display_limit),
        conversion_rate: summary.conversion_rate,
        cancellation_rate: summary.cancellation_rate,
        cancelled_articles: reconciliation.cancelled_articles(),
    }
}
