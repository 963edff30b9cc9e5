//! Order/sale reconciliation
//!
//! Splits the raw sales feed into buyouts and returns and infers
//! cancellations: an order whose odid never shows up among the buyouts of
//! the same window was not bought out.
//!
//! Returns reported by both the sales feed (negative price) and the returns
//! feed are counted twice; the two sources are never de-duplicated.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::domain::entities::record::{FeedRecord, OrderRecord, ReturnRecord, SaleRecord};

/// The four disjoint views over one date window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub orders: Vec<OrderRecord>,
    pub real_sales: Vec<SaleRecord>,
    pub cancellations: Vec<OrderRecord>,
    pub returns: Vec<ReturnRecord>,
}

impl Reconciliation {
    /// Orders whose identifier matched a buyout.
    pub fn sold_order_count(&self) -> usize {
        let sold = sold_order_ids(&self.real_sales);
        self.orders
            .iter()
            .filter(|o| o.order_id.as_ref().is_some_and(|id| sold.contains(id.as_str())))
            .count()
    }

    /// Orders without an identifier; they are neither sold nor cancelled.
    pub fn unidentified_order_count(&self) -> usize {
        self.orders.iter().filter(|o| o.order_id.is_none()).count()
    }

    /// Distinct articles among cancelled orders, in first-seen order.
    pub fn cancelled_articles(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.cancellations
            .iter()
            .filter_map(|o| o.article_id.clone())
            .filter(|article| seen.insert(article.clone()))
            .collect()
    }
}

/// Partition sales into buyouts (price >= 0) and returns (price < 0).
pub fn split_sales(sales: Vec<SaleRecord>) -> (Vec<SaleRecord>, Vec<SaleRecord>) {
    sales.into_iter().partition(|sale| !sale.is_return())
}

fn sold_order_ids(real_sales: &[SaleRecord]) -> HashSet<&str> {
    real_sales
        .iter()
        .filter_map(|sale| sale.order_id.as_deref())
        .collect()
}

/// Orders with an identifier that no buyout refers to.
pub fn find_cancellations(orders: &[OrderRecord], real_sales: &[SaleRecord]) -> Vec<OrderRecord> {
    if orders.is_empty() {
        return Vec::new();
    }

    let sold = sold_order_ids(real_sales);
    orders
        .iter()
        .filter(|order| match order.order_id.as_deref() {
            Some(id) => !sold.contains(id),
            None => false,
        })
        .cloned()
        .collect()
}

/// Reconcile one window of orders, sales and explicit returns.
///
/// Never fails: malformed records have already been degraded to defaults
/// when they were parsed.
pub fn reconcile(
    orders: Vec<OrderRecord>,
    sales: Vec<SaleRecord>,
    returns: Vec<ReturnRecord>,
) -> Reconciliation {
    let (real_sales, returns_from_sales) = split_sales(sales);
    let cancellations = find_cancellations(&orders, &real_sales);

    let mut all_returns: Vec<FeedRecord> = returns_from_sales;
    all_returns.extend(returns);

    debug!(
        orders = orders.len(),
        real_sales = real_sales.len(),
        cancellations = cancellations.len(),
        returns = all_returns.len(),
        "Reconciled orders against sales"
    );

    Reconciliation {
        orders,
        real_sales,
        cancellations,
        returns: all_returns,
    }
}
