use async_trait::async_trait;

use crate::domain::entities::catalog::CatalogProduct;
use crate::domain::errors::FeedResult;

/// Paginated keyword search over the marketplace catalog.
#[async_trait]
pub trait SearchCatalog: Send + Sync {
    /// Products on `page` (1-based) of the results for `query`, in rank order.
    async fn fetch_page(&self, query: &str, page: u32) -> FeedResult<Vec<CatalogProduct>>;
}
