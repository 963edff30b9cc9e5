//! Ports to the statistics API, the search API and the report cache.

pub mod cache_store;
pub mod search_catalog;
pub mod statistics_feed;

pub use cache_store::CacheStore;
pub use search_catalog::SearchCatalog;
pub use statistics_feed::{FeedEndpoint, StatisticsFeed};
