//! Statistics feed port

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::entities::record::FeedRecord;
use crate::domain::errors::FeedResult;
use crate::secrets::ApiToken;

/// Collections exposed by the statistics API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedEndpoint {
    Orders,
    Sales,
    Returns,
}

impl FeedEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            FeedEndpoint::Orders => "orders",
            FeedEndpoint::Sales => "sales",
            FeedEndpoint::Returns => "returns",
        }
    }
}

impl std::fmt::Display for FeedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Source of order, sale and return records.
///
/// Implementations are expected to handle retries themselves; an `Err` means
/// the endpoint could not be read at all.
#[async_trait]
pub trait StatisticsFeed: Send + Sync {
    /// Fetch every record of `endpoint` changed since the start of `date_from`.
    ///
    /// The token must be sent as a bearer credential on the request.
    async fn fetch(
        &self,
        token: &ApiToken,
        endpoint: FeedEndpoint,
        date_from: NaiveDate,
    ) -> FeedResult<Vec<FeedRecord>>;
}
