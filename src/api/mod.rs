use crate::error::Result;
use async_trait::async_trait;

pub mod coinmarketcap;
pub mod types;

pub use coinmarketcap::CoinMarketCapClient;
pub use types::LatestQuote;

/// Anything that can produce the latest quote for the configured symbol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<LatestQuote>;
}
