use crate::api::types::{CMCResponse, LatestQuote};
use crate::api::QuoteSource;
use crate::config::ApiConfig;
use crate::error::{Result, Error};
use crate::metrics;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::time::Instant;

const QUOTES_LATEST: &str = "/cryptocurrency/quotes/latest";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    client: Client,
    api_key: String,
    base_url: String,
    symbol: String,
    convert: String,
}

impl CoinMarketCapClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbol: config.symbol.clone(),
            convert: config.convert.clone(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn get_latest_quote(&self) -> Result<LatestQuote> {
        let url = format!("{}{}", self.base_url, QUOTES_LATEST);
        let requested_at = Utc::now();
        let started = Instant::now();

        debug!("GET {} symbol={} convert={}", url, self.symbol, self.convert);
        let response = self.client
            .get(&url)
            .header("Accepts", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("symbol", self.symbol.as_str()), ("convert", self.convert.as_str())])
            .send()
            .await
            .map_err(|e| Error::ApiConnectionFailed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await?;
        metrics::API_LATENCY.observe(started.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: CMCResponse = serde_json::from_str(&body)?;
        let fields = parsed.into_quote_fields(&self.symbol, &self.convert)?;

        let quote = LatestQuote {
            symbol: self.symbol.clone(),
            convert: self.convert.clone(),
            requested_at,
            fields,
        };
        info!(
            "Fetched {}/{} quote: price = {:?}, {} fields",
            quote.symbol,
            quote.convert,
            quote.price(),
            quote.fields.len()
        );
        Ok(quote)
    }
}

#[async_trait]
impl QuoteSource for CoinMarketCapClient {
    async fn fetch_latest(&self) -> Result<LatestQuote> {
        self.get_latest_quote().await
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    // Error bodies usually still carry the status envelope
    let detail = serde_json::from_str::<CMCResponse>(body)
        .ok()
        .and_then(|r| r.status)
        .and_then(|s| s.error_message)
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::ApiAuthFailed(detail),
        StatusCode::PAYMENT_REQUIRED => Error::ApiQuotaExceeded(detail),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimitExceeded(detail),
        s if s.is_server_error() => Error::ApiConnectionFailed(format!("{}: {}", s, detail)),
        s => Error::ApiError(format!("CoinMarketCap API error {}: {}", s, detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        let body = r#"{"status":{"error_code":1001,"error_message":"This API Key is invalid."}}"#;
        match status_error(StatusCode::UNAUTHORIZED, body) {
            Error::ApiAuthFailed(msg) => assert_eq!(msg, "This API Key is invalid."),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(status_error(StatusCode::PAYMENT_REQUIRED, ""), Error::ApiQuotaExceeded(_)));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, ""), Error::RateLimitExceeded(_)));
        assert!(matches!(status_error(StatusCode::BAD_GATEWAY, "<html>"), Error::ApiConnectionFailed(_)));
        assert!(matches!(status_error(StatusCode::BAD_REQUEST, ""), Error::ApiError(_)));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let mut config = crate::tests::common::create_test_config().api;
        config.base_url = "https://sandbox-api.coinmarketcap.com/v1/".to_string();
        let client = CoinMarketCapClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://sandbox-api.coinmarketcap.com/v1");
        assert_eq!(client.symbol(), "BTC");
    }
}
