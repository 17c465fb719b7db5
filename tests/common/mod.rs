#![allow(dead_code)]

use quote_pipeline::config::{Config, ApiConfig, WarehouseConfig, TransformConfig, ScheduleConfig, LoggingConfig};
use quote_pipeline::error::Result;
use quote_pipeline::models::QuoteRecord;
use quote_pipeline::transform::{TransformOutcome, Transformer};
use quote_pipeline::warehouse::QuoteSink;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_API_KEY: &str = "b54bcf4d-1bca-4e8e-9a24-22ff2c3d462c";

// Helper to create a config whose API points at a mock server
pub fn create_test_config(base_url: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            api_key: TEST_API_KEY.to_string(),
            symbol: "BTC".to_string(),
            convert: "USD".to_string(),
            timeout_secs: 5,
        },
        warehouse: WarehouseConfig {
            url: "postgres://awsuser@127.0.0.1:5439/dev".to_string(),
            schema: "public".to_string(),
            table: "quote".to_string(),
            max_connections: 1,
            connect_timeout_secs: 5,
            create_table: true,
        },
        transform: TransformConfig {
            dbt_bin: PathBuf::from("dbt"),
            profiles_dir: PathBuf::from("/opt/dbt"),
            project_dir: PathBuf::from("/opt/dbt"),
            models: vec!["quote".to_string()],
            exclude: Vec::new(),
            target: None,
            full_refresh: false,
            timeout_secs: None,
        },
        schedule: ScheduleConfig {
            cron: "*/5 * * * *".to_string(),
            start_date: None,
            retries: 0,
            retry_delay_secs: 0,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
    }
}

// Body of a successful quotes/latest response
pub fn quote_response(symbol: &str, price: f64) -> Value {
    json!({
        "status": {
            "timestamp": "2022-04-05T12:34:56.789Z",
            "error_code": 0,
            "error_message": null,
            "elapsed": 10,
            "credit_count": 1
        },
        "data": {
            (symbol): {
                "id": 1,
                "name": "Bitcoin",
                "symbol": symbol,
                "slug": "bitcoin",
                "quote": {
                    "USD": {
                        "price": price,
                        "volume_24h": 27356140592.09,
                        "volume_change_24h": -4.12,
                        "percent_change_1h": 0.08,
                        "percent_change_24h": -1.32,
                        "percent_change_7d": 3.51,
                        "market_cap": 864432091224.2,
                        "market_cap_dominance": 40.9,
                        "fully_diluted_market_cap": 952912001331.5,
                        "last_updated": "2022-04-05T12:34:00.000Z"
                    }
                }
            }
        }
    })
}

// In-memory sink recording every appended row
#[derive(Default)]
pub struct MemorySink {
    pub rows: Mutex<Vec<QuoteRecord>>,
}

#[async_trait]
impl QuoteSink for MemorySink {
    async fn append(&self, record: &QuoteRecord) -> Result<u64> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(1)
    }
}

// Transformer that only counts invocations
#[derive(Default)]
pub struct CountingTransformer {
    pub calls: AtomicUsize,
}

impl CountingTransformer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transformer for CountingTransformer {
    async fn run(&self) -> Result<TransformOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransformOutcome {
            models: vec!["quote".to_string()],
            elapsed: Duration::from_millis(1),
        })
    }
}
