use super::super::config::{Config, ApiConfig, WarehouseConfig, TransformConfig, ScheduleConfig, LoggingConfig};
use super::super::api::types::LatestQuote;
use chrono::{Utc, TimeZone};
use serde_json::{json, Value};
use std::path::PathBuf;

pub const TEST_API_KEY: &str = "b54bcf4d-1bca-4e8e-9a24-22ff2c3d462c";

// Helper to create a valid config pointing at local services
pub fn create_test_config() -> Config {
    Config {
        api: ApiConfig {
            base_url: "http://127.0.0.1:1/v1".to_string(),
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
            profiles_dir: PathBuf::from("/opt/dbt/profiles"),
            project_dir: PathBuf::from("/opt/dbt/project"),
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

// Quote object shaped like the upstream USD quote
pub fn sample_quote_fields(price: f64) -> serde_json::Map<String, Value> {
    let value = json!({
        "price": price,
        "volume_24h": 27_356_140_592.09,
        "volume_change_24h": -4.12,
        "percent_change_1h": 0.08,
        "percent_change_24h": -1.32,
        "percent_change_7d": 3.51,
        "market_cap": 864_432_091_224.2,
        "market_cap_dominance": 40.9,
        "fully_diluted_market_cap": 952_912_001_331.5,
        "tvl": null,
        "last_updated": "2022-04-05T12:34:00.000Z"
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

// Full response body as returned by the quotes/latest endpoint
pub fn sample_response_json(symbol: &str, convert: &str, price: f64) -> Value {
    let mut quote = serde_json::Map::new();
    quote.insert(convert.to_string(), Value::Object(sample_quote_fields(price)));
    let mut data = serde_json::Map::new();
    data.insert(
        symbol.to_string(),
        json!({
            "id": 1,
            "name": "Bitcoin",
            "symbol": symbol,
            "slug": "bitcoin",
            "quote": Value::Object(quote),
        }),
    );
    json!({
        "status": {
            "timestamp": "2022-04-05T12:34:56.789Z",
            "error_code": 0,
            "error_message": null,
            "elapsed": 10,
            "credit_count": 1
        },
        "data": Value::Object(data),
    })
}

pub fn create_test_quote(price: f64) -> LatestQuote {
    LatestQuote {
        symbol: "BTC".to_string(),
        convert: "USD".to_string(),
        requested_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        fields: sample_quote_fields(price),
    }
}
