use prometheus::{Counter, Encoder, Gauge, Histogram, Registry, TextEncoder};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref PIPELINE_RUNS: Counter = Counter::new(
        "quote_pipeline_runs_total",
        "Total number of pipeline runs started"
    ).unwrap();

    pub static ref PIPELINE_FAILURES: Counter = Counter::new(
        "quote_pipeline_run_failures_total",
        "Total number of pipeline runs that failed"
    ).unwrap();

    pub static ref ROWS_LOADED: Counter = Counter::new(
        "quote_rows_loaded_total",
        "Total number of quote rows written to the warehouse"
    ).unwrap();

    pub static ref LAST_PRICE: Gauge = Gauge::new(
        "quote_last_price",
        "Price from the most recently loaded quote"
    ).unwrap();

    pub static ref API_LATENCY: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "quote_api_latency_seconds",
            "Quote API call latency in seconds"
        ).buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0])
    ).unwrap();

    pub static ref TRANSFORM_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "quote_transform_duration_seconds",
            "Duration of the transformation step in seconds"
        ).buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0])
    ).unwrap();
}

pub fn init() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(PIPELINE_RUNS.clone()))?;
    REGISTRY.register(Box::new(PIPELINE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(ROWS_LOADED.clone()))?;
    REGISTRY.register(Box::new(LAST_PRICE.clone()))?;
    REGISTRY.register(Box::new(API_LATENCY.clone()))?;
    REGISTRY.register(Box::new(TRANSFORM_DURATION.clone()))?;
    Ok(())
}

/// Text exposition of everything registered in [`REGISTRY`].
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
