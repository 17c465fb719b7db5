use crate::api::{CoinMarketCapClient, QuoteSource};
use crate::config::Config;
use crate::error::Result;
use crate::metrics;
use crate::models::QuoteRecord;
use crate::transform::{DbtRunner, TransformOutcome, Transformer};
use crate::warehouse::{QuoteSink, RedshiftWarehouse};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const SAVE_QUOTE_TASK: &str = "save-quote";
pub const TRANSFORM_TASK: &str = "transform";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Runs `attempt` until it succeeds or `retries` extra attempts are used up.
    pub async fn run<T, F, Fut>(&self, task: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tries = 0u32;
        loop {
            tries += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if tries <= self.retries => {
                    warn!(
                        "Task {} failed (attempt {}/{}): {}; retrying in {}s",
                        task,
                        tries,
                        self.retries + 1,
                        e,
                        self.delay.as_secs()
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    error!("Task {} failed after {} attempt(s) [{}]: {}", task, tries, e.kind(), e);
                    return Err(e);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub record: QuoteRecord,
    pub rows: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_loaded: u64,
    pub price: Option<f64>,
    pub inserted_at: Option<DateTime<Utc>>,
    pub transform: TransformOutcome,
}

/// One scheduled run: `save-quote`, then `transform` once the load succeeded.
pub struct Pipeline {
    source: Arc<dyn QuoteSource>,
    sink: Arc<dyn QuoteSink>,
    transformer: Arc<dyn Transformer>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        sink: Arc<dyn QuoteSink>,
        transformer: Arc<dyn Transformer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            sink,
            transformer,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let source = CoinMarketCapClient::new(&config.api)?;
        let sink = RedshiftWarehouse::new(&config.warehouse)?;
        let transformer = DbtRunner::new(&config.transform);
        let retry = RetryPolicy {
            retries: config.schedule.retries,
            delay: config.schedule.retry_delay(),
        };
        Ok(Self::new(Arc::new(source), Arc::new(sink), Arc::new(transformer), retry))
    }

    /// Fetches the quote and shapes it into a row without storing it.
    pub async fn fetch_record(&self) -> Result<QuoteRecord> {
        let quote = self.source.fetch_latest().await?;
        QuoteRecord::from_quote(&quote, Utc::now())
    }

    async fn save_quote_once(&self) -> Result<LoadOutcome> {
        let record = self.fetch_record().await?;
        let rows = self.sink.append(&record).await?;
        if let Some(price) = record.price() {
            metrics::LAST_PRICE.set(price);
        }
        Ok(LoadOutcome { record, rows })
    }

    pub async fn save_quote(&self) -> Result<LoadOutcome> {
        self.retry.run(SAVE_QUOTE_TASK, || self.save_quote_once()).await
    }

    pub async fn transform(&self) -> Result<TransformOutcome> {
        self.retry.run(TRANSFORM_TASK, || self.transformer.run()).await
    }

    pub async fn run_once(&self) -> Result<RunReport> {
        metrics::PIPELINE_RUNS.inc();
        let started_at = Utc::now();

        let result = self.run_tasks(started_at).await;
        if result.is_err() {
            metrics::PIPELINE_FAILURES.inc();
        }
        result
    }

    async fn run_tasks(&self, started_at: DateTime<Utc>) -> Result<RunReport> {
        let load = self.save_quote().await?;
        info!("Task {} done: {} row(s), price = {:?}", SAVE_QUOTE_TASK, load.rows, load.record.price());

        let transform = self.transform().await?;
        info!("Task {} done in {:.1}s", TRANSFORM_TASK, transform.elapsed.as_secs_f64());

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            rows_loaded: load.rows,
            price: load.record.price(),
            inserted_at: load.record.inserted_at(),
            transform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockQuoteSource;
    use crate::error::Error;
    use crate::models::INSERTED_AT_COLUMN;
    use crate::tests::common::create_test_quote;
    use crate::transform::MockTransformer;
    use crate::warehouse::MockQuoteSink;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn no_delay(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::ZERO,
        }
    }

    fn transform_ok() -> MockTransformer {
        let mut transformer = MockTransformer::new();
        transformer.expect_run().times(1).returning(|| {
            Ok(TransformOutcome {
                models: vec!["quote".to_string()],
                elapsed: Duration::from_millis(5),
            })
        });
        transformer
    }

    fn pipeline(source: MockQuoteSource, sink: MockQuoteSink, transformer: MockTransformer, retry: RetryPolicy) -> Pipeline {
        Pipeline::new(Arc::new(source), Arc::new(sink), Arc::new(transformer), retry)
    }

    #[test_log::test(tokio::test)]
    async fn test_run_loads_then_transforms() {
        let quote = create_test_quote(45_000.0);
        let expected_len = quote.fields.len() + 1;
        let requested_at = quote.requested_at;

        let mut source = MockQuoteSource::new();
        source.expect_fetch_latest().times(1).returning(move || Ok(quote.clone()));

        let mut sink = MockQuoteSink::new();
        sink.expect_append()
            .withf(move |record: &QuoteRecord| {
                record.len() == expected_len
                    && record.column_names().last() == Some(INSERTED_AT_COLUMN)
                    && record.inserted_at().map_or(false, |ts| ts >= requested_at)
            })
            .times(1)
            .returning(|_| Ok(1));

        let report = assert_ok!(pipeline(source, sink, transform_ok(), no_delay(0)).run_once().await);
        assert_eq!(report.rows_loaded, 1);
        assert_eq!(report.price, Some(45_000.0));
        assert!(report.inserted_at.unwrap() >= requested_at);
        assert!(report.finished_at >= report.started_at);
        assert_eq!(report.transform.models, vec!["quote".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_response_writes_nothing() {
        let mut source = MockQuoteSource::new();
        source
            .expect_fetch_latest()
            .times(1)
            .returning(|| Err(Error::ApiInvalidFormat("missing 'data.BTC'".to_string())));

        let mut sink = MockQuoteSink::new();
        sink.expect_append().never();
        let mut transformer = MockTransformer::new();
        transformer.expect_run().never();

        let err = assert_err!(pipeline(source, sink, transformer, no_delay(0)).run_once().await);
        assert!(matches!(err, Error::ApiInvalidFormat(_)));
    }

    #[tokio::test]
    async fn test_unflattenable_quote_writes_nothing() {
        let mut quote = create_test_quote(1.0);
        quote.fields.insert("platform".to_string(), json!({"id": 1027}));

        let mut source = MockQuoteSource::new();
        source.expect_fetch_latest().times(1).returning(move || Ok(quote.clone()));
        let mut sink = MockQuoteSink::new();
        sink.expect_append().never();
        let mut transformer = MockTransformer::new();
        transformer.expect_run().never();

        let result = pipeline(source, sink, transformer, no_delay(0)).run_once().await;
        assert!(matches!(result, Err(Error::ApiInvalidData(_))));
    }

    #[tokio::test]
    async fn test_failed_load_skips_transform() {
        let mut source = MockQuoteSource::new();
        source.expect_fetch_latest().times(1).returning(|| Ok(create_test_quote(1.0)));
        let mut sink = MockQuoteSink::new();
        sink.expect_append()
            .times(1)
            .returning(|_| Err(Error::DatabaseError("connection refused".to_string())));
        let mut transformer = MockTransformer::new();
        transformer.expect_run().never();

        let result = pipeline(source, sink, transformer, no_delay(0)).run_once().await;
        assert!(matches!(result, Err(Error::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_save_quote_retries_whole_task() {
        let mut source = MockQuoteSource::new();
        source.expect_fetch_latest().times(2).returning(|| Ok(create_test_quote(1.0)));

        let mut attempts = 0;
        let mut sink = MockQuoteSink::new();
        sink.expect_append().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(Error::DatabaseError("timeout".to_string()))
            } else {
                Ok(1)
            }
        });

        let report = pipeline(source, sink, transform_ok(), no_delay(1)).run_once().await.unwrap();
        assert_eq!(report.rows_loaded, 1);
    }

    #[tokio::test]
    async fn test_transform_failure_exhausts_retries() {
        let mut source = MockQuoteSource::new();
        source.expect_fetch_latest().times(1).returning(|| Ok(create_test_quote(1.0)));
        let mut sink = MockQuoteSink::new();
        sink.expect_append().times(1).returning(|_| Ok(1));
        let mut transformer = MockTransformer::new();
        transformer
            .expect_run()
            .times(3)
            .returning(|| Err(Error::TransformError("dbt exited with 2".to_string())));

        let result = pipeline(source, sink, transformer, no_delay(2)).run_once().await;
        assert!(matches!(result, Err(Error::TransformError(_))));
    }

    #[tokio::test]
    async fn test_fetch_record_does_not_load() {
        let mut source = MockQuoteSource::new();
        source.expect_fetch_latest().times(1).returning(|| Ok(create_test_quote(3.0)));
        let mut sink = MockQuoteSink::new();
        sink.expect_append().never();
        let mut transformer = MockTransformer::new();
        transformer.expect_run().never();

        let record = pipeline(source, sink, transformer, no_delay(0)).fetch_record().await.unwrap();
        assert_eq!(record.price(), Some(3.0));
    }

    #[test]
    fn test_from_config() {
        let config = crate::tests::common::create_test_config();
        assert!(Pipeline::from_config(&config).is_ok());
    }
}
