use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::QuoteRecord;
use crate::warehouse::{create_table_sql, insert_query, QuoteSink, TableRef};
use async_trait::async_trait;
use log::{debug, info, warn};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Redshift (or any Postgres-protocol warehouse) sink. A pool is opened for
/// each append and closed before returning.
#[derive(Debug, Clone)]
pub struct RedshiftWarehouse {
    url: String,
    table: TableRef,
    max_connections: u32,
    connect_timeout: Duration,
    create_table: bool,
}

impl RedshiftWarehouse {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            table: TableRef::new(&config.schema, &config.table)?,
            max_connections: config.max_connections,
            connect_timeout: config.connect_timeout(),
            create_table: config.create_table,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    async fn connect(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(&self.url)
            .await?;
        debug!("Connected to warehouse for {}", self.table);
        Ok(pool)
    }

    async fn write(&self, pool: &PgPool, record: &QuoteRecord) -> Result<u64> {
        if self.create_table {
            let ddl = create_table_sql(&self.table, record)?;
            sqlx::query(&ddl).execute(pool).await?;
        }

        let mut insert = insert_query(&self.table, record)?;
        let result = insert.build().execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl QuoteSink for RedshiftWarehouse {
    async fn append(&self, record: &QuoteRecord) -> Result<u64> {
        let pool = self.connect().await?;
        let outcome = self.write(&pool, record).await;
        pool.close().await;

        match &outcome {
            Ok(rows) => {
                metrics::ROWS_LOADED.inc_by(*rows as f64);
                info!("Loaded {} row(s) into {}", rows, self.table);
            }
            Err(e) => warn!("Load into {} failed: {}", self.table, e),
        }
        outcome
    }
}
