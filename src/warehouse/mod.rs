use crate::error::Result;
use crate::models::{ColumnValue, QuoteRecord};
use crate::validation::validate_identifier;
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

pub mod redshift;

pub use redshift::RedshiftWarehouse;

/// Destination for loaded quote rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSink: Send + Sync {
    /// Appends the record and returns the number of rows written.
    async fn append(&self, record: &QuoteRecord) -> Result<u64>;
}

/// Schema-qualified table name, validated once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    pub fn new(schema: &str, table: &str) -> Result<Self> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

pub fn sql_type(value: &ColumnValue) -> &'static str {
    match value {
        ColumnValue::Float(_) | ColumnValue::Null => "DOUBLE PRECISION",
        ColumnValue::Text(_) => "VARCHAR(256)",
        ColumnValue::Timestamp(_) => "TIMESTAMPTZ",
        ColumnValue::Bool(_) => "BOOLEAN",
    }
}

fn validate_columns(record: &QuoteRecord) -> Result<()> {
    for name in record.column_names() {
        validate_identifier(name)?;
    }
    Ok(())
}

/// `CREATE TABLE IF NOT EXISTS` with column types inferred from the record.
pub fn create_table_sql(table: &TableRef, record: &QuoteRecord) -> Result<String> {
    validate_columns(record)?;
    let columns: Vec<String> = record
        .columns()
        .iter()
        .map(|(name, value)| format!("{} {}", quote_ident(name), sql_type(value)))
        .collect();
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.qualified(),
        columns.join(", ")
    ))
}

/// Single-row `INSERT` with every non-null value bound as a parameter.
pub fn insert_query<'a>(table: &TableRef, record: &'a QuoteRecord) -> Result<QueryBuilder<'a, Postgres>> {
    validate_columns(record)?;
    let columns: Vec<String> = record.column_names().map(quote_ident).collect();

    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        table.qualified(),
        columns.join(", ")
    ));
    builder.push_values(std::iter::once(record), |mut row, record| {
        for (_, value) in record.columns() {
            match value {
                ColumnValue::Float(f) => {
                    row.push_bind(*f);
                }
                ColumnValue::Text(s) => {
                    row.push_bind(s.clone());
                }
                ColumnValue::Timestamp(ts) => {
                    row.push_bind(*ts);
                }
                ColumnValue::Bool(b) => {
                    row.push_bind(*b);
                }
                // An untyped literal, so the column's own type applies.
                ColumnValue::Null => {
                    row.push("NULL");
                }
            }
        }
    });
    Ok(builder)
}
