pub mod quote;

pub use quote::{ColumnValue, QuoteRecord, INSERTED_AT_COLUMN};
