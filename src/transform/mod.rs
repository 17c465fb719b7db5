use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod dbt;

pub use dbt::DbtRunner;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub models: Vec<String>,
    pub elapsed: Duration,
}

/// Downstream step run after a successful load.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn run(&self) -> Result<TransformOutcome>;
}
