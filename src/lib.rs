pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod transform;
pub mod validation;
pub mod warehouse;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunReport};

// Declare tests module only when testing
#[cfg(test)]
pub mod tests;
