use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use log::{info, error};

use quote_pipeline::cli::{Cli, Command};
use quote_pipeline::config::{Config, DEFAULT_CONFIG_PATH};
use quote_pipeline::logging;
use quote_pipeline::metrics;
use quote_pipeline::pipeline::Pipeline;
use quote_pipeline::scheduler::Scheduler;

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    config.validate()?;
    info!(
        "Pipeline configured: {}/{} -> {}.{}",
        config.api.symbol, config.api.convert, config.warehouse.schema, config.warehouse.table
    );
    Ok(Pipeline::from_config(config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let config = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {:#}", config_path, e);
            return Err(anyhow::anyhow!("Configuration loading failed: {}", e));
        }
    };

    logging::init(&config.logging, cli.debug)?;
    metrics::init()?;
    let scheduler = Scheduler::from_config(&config.schedule)?;

    match cli.command {
        Command::Run => {
            let pipeline = build_pipeline(&config)?;
            let report = pipeline.run_once().await.map_err(|e| {
                error!("Run failed: {}", e);
                e
            })?;
            info!(
                "Run finished: {} row(s) loaded at {:?}, price = {:?}",
                report.rows_loaded, report.inserted_at, report.price
            );
        }
        Command::Daemon => {
            let pipeline = build_pipeline(&config)?;
            scheduler.run_forever(&pipeline).await?;
        }
        Command::Fetch => {
            let pipeline = build_pipeline(&config)?;
            let record = pipeline.fetch_record().await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Load => {
            let pipeline = build_pipeline(&config)?;
            let outcome = pipeline.save_quote().await?;
            info!("Loaded {} row(s), price = {:?}", outcome.rows, outcome.record.price());
        }
        Command::Transform => {
            let pipeline = build_pipeline(&config)?;
            let outcome = pipeline.transform().await?;
            info!("Transformed models {} in {:.1}s", outcome.models.join(" "), outcome.elapsed.as_secs_f64());
        }
        Command::Schedule { count } => {
            for time in scheduler.upcoming(Utc::now(), count) {
                println!("{}", time.to_rfc3339());
            }
        }
    }

    Ok(())
}
