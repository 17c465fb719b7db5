use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::metrics;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;

pub mod cron;

pub use cron::CronSchedule;

/// Cron-driven trigger for [`Pipeline::run_once`]. Runs never overlap and
/// slots missed while a run is in progress are skipped.
#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: CronSchedule,
    start_date: Option<DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(schedule: CronSchedule, start_date: Option<DateTime<Utc>>) -> Self {
        Self { schedule, start_date }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self::new(CronSchedule::parse(&config.cron)?, config.start_date))
    }

    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    /// Next fire time after `now`, never earlier than `start_date`.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let from = match self.start_date {
            // next_after is exclusive, so step back to include start_date itself
            Some(start) if start > now => start - ChronoDuration::seconds(1),
            _ => now,
        };
        self.schedule.next_after(from)
    }

    pub fn upcoming(&self, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = now;
        while times.len() < count {
            match self.next_fire(cursor) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }

    /// Runs until Ctrl-C.
    pub async fn run_forever(&self, pipeline: &Pipeline) -> Result<()> {
        self.run_until(pipeline, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until `shutdown` resolves. A run in progress is allowed to finish.
    pub async fn run_until<F>(&self, pipeline: &Pipeline, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Scheduler started with '{}'", self.schedule);

        loop {
            let now = Utc::now();
            let next = match self.next_fire(now) {
                Some(next) => next,
                None => {
                    warn!("Schedule '{}' has no future fire times, stopping", self.schedule);
                    return Ok(());
                }
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!("Next run at {} (in {}s)", next.format("%Y-%m-%d %H:%M:%S UTC"), wait.as_secs());

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping scheduler");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            match pipeline.run_once().await {
                Ok(report) => info!(
                    "Run for {} finished: {} row(s) loaded, price = {:?}, took {}ms",
                    next.format("%H:%M"),
                    report.rows_loaded,
                    report.price,
                    (report.finished_at - report.started_at).num_milliseconds()
                ),
                Err(e) => error!("Run for {} failed: {}", next.format("%H:%M"), e),
            }

            match metrics::render() {
                Ok(text) => debug!("Metrics:\n{}", text),
                Err(e) => debug!("Metrics unavailable: {}", e),
            }
        }
    }
}
