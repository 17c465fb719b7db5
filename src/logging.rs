use log::{LevelFilter, Metadata, Record};
use std::sync::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use chrono::Local;
use crate::config::LoggingConfig;
use crate::error::{Result, Error};

/// Append-only file logger used when `logging.file` is configured.
pub struct Logger {
    file: Mutex<std::fs::File>,
    level: LevelFilter,
}

impl Logger {
    pub fn new(log_file: &Path, level: LevelFilter) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;

        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut file) = self.file.lock() {
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(
                    file,
                    "{} [{}] {}",
                    timestamp,
                    record.level(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level)
        .map_err(|_| Error::ConfigError(format!("unknown log level '{}'", level)))
}

/// Installs the global logger. `debug` overrides the configured level.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<()> {
    let level = if debug { LevelFilter::Debug } else { parse_level(&config.level)? };

    match &config.file {
        Some(path) => {
            let logger = Logger::new(path, level)?;
            log::set_boxed_logger(Box::new(logger))
                .map_err(|e| Error::InternalError(e.to_string()))?;
            log::set_max_level(level);
        }
        None => {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(level);
            if !debug {
                builder.parse_default_env();
            }
            builder
                .try_init()
                .map_err(|e| Error::InternalError(e.to_string()))?;
        }
    }
    Ok(())
}
